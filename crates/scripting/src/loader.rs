//! Script loading
//!
//! Turns script text into triggers. A script's top level holds trigger
//! sections (`on <event>:`) plus the optional `options:` and `variables:`
//! sections. Parse problems are reported per line and never stop the rest
//! of the script from loading.

use crate::error::Result;
use crate::log::{ErrorQuality, LogEntry, Severity};
use crate::node::{read_nodes, Node};
use crate::parser::ParserState;
use crate::pattern::Placeholder;
use crate::runtime::Runtime;
use crate::trigger::{Trigger, TriggerBuilder};
use crate::value::type_names;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trellis_core::SourceLocation;
use tracing::{debug, warn};

/// Outcome of loading one script
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptReport {
    pub name: String,
    pub triggers: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Every reported error and warning, with its location
    pub messages: Vec<String>,
}

impl ScriptReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, entries: Vec<LogEntry>) {
        for entry in entries {
            match entry.severity {
                Severity::Error => self.errors += 1,
                Severity::Warning => self.warnings += 1,
            }
            self.messages.push(entry.to_string());
        }
    }
}

/// Outcome of a load or reload
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub scripts: Vec<ScriptReport>,
}

impl LoadReport {
    pub fn push(&mut self, report: ScriptReport) {
        self.scripts.push(report);
    }

    pub fn triggers(&self) -> usize {
        self.scripts.iter().map(|s| s.triggers).sum()
    }

    pub fn errors(&self) -> usize {
        self.scripts.iter().map(|s| s.errors).sum()
    }

    pub fn warnings(&self) -> usize {
        self.scripts.iter().map(|s| s.warnings).sum()
    }

    /// One-line summary for the log
    pub fn summary(&self) -> String {
        format!(
            "Loaded {} script{} with {} trigger{} ({} error{}, {} warning{})",
            self.scripts.len(),
            plural(self.scripts.len()),
            self.triggers(),
            plural(self.triggers()),
            self.errors(),
            plural(self.errors()),
            self.warnings(),
            plural(self.warnings())
        )
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for script in &self.scripts {
            writeln!(
                f,
                "  {}: {} trigger(s), {} error(s), {} warning(s)",
                script.name, script.triggers, script.errors, script.warnings
            )?;
            for message in &script.messages {
                writeln!(f, "    {}", message)?;
            }
        }
        Ok(())
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// The triggers parsed from one script, not yet activated
#[derive(Debug)]
pub struct LoadedScript {
    pub name: String,
    pub path: Option<PathBuf>,
    pub triggers: Vec<Arc<Trigger>>,
}

/// Parse a script into triggers
///
/// # Arguments
/// * `name` - Name used in messages and for unloading
/// * `source` - Script text
/// * `runtime` - Runtime whose registry is used; `variables:` defaults are
///   written to its global variables
pub fn parse_script(name: &str, source: &str, runtime: &Arc<Runtime>) -> (LoadedScript, ScriptReport) {
    let mut state =
        ParserState::new(Arc::clone(runtime.registry())).with_warn_missing_and(runtime.options().warn_missing_and);
    let mut report = ScriptReport::new(name);
    let mut triggers = Vec::new();

    let (nodes, node_errors) = read_nodes(source);
    for error in node_errors {
        state.set_location(name, error.line);
        state.error(error.message, ErrorQuality::SemanticError);
    }

    // Options apply to the whole file, wherever they are declared
    let mut options = HashMap::new();
    for node in nodes.iter().filter(|n| n.is_section() && n.key.eq_ignore_ascii_case("options")) {
        read_options(node, name, &mut state, &mut options);
    }
    let nodes: Vec<Node> = nodes
        .into_iter()
        .filter(|n| !(n.is_section() && n.key.eq_ignore_ascii_case("options")))
        .map(|n| substitute_node(n, name, &options, &mut state))
        .collect();

    for node in &nodes {
        state.set_location(name, node.line);
        if !node.is_section() {
            state.error(
                format!("'{}' must be inside a trigger, e.g. 'on load:'", node.key),
                ErrorQuality::SemanticError,
            );
            continue;
        }
        if node.key.eq_ignore_ascii_case("variables") {
            read_variables(node, name, &mut state, runtime);
            continue;
        }
        if let Some(trigger) = parse_trigger(node, name, &mut state, runtime) {
            triggers.push(Arc::new(trigger));
        }
    }

    report.triggers = triggers.len();
    report.record(state.log_mut().take_emitted());
    debug!(
        "Parsed '{}': {} trigger(s), {} error(s), {} warning(s)",
        name, report.triggers, report.errors, report.warnings
    );

    let script = LoadedScript {
        name: name.to_string(),
        path: None,
        triggers,
    };
    (script, report)
}

fn parse_trigger(node: &Node, script: &str, state: &mut ParserState, runtime: &Runtime) -> Option<Trigger> {
    let parsed = state.parse_event(&node.key)?;
    if node.children().is_empty() {
        state.error(format!("Empty trigger: '{}'", node.key), ErrorQuality::SemanticError);
        return None;
    }
    state.start_trigger(parsed.classes.clone());
    let (graph, entry) = TriggerBuilder::new(state, script).build(node.children());

    let Some(id) = runtime.next_trigger_id() else {
        state.set_location(script, node.line);
        state.error("Too many triggers have been loaded", ErrorQuality::SemanticError);
        return None;
    };
    debug!("Trigger {} '{}' has {} item(s)", id, node.key, graph.len());
    Some(Trigger::new(
        id,
        SourceLocation::new(script, node.line),
        parsed.event,
        parsed.classes,
        graph,
        entry,
    ))
}

// ========== Options ==========

/// `name: value` entries of an `options:` section
fn read_options(node: &Node, script: &str, state: &mut ParserState, options: &mut HashMap<String, String>) {
    for entry in node.children() {
        state.set_location(script, entry.line);
        let parsed = if entry.is_section() {
            None
        } else {
            entry.key.split_once(':')
        };
        match parsed {
            Some((key, value)) if !key.trim().is_empty() => {
                options.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => state.error(
                format!("Invalid option '{}'; options look like 'name: value'", entry.key),
                ErrorQuality::SemanticError,
            ),
        }
    }
}

fn substitute_node(mut node: Node, script: &str, options: &HashMap<String, String>, state: &mut ParserState) -> Node {
    if node.key.contains("{@") {
        state.set_location(script, node.line);
        node.key = substitute(&node.key, options, state);
    }
    if let Some(children) = node.children.take() {
        node.children = Some(
            children
                .into_iter()
                .map(|child| substitute_node(child, script, options, state))
                .collect(),
        );
    }
    node
}

/// Replace every `{@name}`; unknown options are reported and left as is
fn substitute(text: &str, options: &HashMap<String, String>, state: &mut ParserState) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{@") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match options.get(name) {
            Some(value) => out.push_str(value),
            None => {
                state.error(format!("undefined option {{@{}}}", name), ErrorQuality::SemanticError);
                out.push_str(&rest[start..start + 3 + end]);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

// ========== Variables ==========

/// `{name} = value` entries of a `variables:` section; values only apply
/// to variables that are not set yet
fn read_variables(node: &Node, script: &str, state: &mut ParserState, runtime: &Runtime) {
    for entry in node.children() {
        state.set_location(script, entry.line);
        let parsed = entry
            .key
            .split_once('=')
            .map(|(name, value)| (name.trim(), value.trim()))
            .and_then(|(name, value)| Some((name.strip_prefix('{')?.strip_suffix('}')?, value)));
        let Some((name, value)) = parsed.filter(|(name, _)| !name.is_empty() && !name.contains('%')) else {
            state.error(
                format!("Invalid variable default '{}'; use '{{name}} = value'", entry.key),
                ErrorQuality::SemanticError,
            );
            continue;
        };
        if name.starts_with('_') {
            state.error(
                format!("'{{{}}}' is a local variable and can't have a default", name),
                ErrorQuality::SemanticError,
            );
            continue;
        }

        let Some(expr) = state.parse_expression(value, &Placeholder::single(&[type_names::OBJECT])) else {
            continue;
        };
        match expr.literal_values().and_then(|values| values.into_iter().next()) {
            Some(default) => {
                if runtime.variables().set_default(&name.to_lowercase(), default) {
                    debug!("Default for {{{}}} applied", name);
                }
            }
            None => state.error(
                format!("The default of {{{}}} must be a constant, not '{}'", name, value),
                ErrorQuality::SemanticError,
            ),
        }
    }
}

// ========== Files ==========

/// Script files under `dir`, recursively, in alphabetical order
///
/// Files and directories whose name starts with `disabled_prefix` are
/// skipped.
pub fn script_files(dir: &Path, extension: &str, disabled_prefix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, extension, disabled_prefix, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, extension: &str, disabled_prefix: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            warn!("Skipping script path that is not valid UTF-8: {:?}", path);
            continue;
        };
        if !disabled_prefix.is_empty() && file_name.starts_with(disabled_prefix) {
            debug!("Skipping disabled {:?}", path);
            continue;
        }
        if entry.file_type()?.is_dir() {
            collect_files(&path, extension, disabled_prefix, files)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    Ok(())
}

/// Name of a script file: its path below the scripts folder, with `/`
pub fn script_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::runtime::{EngineOptions, LogHost};
    use crate::value::Value;

    fn runtime() -> Arc<Runtime> {
        Runtime::new(builtins::default_registry().unwrap(), EngineOptions::default(), Arc::new(LogHost))
    }

    #[test]
    fn test_parse_script_counts_triggers_and_errors() {
        let rt = runtime();
        let source = "\
on load:
    set {loaded} to true

on load:
    frobnicate the widgets
    broadcast \"still here\"

stray line
";
        let (script, report) = parse_script("test.sk", source, &rt);
        assert_eq!(script.triggers.len(), 2);
        assert_eq!(report.triggers, 2);
        assert_eq!(report.errors, 2);
        assert!(report.messages[0].contains("frobnicate the widgets"));
        assert!(report.messages[0].contains("test.sk, line 5"));
        assert!(report.messages[1].contains("must be inside a trigger"));
    }

    #[test]
    fn test_options_are_substituted() {
        let rt = runtime();
        let source = "\
options:
    greeting: \"hello there\"
    count: 3

on load:
    set {greeting} to {@greeting}
    set {count} to {@count}
    set {other} to {@missing}
";
        let (script, report) = parse_script("options.sk", source, &rt);
        assert_eq!(script.triggers.len(), 1);
        assert_eq!(report.errors, 1, "{:?}", report.messages);
        assert!(report.messages[0].contains("undefined option {@missing}"));
    }

    #[test]
    fn test_variable_defaults_only_fill_unset_variables() {
        let rt = runtime();
        rt.variables().set("visits", Value::Number(10.0));
        let source = "\
variables:
    {visits} = 0
    {motd} = \"welcome\"
    {bad} = {visits}
";
        let (_, report) = parse_script("vars.sk", source, &rt);
        assert_eq!(rt.variables().get("visits"), Some(Value::Number(10.0)));
        assert_eq!(rt.variables().get("motd"), Some(Value::from("welcome")));
        assert!(rt.variables().get("bad").is_none());
        assert_eq!(report.errors, 1);
    }

    #[test]
    fn test_trigger_ids_follow_load_order() {
        let rt = runtime();
        let (first, _) = parse_script("a.sk", "on load:\n    broadcast \"a\"\n", &rt);
        let (second, _) = parse_script("b.sk", "on load:\n    broadcast \"b\"\n", &rt);
        assert!(first.triggers[0].id() < second.triggers[0].id());
    }

    #[test]
    fn test_script_files_order_and_disabled_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::create_dir(root.join("-off")).unwrap();
        for file in ["b.sk", "a.sk", "-disabled.sk", "notes.txt", "sub/c.sk", "-off/d.sk"] {
            fs::write(root.join(file), "").unwrap();
        }

        let files = script_files(root, "sk", "-").unwrap();
        let names: Vec<String> = files.iter().map(|p| script_name(root, p)).collect();
        assert_eq!(names, vec!["a.sk", "b.sk", "sub/c.sk"]);
    }
}
