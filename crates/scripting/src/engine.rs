//! # Script Engine
//!
//! The host-facing entry point: loads scripts into triggers, activates
//! them, and forwards host events and ticks to the runtime.

use crate::builtins;
use crate::error::{Result, ScriptError};
use crate::event::Event;
use crate::loader::{parse_script, script_files, script_name, LoadReport, LoadedScript, ScriptReport};
use crate::registry::Registry;
use crate::runtime::{EngineOptions, Host, LogHost, Runtime};
use crate::syntax::TriggerEvent;
use crate::trigger::Trigger;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Script Engine
///
/// # Purpose
/// Owns the loaded scripts and the runtime their triggers execute in.
///
/// # Thread Safety
/// Loaded scripts sit behind a read-write lock that is never held while
/// triggers run, so `on load` triggers and events fired from other
/// threads cannot deadlock against a load.
pub struct ScriptEngine {
    runtime: Arc<Runtime>,
    /// Key: script name
    scripts: RwLock<BTreeMap<String, LoadedScript>>,
}

impl ScriptEngine {
    /// Create an engine over a closed registry
    pub fn new(registry: Arc<Registry>, options: EngineOptions, host: Arc<dyn Host>) -> Self {
        Self {
            runtime: Runtime::new(registry, options, host),
            scripts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Engine with only the built-in vocabulary, broadcasting to the log
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(
            builtins::default_registry()?,
            EngineOptions::default(),
            Arc::new(LogHost),
        ))
    }

    #[inline]
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    // ========== Loading ==========

    /// Load every enabled script below `dir`
    ///
    /// # Returns
    /// The per-script report. Unreadable files are reported as a script
    /// error; only a folder that cannot be listed fails the whole load.
    pub fn load_directory(&self, dir: &Path) -> Result<LoadReport> {
        let options = self.runtime.options();
        let files = script_files(dir, &options.script_extension, &options.disabled_prefix)?;
        info!("Loading {} script(s) from {:?}", files.len(), dir);

        let mut report = LoadReport::default();
        for path in files {
            let name = script_name(dir, &path);
            match self.load_script(&path, &name) {
                Ok(script) => report.push(script),
                Err(e) => {
                    warn!("Could not read script {:?}: {}", path, e);
                    report.push(ScriptReport {
                        name,
                        errors: 1,
                        messages: vec![format!("Could not read the file: {}", e)],
                        ..ScriptReport::default()
                    });
                }
            }
        }
        info!("{}", report.summary());
        Ok(report)
    }

    /// Load one script file under the given name
    pub fn load_script(&self, path: &Path, name: &str) -> Result<ScriptReport> {
        let source = fs::read_to_string(path)?;
        let (mut script, report) = parse_script(name, &source, &self.runtime);
        script.path = Some(path.to_path_buf());
        self.install(script);
        Ok(report)
    }

    /// Load a script from text; a script already loaded under `name` is
    /// replaced
    pub fn load_source(&self, name: &str, source: &str) -> ScriptReport {
        let (script, report) = parse_script(name, source, &self.runtime);
        self.install(script);
        report
    }

    fn install(&self, script: LoadedScript) {
        let triggers = script.triggers.clone();
        let previous = self.scripts.write().insert(script.name.clone(), script);
        if let Some(previous) = previous {
            debug!("Replacing script '{}'", previous.name);
            self.deactivate(&previous);
        }
        for trigger in &triggers {
            self.activate(trigger);
        }
    }

    /// Unload a script: its triggers stop receiving events and its
    /// pending delayed continuations are dropped
    pub fn unload(&self, name: &str) -> Result<()> {
        let script = self
            .scripts
            .write()
            .remove(name)
            .ok_or_else(|| ScriptError::NotFound(format!("script '{}'", name)))?;
        self.deactivate(&script);
        info!("Unloaded script '{}'", name);
        Ok(())
    }

    /// Unload and load a script file again
    pub fn reload(&self, name: &str) -> Result<ScriptReport> {
        let path = {
            let scripts = self.scripts.read();
            let script = scripts
                .get(name)
                .ok_or_else(|| ScriptError::NotFound(format!("script '{}'", name)))?;
            script
                .path
                .clone()
                .ok_or_else(|| ScriptError::NotFound(format!("file of script '{}'", name)))?
        };
        // Loading replaces the old triggers
        self.load_script(&path, name)
    }

    pub fn unload_all(&self) {
        let scripts = std::mem::take(&mut *self.scripts.write());
        for script in scripts.values() {
            self.deactivate(script);
        }
        info!("Unloaded {} script(s)", scripts.len());
    }

    fn activate(&self, trigger: &Arc<Trigger>) {
        match trigger.event() {
            TriggerEvent::Checked(_) => self.runtime.bridge().register(trigger),
            TriggerEvent::SelfRegistering(event) => event.register(Arc::downgrade(trigger), &self.runtime),
        }
    }

    fn deactivate(&self, script: &LoadedScript) {
        for trigger in &script.triggers {
            trigger.deactivate();
            match trigger.event() {
                TriggerEvent::Checked(_) => self.runtime.bridge().unregister(trigger.id()),
                TriggerEvent::SelfRegistering(event) => event.unregister(&self.runtime),
            }
        }
    }

    // ========== Running ==========

    /// Deliver a host event; see [`Runtime::fire`]
    pub fn fire(&self, event: Event) -> Result<usize> {
        self.runtime.fire(event)
    }

    /// Advance the host by one tick
    pub fn tick(&self) {
        self.runtime.tick();
    }

    pub fn script_names(&self) -> Vec<String> {
        self.scripts.read().keys().cloned().collect()
    }

    pub fn trigger_count(&self) -> usize {
        self.scripts.read().values().map(|s| s.triggers.len()).sum()
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        // Delayed continuations hold the runtime through their context
        self.runtime.shutdown();
    }
}
