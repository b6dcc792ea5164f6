//! Builds a trigger graph from section nodes
//!
//! Section lines are classified by their leading keyword; plain lines go
//! through the statement parser. Every block is built into the graph
//! first and linked once the trigger is complete.
//!
//! The builder also tracks whether a delay may have run before the line
//! being parsed. Branches of a conditional merge their outcomes, and code
//! after a loop only counts as delayed if the loop was entered delayed.

use super::{Branch, ItemId, ItemKind, TriggerGraph};
use crate::kleenean::Kleenean;
use crate::log::ErrorQuality;
use crate::node::Node;
use crate::parser::{LoopInfo, ParserState};
use crate::pattern::Placeholder;
use crate::syntax::Condition;
use crate::value::type_names;

/// Kind of a script line, decided by its leading keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    If(String),
    ElseIf(String),
    Else,
    Loop(String),
    While(String),
    Statement(String),
}

/// Classify a line. A section without a keyword is a condition section.
pub fn classify_line(key: &str, is_section: bool) -> LineKind {
    let key = key.trim();
    if !is_section {
        return LineKind::Statement(key.to_string());
    }
    if key.eq_ignore_ascii_case("else") {
        LineKind::Else
    } else if let Some(rest) = strip_keyword(key, "else if ") {
        LineKind::ElseIf(rest.to_string())
    } else if let Some(rest) = strip_keyword(key, "if ") {
        LineKind::If(rest.to_string())
    } else if let Some(rest) = strip_keyword(key, "loop ") {
        LineKind::Loop(rest.to_string())
    } else if let Some(rest) = strip_keyword(key, "while ") {
        LineKind::While(rest.to_string())
    } else {
        LineKind::If(key.to_string())
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let prefix = text.get(..keyword.len())?;
    prefix
        .eq_ignore_ascii_case(keyword)
        .then(|| text[keyword.len()..].trim())
}

/// An `if` chain that may still receive `else if` / `else` branches
struct OpenChain {
    id: ItemId,
    delay_before: Kleenean,
    outcomes: Vec<Kleenean>,
    has_else: bool,
}

pub struct TriggerBuilder<'a> {
    state: &'a mut ParserState,
    script: String,
    graph: TriggerGraph,
}

impl<'a> TriggerBuilder<'a> {
    pub fn new(state: &'a mut ParserState, script: &str) -> Self {
        Self {
            state,
            script: script.to_string(),
            graph: TriggerGraph::new(),
        }
    }

    /// Build and link the items of one trigger; returns the graph and its
    /// entry item
    pub fn build(mut self, nodes: &[Node]) -> (TriggerGraph, Option<ItemId>) {
        let top = self.build_block(nodes, None);
        self.graph.wire(&top, None);
        (self.graph, top.first().copied())
    }

    fn build_block(&mut self, nodes: &[Node], parent: Option<ItemId>) -> Vec<ItemId> {
        let mut items = Vec::new();
        let mut chain: Option<OpenChain> = None;
        // Set after an `if` that failed, so its `else` parts are skipped quietly
        let mut skip_else = false;

        for node in nodes {
            self.state.set_location(&self.script, node.line);
            let kind = classify_line(&node.key, node.is_section());

            if !matches!(kind, LineKind::ElseIf(_) | LineKind::Else) {
                if let Some(open) = chain.take() {
                    self.close_chain(open);
                }
                skip_else = false;
            }
            if node.is_section() && node.children().is_empty() {
                self.state
                    .error(format!("Empty section: '{}'", node.key), ErrorQuality::SemanticError);
                skip_else |= matches!(kind, LineKind::If(_));
                continue;
            }

            match kind {
                LineKind::If(text) => {
                    let Some(condition) = self.state.parse_condition(&text) else {
                        skip_else = true;
                        continue;
                    };
                    let id = self.graph.push(ItemKind::Conditional { branches: Vec::new() }, parent, node.line);
                    items.push(id);
                    let mut open = OpenChain {
                        id,
                        delay_before: self.state.has_delay_before(),
                        outcomes: Vec::new(),
                        has_else: false,
                    };
                    self.build_branch(&mut open, Some(condition), node);
                    chain = Some(open);
                }
                LineKind::ElseIf(text) => {
                    if skip_else {
                        continue;
                    }
                    let Some(open) = chain.as_mut().filter(|open| !open.has_else) else {
                        self.state.error(
                            "'else if' has to be placed just after another 'if' or 'else if' section",
                            ErrorQuality::SemanticError,
                        );
                        continue;
                    };
                    if let Some(condition) = self.state.parse_condition(&text) {
                        self.build_branch(open, Some(condition), node);
                    }
                }
                LineKind::Else => {
                    if skip_else {
                        continue;
                    }
                    let Some(open) = chain.as_mut().filter(|open| !open.has_else) else {
                        self.state.error(
                            "'else' has to be placed just after an 'if' or 'else if' section",
                            ErrorQuality::SemanticError,
                        );
                        continue;
                    };
                    open.has_else = true;
                    self.build_branch(open, None, node);
                }
                LineKind::Loop(text) => {
                    if let Some(id) = self.build_loop(&text, node, parent) {
                        items.push(id);
                    }
                }
                LineKind::While(text) => {
                    if let Some(id) = self.build_while(&text, node, parent) {
                        items.push(id);
                    }
                }
                LineKind::Statement(text) => {
                    let Some(statement) = self.state.parse_statement(&text) else {
                        continue;
                    };
                    let delays = statement.is_delay();
                    items.push(self.graph.push(ItemKind::Statement(statement), parent, node.line));
                    if delays {
                        self.state.set_delay(Kleenean::True);
                    }
                }
            }
        }

        if let Some(open) = chain.take() {
            self.close_chain(open);
        }
        items
    }

    fn build_branch(&mut self, open: &mut OpenChain, condition: Option<Box<dyn Condition>>, node: &Node) {
        self.state.set_delay(open.delay_before);
        let body = self.build_block(node.children(), Some(open.id));
        open.outcomes.push(self.state.has_delay_before());
        if let ItemKind::Conditional { branches } = &mut self.graph.node_mut(open.id).kind {
            branches.push(Branch { condition, items: body });
        }
    }

    fn close_chain(&mut self, open: OpenChain) {
        let mut outcomes = open.outcomes;
        // Without an else, falling through every branch keeps the old state
        if !open.has_else {
            outcomes.push(open.delay_before);
        }
        self.state.set_delay(Kleenean::merge_branches(outcomes));
    }

    fn build_loop(&mut self, text: &str, node: &Node, parent: Option<ItemId>) -> Option<ItemId> {
        let expr = self
            .state
            .parse_expression(text, &Placeholder::of(&[type_names::OBJECT]))?;
        if expr.is_single() {
            self.state.error(
                format!("Can't loop '{}' because it's only a single value", text),
                ErrorQuality::SemanticError,
            );
            return None;
        }

        let return_type = expr.return_type().to_string();
        let mark = self.graph.len();
        let id = self.graph.push(ItemKind::Loop { expr, body: Vec::new() }, parent, node.line);

        let before = self.state.has_delay_before();
        self.state.push_loop(LoopInfo { id, return_type });
        let body = self.build_block(node.children(), Some(id));
        self.state.pop_loop();

        self.finish_repeating(id, mark, body, before)
    }

    fn build_while(&mut self, text: &str, node: &Node, parent: Option<ItemId>) -> Option<ItemId> {
        let condition = self.state.parse_condition(text)?;
        let mark = self.graph.len();
        let id = self.graph.push(
            ItemKind::While {
                condition,
                body: Vec::new(),
            },
            parent,
            node.line,
        );

        let before = self.state.has_delay_before();
        let body = self.build_block(node.children(), Some(id));
        self.finish_repeating(id, mark, body, before)
    }

    /// Attach a loop body, or drop the loop if none of its lines parsed
    fn finish_repeating(&mut self, id: ItemId, mark: usize, body: Vec<ItemId>, before: Kleenean) -> Option<ItemId> {
        if body.is_empty() {
            self.graph.truncate(mark);
            self.state.set_delay(before);
            return None;
        }
        let after = self.state.has_delay_before();
        match &mut self.graph.node_mut(id).kind {
            ItemKind::Loop { body: slot, .. } | ItemKind::While { body: slot, .. } => *slot = body,
            _ => {}
        }
        // The body may run zero times
        let merged = if before.is_true() {
            Kleenean::True
        } else if after == before {
            before
        } else {
            Kleenean::Unknown
        };
        self.state.set_delay(merged);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::context::TriggerContext;
    use crate::error::Result;
    use crate::event::{Event, EventClass};
    use crate::node::read_nodes;
    use crate::registry::{Registry, RegistryBuilder};
    use crate::syntax::{ParseResult, SyntaxElement};
    use crate::trigger::walk::{walk, WalkOutcome};
    use crate::types::ClassInfo;
    use crate::runtime::{EngineOptions, Runtime};
    use crate::value::{HostObject, Value};
    use std::sync::Arc;

    static TEST_EVENT: EventClass = EventClass {
        name: "test",
        parent: None,
        values: &["player"],
        cancellable: true,
        requires_main_thread: false,
    };

    #[derive(Debug, Default)]
    struct HasPermission {
        permission: String,
    }

    impl SyntaxElement for HasPermission {
        fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
            let permission = result
                .take(1)
                .and_then(|e| e.literal_values())
                .and_then(|values| values.first().and_then(|v| v.as_text().map(str::to_string)));
            match permission {
                Some(permission) => {
                    self.permission = permission;
                    true
                }
                None => false,
            }
        }

        fn describe(&self, _debug: bool) -> String {
            format!("player has permission \"{}\"", self.permission)
        }
    }

    impl Condition for HasPermission {
        fn check(&self, _ctx: &mut TriggerContext) -> Result<bool> {
            Ok(self.permission == "x")
        }
    }

    fn registry() -> Arc<Registry> {
        let mut builder = RegistryBuilder::new();
        builtins::register_all(&mut builder).unwrap();
        builder
            .register_type(ClassInfo::new("player", "player¦s").event_default())
            .unwrap();
        builder.register_condition(
            "has permission",
            || Box::new(HasPermission::default()),
            &["%players% (has|have) permission %texts%"],
        );
        builder.close().unwrap()
    }

    fn build(source: &str) -> (TriggerGraph, Option<ItemId>, ParserState) {
        let mut state = ParserState::new(registry());
        state.start_trigger(vec![&TEST_EVENT]);
        let (nodes, errors) = read_nodes(source);
        assert!(errors.is_empty());
        let (graph, entry) = TriggerBuilder::new(&mut state, "test.sk").build(&nodes);
        (graph, entry, state)
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("if {x} is 1", true), LineKind::If("{x} is 1".into()));
        assert_eq!(classify_line("Else If {x} is 2", true), LineKind::ElseIf("{x} is 2".into()));
        assert_eq!(classify_line("else", true), LineKind::Else);
        assert_eq!(classify_line("loop 1, 2 and 3", true), LineKind::Loop("1, 2 and 3".into()));
        assert_eq!(classify_line("while {x} is 1", true), LineKind::While("{x} is 1".into()));
        assert_eq!(classify_line("{x} is 1", true), LineKind::If("{x} is 1".into()));
        assert_eq!(classify_line("loop 1 and 2", false), LineKind::Statement("loop 1 and 2".into()));
    }

    #[test]
    fn test_conditional_nests_its_body() {
        let (graph, entry, state) = build(
            "if player has permission \"x\":\n    broadcast \"allowed\"\nbroadcast \"after\"\n",
        );
        assert_eq!(state.log().counts(), (0, 0));

        let conditional = graph.node(entry.unwrap());
        let ItemKind::Conditional { branches } = &conditional.kind else {
            panic!("expected a conditional, got {:?}", conditional.kind);
        };
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].items.len(), 1);

        let after = conditional.next.unwrap();
        assert!(matches!(graph.node(after).kind, ItemKind::Statement(_)));
        // The branch falls through to the item after the conditional
        assert_eq!(graph.node(branches[0].items[0]).next, Some(after));
        assert_eq!(graph.node(after).next, None);
    }

    #[test]
    fn test_else_if_without_if_is_skipped() {
        let (graph, entry, state) = build(
            "broadcast \"first\"\nelse if {x} is 1:\n    broadcast \"never\"\nbroadcast \"second\"\n",
        );
        let emitted = state.log().emitted();
        assert_eq!(state.log().counts(), (1, 0));
        assert!(emitted[0].message.starts_with("'else if' has to be placed"));
        assert_eq!(emitted[0].location.as_ref().map(|l| l.line), Some(2));

        assert_eq!(graph.len(), 2);
        let first = entry.unwrap();
        let second = graph.node(first).next.unwrap();
        assert_eq!(graph.node(second).describe(false), "broadcast \"second\"");
    }

    #[test]
    fn test_else_if_chain() {
        let (graph, entry, state) = build(
            "\
if {x} is 1:
    broadcast \"one\"
else if {x} is 2:
    broadcast \"two\"
else:
    broadcast \"other\"
",
        );
        assert_eq!(state.log().counts(), (0, 0));
        let ItemKind::Conditional { branches } = &graph.node(entry.unwrap()).kind else {
            panic!("expected a conditional");
        };
        assert_eq!(branches.len(), 3);
        assert!(branches[2].condition.is_none());
    }

    #[test]
    fn test_loop_over_single_value_is_rejected() {
        let (graph, _, state) = build("loop 5:\n    broadcast \"x\"\n");
        assert!(graph.is_empty());
        assert!(state.log().emitted()[0].message.contains("only a single value"));
    }

    #[test]
    fn test_loop_body_links_back() {
        let (graph, entry, _) = build("loop 1, 2 and 3:\n    broadcast \"%loop-value%\"\n");
        let id = entry.unwrap();
        let ItemKind::Loop { body, .. } = &graph.node(id).kind else {
            panic!("expected a loop");
        };
        assert_eq!(graph.node(body[0]).next, Some(id));
        assert_eq!(graph.node(id).next, None);
    }

    #[test]
    fn test_delay_merge_of_branches() {
        let (_, _, state) = build("if {x} is 1:\n    wait 1 tick\nelse:\n    broadcast \"no\"\n");
        assert_eq!(state.has_delay_before(), Kleenean::Unknown);

        let (_, _, state) = build("if {x} is 1:\n    wait 1 tick\nelse:\n    wait 2 ticks\n");
        assert_eq!(state.has_delay_before(), Kleenean::True);

        let (_, _, state) = build("if {x} is 1:\n    broadcast \"yes\"\n");
        assert_eq!(state.has_delay_before(), Kleenean::False);
    }

    #[test]
    fn test_delay_after_loop() {
        let (_, _, state) = build("loop 1 and 2:\n    wait 1 tick\n");
        assert_eq!(state.has_delay_before(), Kleenean::Unknown);

        let (_, _, state) = build("wait 1 tick\nwhile {x} is 1:\n    broadcast \"spin\"\n");
        assert_eq!(state.has_delay_before(), Kleenean::True);

        let (_, _, state) = build("loop 1 and 2:\n    broadcast \"x\"\n");
        assert_eq!(state.has_delay_before(), Kleenean::False);
    }

    #[test]
    fn test_described_sections_classify_the_same() {
        let (graph, _, _) = build(
            "\
if {x} is 1:
    broadcast \"a\"
loop 1 and 2:
    broadcast \"b\"
while {x} is 2:
    delete {x}
",
        );
        for (_, node) in graph.iter() {
            let expected = match node.kind {
                ItemKind::Statement(_) => continue,
                ItemKind::Conditional { .. } => "if",
                ItemKind::Loop { .. } => "loop",
                ItemKind::While { .. } => "while",
            };
            let described = node.describe(false);
            let reclassified = match classify_line(&described, true) {
                LineKind::If(_) => "if",
                LineKind::Loop(_) => "loop",
                LineKind::While(_) => "while",
                other => panic!("'{}' classified as {:?}", described, other),
            };
            assert_eq!(reclassified, expected);

            // The described text parses back into the same kind of item
            let source = format!("{}:\n    broadcast \"again\"\n", described);
            let (rebuilt, entry, state) = build(&source);
            assert_eq!(state.log().counts(), (0, 0), "'{}' did not parse back", described);
            let kind = &rebuilt.node(entry.unwrap()).kind;
            assert_eq!(std::mem::discriminant(kind), std::mem::discriminant(&node.kind));
        }
    }

    #[test]
    fn test_loop_of_many_values_keeps_a_flat_stack() {
        let (graph, entry, state) = build(
            "loop numbers from 1 to 100000:\n    add 1 to {_count}\nset {count} to {_count}\n",
        );
        assert_eq!(state.log().counts(), (0, 0));

        let runtime = Runtime::new(registry(), EngineOptions::default(), Arc::new(crate::runtime::LogHost));
        let event = Arc::new(Event::new(&TEST_EVENT).with_value(
            "player",
            Value::Object(HostObject::new("player", "alice")),
        ));
        let mut ctx = TriggerContext::new(Arc::clone(&runtime), event, trellis_core::TriggerId(1));
        let outcome = walk(&graph, entry, &mut ctx).unwrap();
        assert_eq!(outcome, WalkOutcome::Finished);
        assert_eq!(runtime.variables().get("count"), Some(Value::Number(100000.0)));
    }
}
