//! Triggers and their item graph
//!
//! A trigger's items live in an arena ([`TriggerGraph`]) and refer to each
//! other by [`ItemId`]. Every item has a `next` link assigned once after
//! its whole block is built: the last item of a conditional branch links
//! to the item after the conditional, and the last item of a loop body
//! links back to the loop itself. Execution is a flat walk along these
//! links (see [`walk`]).

mod builder;
pub mod walk;

pub use builder::{classify_line, LineKind, TriggerBuilder};

use crate::event::EventClass;
use crate::syntax::{Condition, Expression, Statement, TriggerEvent};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use trellis_core::{SourceLocation, TriggerId};

/// Handle of an item inside one trigger's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u32);

impl ItemId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}", self.0)
    }
}

/// One branch of a conditional; `condition` is `None` for `else`
#[derive(Debug)]
pub struct Branch {
    pub condition: Option<Box<dyn Condition>>,
    pub items: Vec<ItemId>,
}

#[derive(Debug)]
pub enum ItemKind {
    Statement(Statement),
    /// `if` / `else if` / `else` chain; exactly one branch runs
    Conditional { branches: Vec<Branch> },
    /// Runs the body once per value
    Loop { expr: Box<dyn Expression>, body: Vec<ItemId> },
    /// Runs the body while the condition holds
    While { condition: Box<dyn Condition>, body: Vec<ItemId> },
}

#[derive(Debug)]
pub struct TriggerNode {
    pub kind: ItemKind,
    pub next: Option<ItemId>,
    pub parent: Option<ItemId>,
    pub line: usize,
}

impl TriggerNode {
    /// Script-like text of the node's own line
    pub fn describe(&self, debug: bool) -> String {
        match &self.kind {
            ItemKind::Statement(statement) => statement.describe(debug),
            ItemKind::Conditional { branches } => match branches.first().and_then(|b| b.condition.as_ref()) {
                Some(condition) => format!("if {}", condition.describe(debug)),
                None => "else".to_string(),
            },
            ItemKind::Loop { expr, .. } => format!("loop {}", expr.describe(debug)),
            ItemKind::While { condition, .. } => format!("while {}", condition.describe(debug)),
        }
    }
}

/// Arena of trigger items
#[derive(Debug, Default)]
pub struct TriggerGraph {
    nodes: Vec<TriggerNode>,
}

impl TriggerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ItemKind, parent: Option<ItemId>, line: usize) -> ItemId {
        let id = ItemId(self.nodes.len() as u32);
        self.nodes.push(TriggerNode {
            kind,
            next: None,
            parent,
            line,
        });
        id
    }

    pub fn node(&self, id: ItemId) -> &TriggerNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: ItemId) -> &mut TriggerNode {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: ItemId) -> Option<&TriggerNode> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node allocated from `len` on
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &TriggerNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (ItemId(i as u32), node))
    }

    /// Link a block: each item to its successor, the last one to `tail`
    pub fn wire(&mut self, items: &[ItemId], tail: Option<ItemId>) {
        for (position, &id) in items.iter().enumerate() {
            let next = items.get(position + 1).copied().or(tail);
            self.node_mut(id).next = next;

            let children: Vec<(Vec<ItemId>, Option<ItemId>)> = match &self.node(id).kind {
                ItemKind::Statement(_) => Vec::new(),
                ItemKind::Conditional { branches } => {
                    branches.iter().map(|branch| (branch.items.clone(), next)).collect()
                }
                ItemKind::Loop { body, .. } | ItemKind::While { body, .. } => vec![(body.clone(), Some(id))],
            };
            for (block, block_tail) in children {
                self.wire(&block, block_tail);
            }
        }
    }
}

/// One compiled `on ...:` block
pub struct Trigger {
    id: TriggerId,
    script: String,
    line: usize,
    event: TriggerEvent,
    classes: Vec<&'static EventClass>,
    graph: TriggerGraph,
    entry: Option<ItemId>,
    active: AtomicBool,
}

impl Trigger {
    pub fn new(
        id: TriggerId,
        location: SourceLocation,
        event: TriggerEvent,
        classes: Vec<&'static EventClass>,
        graph: TriggerGraph,
        entry: Option<ItemId>,
    ) -> Self {
        Self {
            id,
            script: location.script,
            line: location.line,
            event,
            classes,
            graph,
            entry,
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.script.clone(), self.line)
    }

    /// Location of one item of this trigger
    pub fn item_location(&self, item: ItemId) -> SourceLocation {
        let line = self.graph.get(item).map_or(self.line, |node| node.line);
        SourceLocation::new(self.script.clone(), line)
    }

    pub fn event(&self) -> &TriggerEvent {
        &self.event
    }

    pub fn classes(&self) -> &[&'static EventClass] {
        &self.classes
    }

    pub fn graph(&self) -> &TriggerGraph {
        &self.graph
    }

    pub fn entry(&self) -> Option<ItemId> {
        self.entry
    }

    /// Whether the trigger is still loaded; delayed continuations of an
    /// unloaded trigger are dropped
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn describe(&self) -> String {
        format!("on {}", self.event.describe(false))
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("event", &self.describe())
            .field("location", &self.location().to_string())
            .field("items", &self.graph.len())
            .field("active", &self.is_active())
            .finish()
    }
}
