//! # Event Bridge
//!
//! Routes host events to the triggers listening for them.

use crate::event::EventClass;
use crate::trigger::Trigger;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use trellis_core::TriggerId;

/// Event Bridge
///
/// # Purpose
/// Maps event class names to the triggers registered for them.
///
/// # Thread Safety
/// The table is behind a read-write lock; lookups return a snapshot so no
/// lock is held while triggers run.
#[derive(Default)]
pub struct EventBridge {
    /// Key: event class name, Value: triggers in registration order
    triggers: RwLock<HashMap<&'static str, Vec<Arc<Trigger>>>>,
}

impl EventBridge {
    /// Create an empty bridge
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger for each of its event classes
    ///
    /// # Arguments
    /// * `trigger` - A trigger whose event is checked per occurrence
    pub fn register(&self, trigger: &Arc<Trigger>) {
        let mut table = self.triggers.write();
        for class in trigger.classes() {
            let list = table.entry(class.name).or_default();
            if list.iter().any(|t| t.id() == trigger.id()) {
                continue;
            }
            let at = list.partition_point(|t| t.id() < trigger.id());
            list.insert(at, Arc::clone(trigger));
        }
        tracing::debug!("Registered trigger {} for {} event class(es)", trigger.id(), trigger.classes().len());
    }

    /// Remove a trigger from every class
    pub fn unregister(&self, id: TriggerId) {
        let mut table = self.triggers.write();
        for list in table.values_mut() {
            list.retain(|t| t.id() != id);
        }
        table.retain(|_, list| !list.is_empty());
    }

    /// Triggers for `class` or any of its ancestors, in registration order
    ///
    /// # Returns
    /// A snapshot; triggers registered later are not included
    pub fn triggers_for(&self, class: &'static EventClass) -> Vec<Arc<Trigger>> {
        let table = self.triggers.read();
        let mut found: Vec<Arc<Trigger>> = class
            .ancestors()
            .filter_map(|c| table.get(c.name))
            .flatten()
            .cloned()
            .collect();
        drop(table);

        found.sort_by_key(|t| t.id());
        found.dedup_by_key(|t| t.id());
        found
    }

    /// Number of registered triggers
    pub fn len(&self) -> usize {
        let table = self.triggers.read();
        let mut ids: Vec<TriggerId> = table.values().flatten().map(|t| t.id()).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.read().is_empty()
    }

    pub fn clear(&self) {
        self.triggers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::parser::ParserState;
    use crate::syntax::{CheckedEvent, ParseResult, SyntaxElement, TriggerEvent};
    use crate::trigger::TriggerGraph;
    use trellis_core::SourceLocation;

    static BASE: EventClass = EventClass {
        name: "base",
        parent: None,
        values: &[],
        cancellable: false,
        requires_main_thread: false,
    };

    static DERIVED: EventClass = EventClass {
        name: "derived",
        parent: Some(&BASE),
        values: &[],
        cancellable: false,
        requires_main_thread: false,
    };

    #[derive(Debug)]
    struct Always;

    impl SyntaxElement for Always {
        fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
            true
        }

        fn describe(&self, _debug: bool) -> String {
            "anything".to_string()
        }
    }

    impl CheckedEvent for Always {
        fn check(&self, _event: &Event) -> bool {
            true
        }
    }

    fn trigger(id: u32, class: &'static EventClass) -> Arc<Trigger> {
        Arc::new(Trigger::new(
            TriggerId(id),
            SourceLocation::new("test.sk", 1),
            TriggerEvent::Checked(Box::new(Always)),
            vec![class],
            TriggerGraph::new(),
            None,
        ))
    }

    fn ids(triggers: &[Arc<Trigger>]) -> Vec<u32> {
        triggers.iter().map(|t| t.id().get()).collect()
    }

    #[test]
    fn test_lookup_includes_ancestor_classes_in_order() {
        let bridge = EventBridge::new();
        bridge.register(&trigger(3, &BASE));
        bridge.register(&trigger(1, &DERIVED));
        bridge.register(&trigger(2, &BASE));

        assert_eq!(ids(&bridge.triggers_for(&DERIVED)), vec![1, 2, 3]);
        assert_eq!(ids(&bridge.triggers_for(&BASE)), vec![2, 3]);
        assert_eq!(bridge.len(), 3);
    }

    #[test]
    fn test_unregister() {
        let bridge = EventBridge::new();
        bridge.register(&trigger(1, &BASE));
        bridge.register(&trigger(2, &DERIVED));
        bridge.unregister(TriggerId(1));

        assert_eq!(ids(&bridge.triggers_for(&DERIVED)), vec![2]);
        assert!(bridge.triggers_for(&BASE).is_empty());
        bridge.unregister(TriggerId(2));
        assert!(bridge.is_empty());
    }
}
