//! Host events
//!
//! Event classes are declared statically by the host (and by the built-in
//! vocabulary). An [`Event`] is one occurrence, carrying typed values that
//! `event-<type>` expressions read.

use crate::types::TypeRegistry;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A kind of host event
#[derive(Debug)]
pub struct EventClass {
    pub name: &'static str,
    /// Triggers listening on the parent also receive this class
    pub parent: Option<&'static EventClass>,
    /// Type code names of the values this event provides
    pub values: &'static [&'static str],
    pub cancellable: bool,
    /// Asynchronous occurrences must be handed to the main thread
    pub requires_main_thread: bool,
}

impl EventClass {
    /// The class itself followed by its ancestors
    pub fn ancestors(&'static self) -> impl Iterator<Item = &'static EventClass> {
        std::iter::successors(Some(self), |class| class.parent)
    }

    /// Whether this class is `other` or derives from it
    pub fn is_a(&'static self, other: &EventClass) -> bool {
        self.ancestors().any(|class| class.name == other.name)
    }

    /// Type this class provides for `wanted`, if any
    pub fn value_type(&self, wanted: &str, types: &TypeRegistry) -> Option<&'static str> {
        self.values
            .iter()
            .copied()
            .find(|&t| t == wanted)
            .or_else(|| self.values.iter().copied().find(|&t| types.is_assignable(t, wanted)))
    }
}

impl PartialEq for EventClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// One occurrence of a host event
pub struct Event {
    class: &'static EventClass,
    values: RwLock<HashMap<&'static str, Value>>,
    cancelled: AtomicBool,
    asynchronous: bool,
}

impl Event {
    pub fn new(class: &'static EventClass) -> Self {
        Self {
            class,
            values: RwLock::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
            asynchronous: false,
        }
    }

    /// Attach the value of one of the class's declared types
    pub fn with_value(self, type_name: &'static str, value: impl Into<Value>) -> Self {
        self.values.write().insert(type_name, value.into());
        self
    }

    /// Mark this occurrence as fired off the main thread
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    pub fn class(&self) -> &'static EventClass {
        self.class
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    pub fn value(&self, type_name: &str) -> Option<Value> {
        self.values.read().get(type_name).cloned()
    }

    pub fn set_value(&self, type_name: &'static str, value: Value) {
        self.values.write().insert(type_name, value);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns false if the class cannot be cancelled
    pub fn set_cancelled(&self, cancelled: bool) -> bool {
        if !self.class.cancellable {
            return false;
        }
        self.cancelled.store(cancelled, Ordering::Release);
        true
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("class", &self.class.name)
            .field("values", &*self.values.read())
            .field("cancelled", &self.is_cancelled())
            .field("asynchronous", &self.asynchronous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BASE: EventClass = EventClass {
        name: "player event",
        parent: None,
        values: &["player"],
        cancellable: false,
        requires_main_thread: true,
    };

    static CHAT: EventClass = EventClass {
        name: "chat",
        parent: Some(&BASE),
        values: &["player", "text"],
        cancellable: true,
        requires_main_thread: true,
    };

    #[test]
    fn test_ancestry() {
        assert!(CHAT.is_a(&BASE));
        assert!(!BASE.is_a(&CHAT));
        let names: Vec<_> = CHAT.ancestors().map(|c| c.name).collect();
        assert_eq!(names, vec!["chat", "player event"]);
    }

    #[test]
    fn test_cancellation() {
        let chat = Event::new(&CHAT).with_value("text", "hi");
        assert!(chat.set_cancelled(true));
        assert!(chat.is_cancelled());
        assert_eq!(chat.value("text"), Some(Value::from("hi")));

        let base = Event::new(&BASE);
        assert!(!base.set_cancelled(true));
        assert!(!base.is_cancelled());
    }
}
