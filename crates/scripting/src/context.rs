//! Trigger execution context
//!
//! One context exists per trigger execution. It carries the event, the
//! local variables, the state of running loops and whether a real delay
//! has already happened. Contexts move into scheduler continuations when a
//! trigger suspends, so everything in here is `Send`.

use crate::event::Event;
use crate::registry::Registry;
use crate::runtime::Runtime;
use crate::trigger::ItemId;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use trellis_core::{Ticks, TriggerId};

struct LoopFrame {
    values: Box<dyn Iterator<Item = Value> + Send>,
    current: Option<Value>,
}

/// Execution context
pub struct TriggerContext {
    runtime: Arc<Runtime>,
    event: Arc<Event>,
    trigger: TriggerId,
    locals: HashMap<String, Value>,
    loops: HashMap<ItemId, LoopFrame>,
    current_item: Option<ItemId>,
    delayed: bool,
}

impl TriggerContext {
    pub fn new(runtime: Arc<Runtime>, event: Arc<Event>, trigger: TriggerId) -> Self {
        Self {
            runtime,
            event,
            trigger,
            locals: HashMap::new(),
            loops: HashMap::new(),
            current_item: None,
            delayed: false,
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.runtime.registry()
    }

    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    pub fn trigger_id(&self) -> TriggerId {
        self.trigger
    }

    // ========== Variables ==========

    /// Read a variable; names starting with `_` are local to this execution
    pub fn variable(&self, name: &str) -> Option<Value> {
        let key = name.to_lowercase();
        if is_local(&key) {
            self.locals.get(&key).cloned()
        } else {
            self.runtime.variables().get(&key)
        }
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        let key = name.to_lowercase();
        if is_local(&key) {
            self.locals.insert(key, value);
        } else {
            self.runtime.variables().set(&key, value);
        }
    }

    pub fn delete_variable(&mut self, name: &str) {
        let key = name.to_lowercase();
        if is_local(&key) {
            self.locals.remove(&key);
        } else {
            self.runtime.variables().delete(&key);
        }
    }

    // ========== Loops ==========

    pub fn has_loop(&self, id: ItemId) -> bool {
        self.loops.contains_key(&id)
    }

    pub fn start_loop(&mut self, id: ItemId, values: Box<dyn Iterator<Item = Value> + Send>) {
        self.loops.insert(id, LoopFrame { values, current: None });
    }

    /// Move a loop to its next value; false once exhausted
    pub fn advance_loop(&mut self, id: ItemId) -> bool {
        let Some(frame) = self.loops.get_mut(&id) else {
            return false;
        };
        frame.current = frame.values.next();
        frame.current.is_some()
    }

    pub fn end_loop(&mut self, id: ItemId) {
        self.loops.remove(&id);
    }

    /// Current value of a running loop
    pub fn loop_value(&self, id: ItemId) -> Option<Value> {
        self.loops.get(&id).and_then(|frame| frame.current.clone())
    }

    // ========== Walk state ==========

    pub fn current_item(&self) -> Option<ItemId> {
        self.current_item
    }

    pub fn set_current_item(&mut self, item: Option<ItemId>) {
        self.current_item = item;
    }

    /// Whether a real delay has happened in this execution
    pub fn is_delayed(&self) -> bool {
        self.delayed
    }

    pub fn mark_delayed(&mut self) {
        self.delayed = true;
    }

    /// Run a write against host state on the next tick
    pub fn defer(&self, write: impl FnOnce() + Send + 'static) {
        self.runtime.scheduler().schedule_once(Ticks::ONE, write);
    }

    /// Send a message to everyone through the host
    pub fn broadcast(&self, message: &str) {
        self.runtime.host().broadcast(message);
    }
}

fn is_local(key: &str) -> bool {
    key.starts_with('_')
}

impl fmt::Debug for TriggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerContext")
            .field("trigger", &self.trigger)
            .field("event", &self.event.class().name)
            .field("locals", &self.locals)
            .field("loops", &self.loops.len())
            .field("current_item", &self.current_item)
            .field("delayed", &self.delayed)
            .finish()
    }
}
