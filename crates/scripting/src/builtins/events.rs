//! Built-in events
//!
//! Both built-in events drive their triggers themselves instead of going
//! through the event bridge: `on load` runs once when its script is
//! activated and `every N ticks` owns a repeating scheduler task.

use crate::event::{Event, EventClass};
use crate::log::ErrorQuality;
use crate::parser::ParserState;
use crate::registry::{EventFactory, RegistryBuilder};
use crate::runtime::Runtime;
use crate::scheduler::TaskId;
use crate::syntax::{ParseResult, SelfRegisteringEvent, SyntaxElement};
use crate::trigger::Trigger;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use trellis_core::Ticks;

pub static SCRIPT_LOAD: EventClass = EventClass {
    name: "script load",
    parent: None,
    values: &[],
    cancellable: false,
    requires_main_thread: false,
};

pub static PERIODIC: EventClass = EventClass {
    name: "periodic",
    parent: None,
    values: &[],
    cancellable: false,
    requires_main_thread: false,
};

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_event(
        "script load",
        EventFactory::SelfRegistering(|| Box::new(ScriptLoad)),
        &[&SCRIPT_LOAD],
        &["[script] load"],
    );
    builder.register_event(
        "periodic",
        EventFactory::SelfRegistering(|| Box::new(Periodic::default())),
        &[&PERIODIC],
        &["every %*number% tick[s]"],
    );
}

// ========== Script load ==========

#[derive(Debug)]
pub struct ScriptLoad;

impl SyntaxElement for ScriptLoad {
    fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
        true
    }

    fn describe(&self, _debug: bool) -> String {
        "script load".to_string()
    }
}

impl SelfRegisteringEvent for ScriptLoad {
    fn register(&self, trigger: Weak<Trigger>, runtime: &Arc<Runtime>) {
        if let Some(trigger) = trigger.upgrade() {
            runtime.execute(&trigger, Arc::new(Event::new(&SCRIPT_LOAD)));
        }
    }

    fn unregister(&self, _runtime: &Runtime) {}
}

// ========== Periodic ==========

/// `every N ticks`
///
/// # Thread Safety
/// The task handle sits behind a mutex since registration happens through
/// a shared reference to the trigger.
#[derive(Debug, Default)]
pub struct Periodic {
    period: Ticks,
    task: Mutex<Option<TaskId>>,
}

impl SyntaxElement for Periodic {
    fn init(&mut self, mut result: ParseResult, state: &mut ParserState) -> bool {
        let period = result
            .take(0)
            .and_then(|expr| expr.literal_values())
            .and_then(|values| values.first().and_then(|v| v.as_number()));
        match period {
            Some(n) if n.is_finite() && n >= 1.0 => {
                self.period = Ticks(n.round() as u64);
                true
            }
            Some(n) => {
                state.error(
                    format!("The period must be at least one tick, not {}", n),
                    ErrorQuality::SemanticError,
                );
                false
            }
            None => false,
        }
    }

    fn describe(&self, _debug: bool) -> String {
        format!("every {} ticks", self.period.0)
    }
}

impl SelfRegisteringEvent for Periodic {
    fn register(&self, trigger: Weak<Trigger>, runtime: &Arc<Runtime>) {
        let weak_runtime = Arc::downgrade(runtime);
        let id = runtime.scheduler().schedule_repeating(self.period, self.period, move || {
            let (Some(runtime), Some(trigger)) = (weak_runtime.upgrade(), trigger.upgrade()) else {
                return;
            };
            if trigger.is_active() {
                runtime.execute(&trigger, Arc::new(Event::new(&PERIODIC)));
            }
        });
        if let Some(previous) = self.task.lock().replace(id) {
            runtime.scheduler().cancel(previous);
        }
    }

    fn unregister(&self, runtime: &Runtime) {
        if let Some(id) = self.task.lock().take() {
            runtime.scheduler().cancel(id);
        }
    }
}
