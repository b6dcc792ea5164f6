//! Built-in vocabulary
//!
//! The minimal set of types, expressions, conditions, effects and events
//! every host gets. Hosts register their own vocabulary on the same
//! [`RegistryBuilder`] before closing it.

pub mod conditions;
pub mod effects;
pub mod events;
pub mod expressions;
pub mod types;

use crate::error::Result;
use crate::registry::{Registry, RegistryBuilder};
use std::sync::Arc;

/// Register the whole built-in vocabulary
///
/// Types come first since every pattern refers to them by name.
/// Conditions are registered before effects so that statement lines are
/// tried as conditions first.
pub fn register_all(builder: &mut RegistryBuilder) -> Result<()> {
    types::register(builder)?;
    expressions::register(builder);
    conditions::register(builder);
    effects::register(builder);
    events::register(builder);
    Ok(())
}

/// A closed registry holding only the built-in vocabulary
pub fn default_registry() -> Result<Arc<Registry>> {
    let mut builder = RegistryBuilder::new();
    register_all(&mut builder)?;
    builder.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TriggerContext;
    use crate::event::{Event, EventClass};
    use crate::parser::ParserState;
    use crate::runtime::{EngineOptions, Host, Runtime};
    use crate::syntax::{Flow, Statement};
    use crate::value::Value;
    use parking_lot::Mutex;
    use trellis_core::{Ticks, TriggerId};

    static CHAT: EventClass = EventClass {
        name: "chat",
        parent: None,
        values: &["text"],
        cancellable: true,
        requires_main_thread: false,
    };

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Host for Recorder {
        fn broadcast(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    struct Fixture {
        runtime: Arc<Runtime>,
        host: Arc<Recorder>,
        state: ParserState,
        ctx: TriggerContext,
    }

    fn fixture() -> Fixture {
        let registry = default_registry().unwrap();
        let host = Arc::new(Recorder::default());
        let runtime = Runtime::new(Arc::clone(&registry), EngineOptions::default(), host.clone());
        let mut state = ParserState::new(registry);
        state.start_trigger(vec![&CHAT]);
        let event = Arc::new(Event::new(&CHAT).with_value("text", "hello"));
        let ctx = TriggerContext::new(Arc::clone(&runtime), event, TriggerId(1));
        Fixture {
            runtime,
            host,
            state,
            ctx,
        }
    }

    impl Fixture {
        fn run(&mut self, line: &str) -> Flow {
            match self.state.parse_statement(line) {
                Some(Statement::Effect(effect)) => effect.walk(&mut self.ctx).unwrap(),
                other => panic!("'{}' is not an effect: {:?}", line, other),
            }
        }

        fn check(&mut self, line: &str) -> bool {
            match self.state.parse_condition(line) {
                Some(condition) => condition.check(&mut self.ctx).unwrap(),
                None => panic!("'{}' is not a condition: {:?}", line, self.state.log().emitted()),
            }
        }
    }

    #[test]
    fn test_variable_effects() {
        let mut f = fixture();
        f.run("set {score} to 5");
        f.run("add 2 to {score}");
        f.run("add 1 to {_local}");
        assert_eq!(f.runtime.variables().get("score"), Some(Value::Number(7.0)));
        assert_eq!(f.ctx.variable("_local"), Some(Value::Number(1.0)));
        assert!(f.runtime.variables().get("_local").is_none());

        f.run("delete {score}");
        assert!(f.runtime.variables().get("score").is_none());
    }

    #[test]
    fn test_add_to_text_variable_fails() {
        let mut f = fixture();
        f.run("set {name} to \"bob\"");
        let Some(Statement::Effect(effect)) = f.state.parse_statement("add 1 to {name}") else {
            panic!("add did not parse");
        };
        assert!(effect.execute(&mut f.ctx).is_err());
    }

    #[test]
    fn test_variable_names_with_expressions() {
        let mut f = fixture();
        f.run("set {_i} to 3");
        f.run("set {slot::%{_i}%} to \"x\"");
        assert_eq!(f.runtime.variables().get("slot::3"), Some(Value::from("x")));
    }

    #[test]
    fn test_comparisons() {
        let mut f = fixture();
        f.run("set {x} to 1");
        assert!(f.check("{x} is 1"));
        assert!(!f.check("{x} is not 1"));
        assert!(f.check("{x} isn't 2"));
        assert!(f.check("{x} is 1 or 2"));
        assert!(!f.check("{x} is 1 and 2"));
        assert!(f.check("{x} is less than 2"));
        assert!(f.check("{x} is greater than or equal to 1"));
        assert!(!f.check("{x} is greater than 1"));
        // Unset variables satisfy nothing, negated or not
        assert!(!f.check("{unset} is 1"));
        assert!(!f.check("{unset} is not 1"));
    }

    #[test]
    fn test_broadcast_formats_values() {
        let mut f = fixture();
        f.run("set {_n} to 2.50");
        f.run("broadcast \"n = %{_n}%\" and text");
        assert_eq!(*f.host.0.lock(), vec!["n = 2.5".to_string(), "hello".to_string()]);
    }

    #[test]
    fn test_wait_suspends() {
        let mut f = fixture();
        assert_eq!(f.run("wait 3 ticks"), Flow::Suspend(Ticks(3)));
        assert_eq!(f.run("wait 0 ticks"), Flow::Suspend(Ticks(1)));
        assert!(f.state.parse_statement("wait 1 tick").is_some_and(|s| s.is_delay()));
    }

    #[test]
    fn test_cancel_is_deferred_after_delay() {
        let mut f = fixture();
        f.run("cancel the event");
        assert!(f.ctx.event().is_cancelled());

        f.state.set_delay(crate::kleenean::Kleenean::Unknown);
        f.run("uncancel the event");
        assert!(f.ctx.event().is_cancelled());
        f.runtime.tick();
        assert!(!f.ctx.event().is_cancelled());
    }

    #[test]
    fn test_loop_value_requires_a_loop() {
        let mut f = fixture();
        assert!(f.state.parse_statement("broadcast loop-value").is_none());
        let errors = f.state.log().emitted();
        assert!(errors.iter().any(|e| e.message.contains("no loop")), "{:?}", errors);
    }

    #[test]
    fn test_number_range_is_lazy_and_inclusive() {
        let mut f = fixture();
        let expr = f
            .state
            .parse_expression("numbers from 2 to 5", &crate::pattern::Placeholder::of(&["number"]))
            .unwrap();
        let values: Vec<Value> = expr.iterate(&mut f.ctx).unwrap().collect();
        assert_eq!(values, vec![Value::Number(2.0), Value::Number(3.0), Value::Number(4.0), Value::Number(5.0)]);

        let empty = f
            .state
            .parse_expression("numbers between 3 and 1", &crate::pattern::Placeholder::of(&["number"]))
            .unwrap();
        assert!(empty.get_all(&mut f.ctx).unwrap().is_empty());
    }

    #[test]
    fn test_self_registering_events_parse() {
        let mut f = fixture();
        let parsed = f.state.parse_event("on load").unwrap();
        assert_eq!(parsed.classes[0].name, "script load");
        let parsed = f.state.parse_event("every 20 ticks").unwrap();
        assert_eq!(parsed.event.describe(false), "every 20 ticks");
        // The period must be a literal
        assert!(f.state.parse_event("every {x} ticks").is_none());
    }
}
