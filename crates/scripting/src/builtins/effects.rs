//! Built-in effects
//!
//! Variable effects name their variable with a raw `{...}` group instead of
//! a placeholder, so `set {x} to 1` writes the variable rather than its
//! current value.

use super::expressions::VariableName;
use crate::context::TriggerContext;
use crate::error::{Result, ScriptError};
use crate::log::ErrorQuality;
use crate::parser::ParserState;
use crate::registry::RegistryBuilder;
use crate::syntax::{Effect, Expression, Flow, ParseResult, SyntaxElement};
use crate::value::Value;
use std::sync::Arc;
use trellis_core::Ticks;

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_effect("broadcast", || Box::new(Broadcast::default()), &["broadcast %texts%"]);
    builder.register_effect("set", || Box::new(SetVariable::default()), &["set \\{<.+>\\} to %object%"]);
    builder.register_effect("add", || Box::new(AddToVariable::default()), &["add %number% to \\{<.+>\\}"]);
    builder.register_effect("delete", || Box::new(DeleteVariable::default()), &["(delete|clear) \\{<.+>\\}"]);
    builder.register_effect("wait", || Box::new(Wait::default()), &["wait [for] %number% tick[s]"]);
    builder.register_effect(
        "cancel event",
        || Box::new(CancelEvent::default()),
        &["(1¦cancel|2¦uncancel) [the] event"],
    );
}

fn variable_name(result: &ParseResult, state: &mut ParserState) -> Option<VariableName> {
    VariableName::parse(result.regexes.first()?, state)
}

fn not_initialized() -> ScriptError {
    ScriptError::runtime("effect used before it was initialized")
}

// ========== Broadcast ==========

#[derive(Debug, Default)]
pub struct Broadcast {
    messages: Option<Box<dyn Expression>>,
}

impl SyntaxElement for Broadcast {
    fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
        self.messages = result.take(0);
        self.messages.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        let messages = self.messages.as_ref().map(|m| m.describe(debug)).unwrap_or_default();
        format!("broadcast {}", messages)
    }
}

impl Effect for Broadcast {
    fn execute(&self, ctx: &mut TriggerContext) -> Result<()> {
        let messages = self.messages.as_ref().ok_or_else(not_initialized)?;
        for message in messages.get_array(ctx)? {
            let text = ctx.registry().format(&message);
            ctx.broadcast(&text);
        }
        Ok(())
    }
}

// ========== Variables ==========

/// `set {name} to value`; setting to nothing deletes the variable
#[derive(Debug, Default)]
pub struct SetVariable {
    name: Option<VariableName>,
    value: Option<Box<dyn Expression>>,
}

impl SyntaxElement for SetVariable {
    fn init(&mut self, mut result: ParseResult, state: &mut ParserState) -> bool {
        self.name = variable_name(&result, state);
        self.value = result.take(0);
        self.name.is_some() && self.value.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        match (&self.name, &self.value) {
            (Some(name), Some(value)) => format!("set {} to {}", name.describe(debug), value.describe(debug)),
            _ => "set".to_string(),
        }
    }
}

impl Effect for SetVariable {
    fn execute(&self, ctx: &mut TriggerContext) -> Result<()> {
        let (Some(name), Some(value)) = (&self.name, &self.value) else {
            return Err(not_initialized());
        };
        let name = name.resolve(ctx)?;
        match value.get_single(ctx)? {
            Some(value) => ctx.set_variable(&name, value),
            None => ctx.delete_variable(&name),
        }
        Ok(())
    }
}

/// `add n to {name}`; an unset variable counts as zero
#[derive(Debug, Default)]
pub struct AddToVariable {
    amount: Option<Box<dyn Expression>>,
    name: Option<VariableName>,
}

impl SyntaxElement for AddToVariable {
    fn init(&mut self, mut result: ParseResult, state: &mut ParserState) -> bool {
        self.amount = result.take(0);
        self.name = variable_name(&result, state);
        self.amount.is_some() && self.name.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        match (&self.amount, &self.name) {
            (Some(amount), Some(name)) => format!("add {} to {}", amount.describe(debug), name.describe(debug)),
            _ => "add".to_string(),
        }
    }
}

impl Effect for AddToVariable {
    fn execute(&self, ctx: &mut TriggerContext) -> Result<()> {
        let (Some(amount), Some(name)) = (&self.amount, &self.name) else {
            return Err(not_initialized());
        };
        let Some(amount) = amount.get_single(ctx)?.and_then(|v| v.as_number()) else {
            return Ok(());
        };
        let name = name.resolve(ctx)?;
        let current = match ctx.variable(&name) {
            None => 0.0,
            Some(Value::Number(n)) => n,
            Some(other) => {
                return Err(ScriptError::runtime(format!(
                    "can't add {} to {{{}}} because it holds a {} ('{}')",
                    amount,
                    name,
                    other.type_name(),
                    other
                )))
            }
        };
        ctx.set_variable(&name, Value::Number(current + amount));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DeleteVariable {
    name: Option<VariableName>,
}

impl SyntaxElement for DeleteVariable {
    fn init(&mut self, result: ParseResult, state: &mut ParserState) -> bool {
        self.name = variable_name(&result, state);
        self.name.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        let name = self.name.as_ref().map(|n| n.describe(debug)).unwrap_or_default();
        format!("delete {}", name)
    }
}

impl Effect for DeleteVariable {
    fn execute(&self, ctx: &mut TriggerContext) -> Result<()> {
        let name = self.name.as_ref().ok_or_else(not_initialized)?.resolve(ctx)?;
        ctx.delete_variable(&name);
        Ok(())
    }
}

// ========== Delays ==========

/// `wait n ticks`: suspends the trigger for at least one tick
#[derive(Debug, Default)]
pub struct Wait {
    ticks: Option<Box<dyn Expression>>,
}

impl SyntaxElement for Wait {
    fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
        self.ticks = result.take(0);
        self.ticks.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        let ticks = self.ticks.as_ref().map(|t| t.describe(debug)).unwrap_or_default();
        format!("wait {} ticks", ticks)
    }
}

impl Effect for Wait {
    fn execute(&self, _ctx: &mut TriggerContext) -> Result<()> {
        Ok(())
    }

    fn walk(&self, ctx: &mut TriggerContext) -> Result<Flow> {
        let ticks = self.ticks.as_ref().ok_or_else(not_initialized)?;
        let ticks = ticks
            .get_single(ctx)?
            .and_then(|v| v.as_number())
            .filter(|n| n.is_finite())
            .ok_or_else(|| ScriptError::runtime("the wait duration is not a number"))?;
        Ok(Flow::Suspend(Ticks(ticks.round().max(1.0) as u64)))
    }

    fn is_delay(&self) -> bool {
        true
    }
}

// ========== Events ==========

/// `cancel the event` / `uncancel the event`
///
/// After a delay the event has already been handled by the host, so the
/// change is written on the next tick instead of mid-walk.
#[derive(Debug, Default)]
pub struct CancelEvent {
    cancel: bool,
    after_delay: bool,
}

impl SyntaxElement for CancelEvent {
    fn init(&mut self, result: ParseResult, state: &mut ParserState) -> bool {
        let events = state.current_events().to_vec();
        if events.is_empty() {
            state.error("Events can only be cancelled inside a trigger", ErrorQuality::SemanticError);
            return false;
        }
        if let Some(class) = events.iter().find(|class| !class.cancellable) {
            state.error(
                format!("A '{}' event can't be cancelled", class.name),
                ErrorQuality::SemanticError,
            );
            return false;
        }
        self.cancel = result.has_mark(1);
        self.after_delay = state.has_delay_before().is_possible();
        if self.after_delay {
            tracing::debug!("'{}' may run after a delay; its write will be deferred", result.text);
        }
        true
    }

    fn describe(&self, _debug: bool) -> String {
        if self.cancel {
            "cancel the event".to_string()
        } else {
            "uncancel the event".to_string()
        }
    }
}

impl Effect for CancelEvent {
    fn execute(&self, ctx: &mut TriggerContext) -> Result<()> {
        let cancel = self.cancel;
        if self.after_delay {
            let event = Arc::clone(ctx.event());
            ctx.defer(move || {
                event.set_cancelled(cancel);
            });
        } else {
            ctx.event().set_cancelled(cancel);
        }
        Ok(())
    }
}
