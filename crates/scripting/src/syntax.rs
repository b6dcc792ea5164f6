//! Syntax element contracts
//!
//! Every parseable construct implements [`SyntaxElement`]: it is created
//! blank by its registered factory and configured by `init` from the parse
//! result of the pattern that matched. The execution contract depends on
//! the kind of element.

use crate::context::TriggerContext;
use crate::error::Result;
use crate::event::Event;
use crate::parser::ParserState;
use crate::runtime::Runtime;
use crate::trigger::Trigger;
use crate::value::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use trellis_core::Ticks;

/// What a matched pattern hands to `init`
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Index of the matched pattern among the element's patterns
    pub matched_pattern: usize,
    /// OR of the marks of the matched alternatives
    pub mark: i32,
    /// One entry per placeholder; `None` when omitted and without default
    pub expressions: Vec<Option<Box<dyn Expression>>>,
    /// Texts of the matched regex groups
    pub regexes: Vec<String>,
    /// The matched text
    pub text: String,
}

impl ParseResult {
    /// Take the expression of placeholder `index`
    pub fn take(&mut self, index: usize) -> Option<Box<dyn Expression>> {
        self.expressions.get_mut(index).and_then(Option::take)
    }

    pub fn has_mark(&self, mark: i32) -> bool {
        self.mark & mark == mark
    }
}

/// Common contract of all syntax elements
pub trait SyntaxElement: Send + Sync + fmt::Debug {
    /// Configure from a parse result. Returning false rejects the match;
    /// an explanation should be logged through `state` first.
    fn init(&mut self, result: ParseResult, state: &mut ParserState) -> bool;

    /// Script-like description; `debug` adds type and structure details
    fn describe(&self, debug: bool) -> String;
}

/// A node producing zero or more values
pub trait Expression: SyntaxElement {
    /// Code name of the type of every produced value
    fn return_type(&self) -> &str;

    /// Whether at most one value is produced
    fn is_single(&self) -> bool;

    /// Conjunctive ("and") or disjunctive ("or") semantics
    fn and(&self) -> bool {
        true
    }

    /// Every value
    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>>;

    /// The values as seen by effects; or-lists yield one chosen value
    fn get_array(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        self.get_all(ctx)
    }

    fn get_single(&self, ctx: &mut TriggerContext) -> Result<Option<Value>> {
        Ok(self.get_array(ctx)?.into_iter().next())
    }

    /// Values for a loop
    fn iterate(&self, ctx: &mut TriggerContext) -> Result<Box<dyn Iterator<Item = Value> + Send>> {
        Ok(Box::new(self.get_all(ctx)?.into_iter()))
    }

    /// Check a predicate against the values, honouring and/or semantics.
    /// An expression without values fails the check, negated or not.
    fn check(
        &self,
        ctx: &mut TriggerContext,
        predicate: &mut dyn FnMut(&Value) -> bool,
        negated: bool,
    ) -> Result<bool> {
        let values = self.get_all(ctx)?;
        if values.is_empty() {
            return Ok(false);
        }
        let result = if self.and() {
            values.iter().all(|v| predicate(v))
        } else {
            values.iter().any(|v| predicate(v))
        };
        Ok(result != negated)
    }

    /// Values known at parse time
    fn literal_values(&self) -> Option<Vec<Value>> {
        None
    }
}

/// A statement gate
pub trait Condition: SyntaxElement {
    fn check(&self, ctx: &mut TriggerContext) -> Result<bool>;
}

/// How the walk proceeds after an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Resume with the next item after the given number of ticks
    Suspend(Ticks),
}

/// A statement with side effects
pub trait Effect: SyntaxElement {
    fn execute(&self, ctx: &mut TriggerContext) -> Result<()>;

    fn walk(&self, ctx: &mut TriggerContext) -> Result<Flow> {
        self.execute(ctx)?;
        Ok(Flow::Continue)
    }

    /// Whether running this effect suspends the trigger
    fn is_delay(&self) -> bool {
        false
    }
}

/// A parsed statement line
#[derive(Debug)]
pub enum Statement {
    Condition(Box<dyn Condition>),
    Effect(Box<dyn Effect>),
}

impl Statement {
    pub fn describe(&self, debug: bool) -> String {
        match self {
            Statement::Condition(condition) => condition.describe(debug),
            Statement::Effect(effect) => effect.describe(debug),
        }
    }

    pub fn is_delay(&self) -> bool {
        matches!(self, Statement::Effect(effect) if effect.is_delay())
    }
}

/// An event header dispatched through the event bridge
pub trait CheckedEvent: SyntaxElement {
    /// Whether this trigger wants the given occurrence
    fn check(&self, event: &Event) -> bool;
}

/// An event header that drives its trigger itself (timers, load hooks)
pub trait SelfRegisteringEvent: SyntaxElement {
    fn register(&self, trigger: Weak<Trigger>, runtime: &Arc<Runtime>);

    fn unregister(&self, runtime: &Runtime);
}

/// The event header of a trigger
#[derive(Debug)]
pub enum TriggerEvent {
    Checked(Box<dyn CheckedEvent>),
    SelfRegistering(Box<dyn SelfRegisteringEvent>),
}

impl TriggerEvent {
    pub fn describe(&self, debug: bool) -> String {
        match self {
            TriggerEvent::Checked(event) => event.describe(debug),
            TriggerEvent::SelfRegistering(event) => event.describe(debug),
        }
    }
}
