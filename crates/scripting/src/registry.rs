//! Syntax registry
//!
//! Types, converters, comparators and syntax elements are registered on a
//! [`RegistryBuilder`] during startup. [`RegistryBuilder::close`] compiles
//! every pattern and freezes the result into an immutable [`Registry`] that
//! is shared read-only by the parser and the runtime. Consuming the builder
//! is what ends the registration window.

use crate::compare::{CompareFn, ComparatorRegistry, Relation};
use crate::convert::{ConvertFn, ConverterRegistry};
use crate::error::{Result, ScriptError};
use crate::event::EventClass;
use crate::pattern::{self, Pattern};
use crate::syntax::{CheckedEvent, Condition, Effect, Expression, SelfRegisteringEvent};
use crate::types::{ClassInfo, TypeRegistry};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Selection order of expression candidates; earlier buckets win
///
/// Within one bucket the first candidate that parses wins, in the order the
/// host registered them. Two hosts registering the same patterns in a
/// different order can therefore resolve the same text differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpressionPriority {
    /// Fixed text, no placeholders
    Exact,
    /// Short forms such as variables and literals
    Simple,
    /// Values of the current event
    Event,
    /// `the x of y` style properties
    Property,
    /// General patterns
    Pattern,
    /// Patterns built from several sub-expressions
    Combined,
    /// Patterns that match nearly anything
    Everything,
}

impl ExpressionPriority {
    pub const ALL: [ExpressionPriority; 7] = [
        ExpressionPriority::Exact,
        ExpressionPriority::Simple,
        ExpressionPriority::Event,
        ExpressionPriority::Property,
        ExpressionPriority::Pattern,
        ExpressionPriority::Combined,
        ExpressionPriority::Everything,
    ];
}

pub type ExpressionFactory = fn() -> Box<dyn Expression>;
pub type ConditionFactory = fn() -> Box<dyn Condition>;
pub type EffectFactory = fn() -> Box<dyn Effect>;

#[derive(Debug, Clone, Copy)]
pub enum StatementFactory {
    Condition(ConditionFactory),
    Effect(EffectFactory),
}

#[derive(Debug, Clone, Copy)]
pub enum EventFactory {
    Checked(fn() -> Box<dyn CheckedEvent>),
    SelfRegistering(fn() -> Box<dyn SelfRegisteringEvent>),
}

#[derive(Debug)]
pub struct ExpressionInfo {
    pub name: String,
    pub factory: ExpressionFactory,
    pub return_type: String,
    pub priority: ExpressionPriority,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug)]
pub struct StatementInfo {
    pub name: String,
    pub factory: StatementFactory,
    pub patterns: Vec<Pattern>,
}

impl StatementInfo {
    pub fn is_condition(&self) -> bool {
        matches!(self.factory, StatementFactory::Condition(_))
    }
}

#[derive(Debug)]
pub struct EventInfo {
    pub name: String,
    pub factory: EventFactory,
    pub classes: Vec<&'static EventClass>,
    pub patterns: Vec<Pattern>,
}

/// How a produced type satisfies a requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// Produced values are already of an accepted type
    Direct,
    /// Values must be converted to the given type at runtime
    Convert(String),
}

struct PendingExpression {
    name: String,
    factory: ExpressionFactory,
    return_type: String,
    priority: ExpressionPriority,
    patterns: Vec<String>,
}

struct PendingStatement {
    name: String,
    factory: StatementFactory,
    patterns: Vec<String>,
}

struct PendingEvent {
    name: String,
    factory: EventFactory,
    classes: Vec<&'static EventClass>,
    patterns: Vec<String>,
}

/// Collects registrations during startup
#[derive(Default)]
pub struct RegistryBuilder {
    types: TypeRegistry,
    converters: ConverterRegistry,
    comparators: ComparatorRegistry,
    expressions: Vec<PendingExpression>,
    statements: Vec<PendingStatement>,
    events: Vec<PendingEvent>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, info: ClassInfo) -> Result<()> {
        self.types.register(info)
    }

    pub fn register_converter(&mut self, from: &str, to: &str, convert: ConvertFn) {
        self.converters.register(from, to, convert);
    }

    pub fn register_comparator(&mut self, first: &str, second: &str, compare: CompareFn, supports_ordering: bool) {
        self.comparators.register(first, second, compare, supports_ordering);
    }

    pub fn register_expression(
        &mut self,
        name: &str,
        factory: ExpressionFactory,
        return_type: &str,
        priority: ExpressionPriority,
        patterns: &[&str],
    ) {
        self.expressions.push(PendingExpression {
            name: name.to_string(),
            factory,
            return_type: return_type.to_string(),
            priority,
            patterns: to_strings(patterns),
        });
    }

    pub fn register_condition(&mut self, name: &str, factory: ConditionFactory, patterns: &[&str]) {
        self.statements.push(PendingStatement {
            name: name.to_string(),
            factory: StatementFactory::Condition(factory),
            patterns: to_strings(patterns),
        });
    }

    pub fn register_effect(&mut self, name: &str, factory: EffectFactory, patterns: &[&str]) {
        self.statements.push(PendingStatement {
            name: name.to_string(),
            factory: StatementFactory::Effect(factory),
            patterns: to_strings(patterns),
        });
    }

    pub fn register_event(
        &mut self,
        name: &str,
        factory: EventFactory,
        classes: &[&'static EventClass],
        patterns: &[&str],
    ) {
        self.events.push(PendingEvent {
            name: name.to_string(),
            factory,
            classes: classes.to_vec(),
            patterns: to_strings(patterns),
        });
    }

    /// Close registration: derive converter chains and compile all patterns.
    ///
    /// Any invalid registration fails the whole registry.
    pub fn close(self) -> Result<Arc<Registry>> {
        let RegistryBuilder {
            types,
            mut converters,
            comparators,
            expressions,
            statements,
            events,
        } = self;

        converters.close(&types);

        let mut compiled_expressions = Vec::with_capacity(expressions.len());
        for pending in expressions {
            if types.get(&pending.return_type).is_none() {
                return Err(ScriptError::Registration(format!(
                    "expression '{}' returns unknown type '{}'",
                    pending.name, pending.return_type
                )));
            }
            compiled_expressions.push(ExpressionInfo {
                patterns: compile_all(&pending.name, &pending.patterns, &types)?,
                name: pending.name,
                factory: pending.factory,
                return_type: pending.return_type,
                priority: pending.priority,
            });
        }
        // Stable: registration order is kept within a bucket
        compiled_expressions.sort_by_key(|info| info.priority);

        let mut compiled_statements = Vec::with_capacity(statements.len());
        for pending in statements {
            compiled_statements.push(StatementInfo {
                patterns: compile_all(&pending.name, &pending.patterns, &types)?,
                name: pending.name,
                factory: pending.factory,
            });
        }

        let mut compiled_events = Vec::with_capacity(events.len());
        for pending in events {
            if pending.classes.is_empty() {
                return Err(ScriptError::Registration(format!(
                    "event '{}' listens to no event class",
                    pending.name
                )));
            }
            compiled_events.push(EventInfo {
                patterns: compile_all(&pending.name, &pending.patterns, &types)?,
                name: pending.name,
                factory: pending.factory,
                classes: pending.classes,
            });
        }

        tracing::debug!(
            "Registry closed: {} types, {} converters, {} expressions, {} statements, {} events",
            types.iter().count(),
            converters.len(),
            compiled_expressions.len(),
            compiled_statements.len(),
            compiled_events.len()
        );

        Ok(Arc::new(Registry {
            types,
            converters,
            comparators,
            expressions: compiled_expressions,
            statements: compiled_statements,
            events: compiled_events,
        }))
    }
}

fn to_strings(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

fn compile_all(name: &str, sources: &[String], types: &TypeRegistry) -> Result<Vec<Pattern>> {
    if sources.is_empty() {
        return Err(ScriptError::Registration(format!("'{}' has no patterns", name)));
    }
    sources
        .iter()
        .map(|source| {
            pattern::compile(source, types).map_err(|e| {
                ScriptError::Registration(format!("pattern of '{}' failed to compile: {}", name, e))
            })
        })
        .collect()
}

/// The immutable result of registration
pub struct Registry {
    types: TypeRegistry,
    converters: ConverterRegistry,
    comparators: ComparatorRegistry,
    expressions: Vec<ExpressionInfo>,
    statements: Vec<StatementInfo>,
    events: Vec<EventInfo>,
}

impl Registry {
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn comparators(&self) -> &ComparatorRegistry {
        &self.comparators
    }

    /// Expressions ordered by priority, registration order within a bucket
    pub fn expressions(&self) -> &[ExpressionInfo] {
        &self.expressions
    }

    pub fn expressions_in(&self, priority: ExpressionPriority) -> impl Iterator<Item = &ExpressionInfo> {
        self.expressions.iter().filter(move |info| info.priority == priority)
    }

    /// Conditions and effects in registration order
    pub fn statements(&self) -> &[StatementInfo] {
        &self.statements
    }

    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    /// How values of type `produced` can satisfy one of `required`
    pub fn acceptance(&self, produced: &str, required: &[String]) -> Option<Acceptance> {
        if required.iter().any(|r| self.types.is_assignable(produced, r)) {
            return Some(Acceptance::Direct);
        }
        if let Some(target) = required
            .iter()
            .find(|r| self.converters.find(produced, r, &self.types).is_some())
        {
            return Some(Acceptance::Convert(target.clone()));
        }
        // A more general type may still produce acceptable values
        required
            .iter()
            .find(|r| self.types.is_assignable(r, produced))
            .map(|r| Acceptance::Convert(r.clone()))
    }

    pub fn convert(&self, value: &Value, to: &str) -> Option<Value> {
        self.converters.convert(value, to, &self.types)
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Relation {
        self.comparators.compare(a, b, &self.types, &self.converters)
    }

    pub fn holds(&self, a: &Value, relation: Relation, b: &Value) -> bool {
        relation.is_implied_by(self.compare(a, b))
    }

    pub fn format(&self, value: &Value) -> String {
        self.types.format(value)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types.iter().count())
            .field("converters", &self.converters.len())
            .field("expressions", &self.expressions.len())
            .field("statements", &self.statements.len())
            .field("events", &self.events.len())
            .finish()
    }
}
