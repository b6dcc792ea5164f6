//! Built-in expressions: variables, loop values, event values and number
//! ranges

use crate::context::TriggerContext;
use crate::error::Result;
use crate::expr::{EventValueExpression, VariableString};
use crate::log::ErrorQuality;
use crate::parser::ParserState;
use crate::registry::{ExpressionPriority, RegistryBuilder};
use crate::syntax::{Expression, ParseResult, SyntaxElement};
use crate::trigger::ItemId;
use crate::value::{type_names, Value};

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_expression(
        "variable",
        || Box::new(VariableExpression::default()),
        type_names::OBJECT,
        ExpressionPriority::Simple,
        &["\\{<.+>\\}"],
    );
    builder.register_expression(
        "loop value",
        || Box::new(LoopValueExpression::default()),
        type_names::OBJECT,
        ExpressionPriority::Simple,
        &["[the] loop-<.+>"],
    );
    builder.register_expression(
        "event value",
        EventValueExpression::factory,
        type_names::OBJECT,
        ExpressionPriority::Event,
        &["[the] event-<.+>", "[the] <[a-z][a-z ]*>"],
    );
    builder.register_expression(
        "number range",
        || Box::new(NumberRange::default()),
        type_names::NUMBER,
        ExpressionPriority::Combined,
        &["[the] numbers (from|between) %number% (to|and) %number%"],
    );
}

// ========== Variables ==========

/// The name inside `{...}`, possibly with `%expression%` parts
#[derive(Debug)]
pub struct VariableName(VariableString);

impl VariableName {
    /// Parse a name; braces inside it must pair up
    pub fn parse(text: &str, state: &mut ParserState) -> Option<Self> {
        let mut depth = 0i32;
        for c in text.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return None;
            }
        }
        if depth != 0 {
            state.error(
                format!("'{{{}}}' is not a valid variable name", text),
                ErrorQuality::SemanticError,
            );
            return None;
        }
        VariableString::parse_name(text, state).map(Self)
    }

    /// Name for this execution, lowercased
    pub fn resolve(&self, ctx: &mut TriggerContext) -> Result<String> {
        Ok(self.0.evaluate(ctx)?.to_lowercase())
    }

    pub fn describe(&self, debug: bool) -> String {
        format!("{{{}}}", self.0.template(debug))
    }
}

/// `{name}`: a global variable, or a local one if the name starts with `_`
#[derive(Debug, Default)]
pub struct VariableExpression {
    name: Option<VariableName>,
}

impl SyntaxElement for VariableExpression {
    fn init(&mut self, result: ParseResult, state: &mut ParserState) -> bool {
        let Some(text) = result.regexes.first() else {
            return false;
        };
        self.name = VariableName::parse(text, state);
        self.name.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        self.name.as_ref().map(|n| n.describe(debug)).unwrap_or_default()
    }
}

impl Expression for VariableExpression {
    fn return_type(&self) -> &str {
        type_names::OBJECT
    }

    fn is_single(&self) -> bool {
        true
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        let Some(name) = &self.name else {
            return Ok(Vec::new());
        };
        let name = name.resolve(ctx)?;
        Ok(ctx.variable(&name).into_iter().collect())
    }
}

// ========== Loop values ==========

/// `loop-value`, `loop-<type>`, and `loop-value-<n>` / `loop-<type>-<n>`
/// to pick among nested loops (counted from the outermost)
#[derive(Debug)]
pub struct LoopValueExpression {
    name: String,
    loop_id: Option<ItemId>,
    return_type: String,
}

impl Default for LoopValueExpression {
    fn default() -> Self {
        Self {
            name: String::new(),
            loop_id: None,
            return_type: type_names::OBJECT.to_string(),
        }
    }
}

impl SyntaxElement for LoopValueExpression {
    fn init(&mut self, result: ParseResult, state: &mut ParserState) -> bool {
        let Some(name) = result.regexes.first() else {
            return false;
        };
        let name = name.trim().to_lowercase();
        let (base, index) = match name.rsplit_once('-') {
            Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                (base.to_string(), n.parse::<usize>().ok())
            }
            _ => (name.clone(), None),
        };

        let wanted = if base == "value" {
            None
        } else {
            match state.registry().types().lookup_name(&base) {
                Some((info, _)) => Some(info.code_name().to_string()),
                None => {
                    state.error(
                        format!("'{}' is not a type, so 'loop-{}' means nothing", base, name),
                        ErrorQuality::SemanticError,
                    );
                    return false;
                }
            }
        };

        let types = state.registry().types();
        let candidates: Vec<(ItemId, String)> = state
            .loops()
            .iter()
            .filter(|l| wanted.as_deref().map_or(true, |w| types.is_assignable(&l.return_type, w)))
            .map(|l| (l.id, l.return_type.clone()))
            .collect();

        let chosen = match index {
            Some(n) => n.checked_sub(1).and_then(|i| candidates.get(i)).cloned(),
            None if candidates.len() > 1 && wanted.is_some() => {
                state.error(
                    format!(
                        "There are multiple loops that match 'loop-{}'; use 'loop-{}-1', 'loop-{}-2', etc.",
                        name, base, base
                    ),
                    ErrorQuality::SemanticError,
                );
                return false;
            }
            // The innermost loop
            None => candidates.last().cloned(),
        };

        match chosen {
            Some((id, loop_type)) => {
                self.loop_id = Some(id);
                self.return_type = wanted.unwrap_or(loop_type);
                self.name = name;
                true
            }
            None => {
                state.error(
                    format!("There's no loop that matches 'loop-{}'", name),
                    ErrorQuality::SemanticError,
                );
                false
            }
        }
    }

    fn describe(&self, _debug: bool) -> String {
        format!("loop-{}", self.name)
    }
}

impl Expression for LoopValueExpression {
    fn return_type(&self) -> &str {
        &self.return_type
    }

    fn is_single(&self) -> bool {
        true
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        Ok(self.loop_id.and_then(|id| ctx.loop_value(id)).into_iter().collect())
    }
}

// ========== Number ranges ==========

/// `numbers from A to B`: A, A+1, ... up to B, produced lazily for loops
#[derive(Debug, Default)]
pub struct NumberRange {
    bounds: Option<(Box<dyn Expression>, Box<dyn Expression>)>,
}

impl NumberRange {
    fn bounds(&self, ctx: &mut TriggerContext) -> Result<Option<(f64, f64)>> {
        let Some((from, to)) = &self.bounds else {
            return Ok(None);
        };
        let from = from.get_single(ctx)?.and_then(|v| v.as_number());
        let to = to.get_single(ctx)?.and_then(|v| v.as_number());
        Ok(from.zip(to).filter(|(a, b)| a.is_finite() && b.is_finite()))
    }
}

impl SyntaxElement for NumberRange {
    fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
        self.bounds = result.take(0).zip(result.take(1));
        self.bounds.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        match &self.bounds {
            Some((from, to)) => format!("numbers from {} to {}", from.describe(debug), to.describe(debug)),
            None => "numbers".to_string(),
        }
    }
}

impl Expression for NumberRange {
    fn return_type(&self) -> &str {
        type_names::NUMBER
    }

    fn is_single(&self) -> bool {
        false
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        Ok(self.iterate(ctx)?.collect())
    }

    fn iterate(&self, ctx: &mut TriggerContext) -> Result<Box<dyn Iterator<Item = Value> + Send>> {
        let Some((from, to)) = self.bounds(ctx)? else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(Box::new(
            (0u64..)
                .map(move |step| from + step as f64)
                .take_while(move |n| *n <= to)
                .map(Value::Number),
        ))
    }
}
