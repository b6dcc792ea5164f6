use crate::context::TriggerContext;
use crate::error::Result;
use crate::log::ErrorQuality;
use crate::parser::ParserState;
use crate::syntax::{Expression, ParseResult, SyntaxElement};
use crate::value::Value;

/// A value of the current event, resolved at parse time against the event
/// classes of the enclosing trigger
///
/// Registered as `[the] event-<type>` and `[the] <type>`; also used as the
/// default of omitted placeholders whose type defaults to the event's value.
#[derive(Debug, Default)]
pub struct EventValueExpression {
    provided: String,
}

impl EventValueExpression {
    /// Event value of type `type_name` if every current event class
    /// provides one
    pub fn for_type(type_name: &str, state: &ParserState) -> Option<Self> {
        let types = state.registry().types();
        let mut provided = None;
        for class in state.current_events() {
            let found = class.value_type(type_name, types)?;
            provided.get_or_insert(found);
        }
        provided.map(|provided| Self {
            provided: provided.to_string(),
        })
    }

    pub fn factory() -> Box<dyn Expression> {
        Box::new(Self::default())
    }
}

impl SyntaxElement for EventValueExpression {
    fn init(&mut self, result: ParseResult, state: &mut ParserState) -> bool {
        let Some(name) = result.regexes.first() else {
            return false;
        };
        // `the <type>` matches any text; only type names are event values
        let Some(code_name) = state
            .registry()
            .types()
            .lookup_name(name)
            .map(|(info, _)| info.code_name().to_string())
        else {
            return false;
        };
        match Self::for_type(&code_name, state) {
            Some(found) => {
                *self = found;
                true
            }
            None => {
                let events: Vec<&str> = state.current_events().iter().map(|class| class.name).collect();
                let context = if events.is_empty() {
                    "outside of an event".to_string()
                } else {
                    format!("in a {} event", events.join("/"))
                };
                state.error(
                    format!("There's no {} {}", name.trim(), context),
                    ErrorQuality::SemanticError,
                );
                false
            }
        }
    }

    fn describe(&self, debug: bool) -> String {
        if debug {
            format!("event-{} (event value)", self.provided)
        } else {
            format!("event-{}", self.provided)
        }
    }
}

impl Expression for EventValueExpression {
    fn return_type(&self) -> &str {
        &self.provided
    }

    fn is_single(&self) -> bool {
        true
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        Ok(ctx.event().value(&self.provided).into_iter().collect())
    }
}
