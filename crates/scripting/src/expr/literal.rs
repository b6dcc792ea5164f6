use crate::context::TriggerContext;
use crate::error::Result;
use crate::parser::ParserState;
use crate::syntax::{Expression, ParseResult, SyntaxElement};
use crate::types::join_list;
use crate::value::Value;
use rand::seq::SliceRandom;

/// Values fixed at parse time
#[derive(Debug, Clone)]
pub struct SimpleLiteral {
    values: Vec<Value>,
    return_type: String,
    and: bool,
}

impl SimpleLiteral {
    pub fn new(value: Value, return_type: &str) -> Self {
        Self::list(vec![value], return_type, true)
    }

    pub fn list(values: Vec<Value>, return_type: &str, and: bool) -> Self {
        Self {
            values,
            return_type: return_type.to_string(),
            and,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl SyntaxElement for SimpleLiteral {
    fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
        true
    }

    fn describe(&self, debug: bool) -> String {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|v| match v {
                Value::Text(text) => format!("\"{}\"", text.replace('"', "\"\"")),
                other => other.to_string(),
            })
            .collect();
        let text = join_list(&parts, if self.and { "and" } else { "or" });
        if debug {
            format!("{} ({})", text, self.return_type)
        } else {
            text
        }
    }
}

impl Expression for SimpleLiteral {
    fn return_type(&self) -> &str {
        &self.return_type
    }

    fn is_single(&self) -> bool {
        self.values.len() == 1 || !self.and
    }

    fn and(&self) -> bool {
        self.and
    }

    fn get_all(&self, _ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        Ok(self.values.clone())
    }

    fn get_array(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        if self.and {
            return self.get_all(ctx);
        }
        Ok(self.values.choose(&mut rand::thread_rng()).cloned().into_iter().collect())
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        Some(self.values.clone())
    }
}
