use crate::context::TriggerContext;
use crate::error::Result;
use crate::parser::ParserState;
use crate::syntax::{Expression, ParseResult, SyntaxElement};
use crate::types::join_list;
use crate::value::Value;
use rand::Rng;

/// `a, b and c` / `a, b or c`
///
/// An and-list holds all of its values; an or-list stands for one of them,
/// chosen at random when evaluated and satisfied by any when checked.
#[derive(Debug)]
pub struct ExpressionList {
    items: Vec<Box<dyn Expression>>,
    and: bool,
    return_type: String,
}

impl ExpressionList {
    pub fn new(items: Vec<Box<dyn Expression>>, and: bool, return_type: &str) -> Self {
        Self {
            items,
            and,
            return_type: return_type.to_string(),
        }
    }

    pub fn items(&self) -> &[Box<dyn Expression>] {
        &self.items
    }
}

impl SyntaxElement for ExpressionList {
    fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
        true
    }

    fn describe(&self, debug: bool) -> String {
        let parts: Vec<String> = self.items.iter().map(|item| item.describe(debug)).collect();
        join_list(&parts, if self.and { "and" } else { "or" })
    }
}

impl Expression for ExpressionList {
    fn return_type(&self) -> &str {
        &self.return_type
    }

    fn is_single(&self) -> bool {
        if self.and {
            self.items.len() == 1 && self.items[0].is_single()
        } else {
            self.items.iter().all(|item| item.is_single())
        }
    }

    fn and(&self) -> bool {
        self.and
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        for item in &self.items {
            values.extend(item.get_all(ctx)?);
        }
        Ok(values)
    }

    fn get_array(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        if !self.and {
            if self.items.is_empty() {
                return Ok(Vec::new());
            }
            let chosen = rand::thread_rng().gen_range(0..self.items.len());
            return self.items[chosen].get_array(ctx);
        }
        let mut values = Vec::new();
        for item in &self.items {
            values.extend(item.get_array(ctx)?);
        }
        Ok(values)
    }

    fn check(
        &self,
        ctx: &mut TriggerContext,
        predicate: &mut dyn FnMut(&Value) -> bool,
        negated: bool,
    ) -> Result<bool> {
        for item in &self.items {
            let holds = item.check(ctx, predicate, false)?;
            if holds != self.and {
                // and-list: one failure decides; or-list: one success decides
                return Ok(holds != negated);
            }
        }
        Ok(self.and != negated)
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        let mut values = Vec::new();
        for item in &self.items {
            values.extend(item.literal_values()?);
        }
        Some(values)
    }
}
