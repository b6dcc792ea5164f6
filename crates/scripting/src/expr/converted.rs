use crate::context::TriggerContext;
use crate::error::Result;
use crate::parser::ParserState;
use crate::registry::Registry;
use crate::syntax::{Expression, ParseResult, SyntaxElement};
use crate::value::Value;
use std::sync::Arc;

/// Converts the values of another expression to a required type. Values
/// that cannot be converted are dropped.
#[derive(Debug)]
pub struct ConvertedExpression {
    inner: Box<dyn Expression>,
    to: String,
    registry: Arc<Registry>,
}

impl ConvertedExpression {
    pub fn new(inner: Box<dyn Expression>, to: String, registry: Arc<Registry>) -> Self {
        Self { inner, to, registry }
    }

    fn convert_all(&self, values: Vec<Value>) -> Vec<Value> {
        values
            .iter()
            .filter_map(|value| self.registry.convert(value, &self.to))
            .collect()
    }
}

impl SyntaxElement for ConvertedExpression {
    fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
        true
    }

    fn describe(&self, debug: bool) -> String {
        if debug {
            format!("{} (as {})", self.inner.describe(true), self.to)
        } else {
            self.inner.describe(false)
        }
    }
}

impl Expression for ConvertedExpression {
    fn return_type(&self) -> &str {
        &self.to
    }

    fn is_single(&self) -> bool {
        self.inner.is_single()
    }

    fn and(&self) -> bool {
        self.inner.and()
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        let values = self.inner.get_all(ctx)?;
        Ok(self.convert_all(values))
    }

    fn get_array(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        let values = self.inner.get_array(ctx)?;
        Ok(self.convert_all(values))
    }

    fn iterate(&self, ctx: &mut TriggerContext) -> Result<Box<dyn Iterator<Item = Value> + Send>> {
        let registry = Arc::clone(&self.registry);
        let to = self.to.clone();
        let inner = self.inner.iterate(ctx)?;
        Ok(Box::new(inner.filter_map(move |value| registry.convert(&value, &to))))
    }

    fn check(
        &self,
        ctx: &mut TriggerContext,
        predicate: &mut dyn FnMut(&Value) -> bool,
        negated: bool,
    ) -> Result<bool> {
        let registry = Arc::clone(&self.registry);
        let to = self.to.as_str();
        self.inner.check(
            ctx,
            &mut |value: &Value| registry.convert(value, to).is_some_and(|v| predicate(&v)),
            negated,
        )
    }
}
