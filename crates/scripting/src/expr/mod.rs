//! Engine-provided expressions
//!
//! These are not registered syntax: the parser builds them directly for
//! literals, lists, quoted strings, type conversions and event values.

mod converted;
mod event_value;
mod list;
mod literal;
mod variable_string;

pub use converted::ConvertedExpression;
pub use event_value::EventValueExpression;
pub use list::ExpressionList;
pub use literal::SimpleLiteral;
pub use variable_string::VariableString;

use crate::registry::{Acceptance, Registry};
use crate::syntax::Expression;
use crate::value::Value;
use std::sync::Arc;

/// Make `expr` produce one of the `required` types.
///
/// Literals are converted immediately; anything else is wrapped to convert
/// per value at runtime. Returns `None` if the types are incompatible or a
/// literal value cannot be converted.
pub fn convert_expression(
    expr: Box<dyn Expression>,
    required: &[String],
    registry: &Arc<Registry>,
) -> Option<Box<dyn Expression>> {
    match registry.acceptance(expr.return_type(), required)? {
        Acceptance::Direct => Some(expr),
        Acceptance::Convert(target) => {
            if let Some(values) = expr.literal_values() {
                let converted = values
                    .iter()
                    .map(|value| registry.convert(value, &target))
                    .collect::<Option<Vec<Value>>>()?;
                return Some(Box::new(SimpleLiteral::list(converted, &target, expr.and())));
            }
            Some(Box::new(ConvertedExpression::new(expr, target, Arc::clone(registry))))
        }
    }
}
