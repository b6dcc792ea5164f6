//! Built-in conditions: equality and numeric comparison

use crate::compare::Relation;
use crate::context::TriggerContext;
use crate::error::Result;
use crate::parser::ParserState;
use crate::registry::RegistryBuilder;
use crate::syntax::{Condition, Expression, ParseResult, SyntaxElement};
use crate::value::Value;
use std::sync::Arc;

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_condition(
        "comparison",
        || Box::new(Comparison::default()),
        &["%number% (is|are) (1¦greater|1¦more|2¦less|2¦smaller) than [4¦or equal to] %number%"],
    );
    builder.register_condition(
        "is",
        || Box::new(Comparison::default()),
        &["%objects% (is|are) [8¦not] %objects%", "%objects% (isn't|aren't) %objects%"],
    );
}

const GREATER: i32 = 1;
const SMALLER: i32 = 2;
const OR_EQUAL: i32 = 4;
const NOT: i32 = 8;

/// `a is b`, `a is not b` and `a is greater/less than [or equal to] b`
///
/// Every value of `a` (or any, for an or-list) is compared against the
/// values of `b`, again honouring `b`'s and/or.
#[derive(Debug)]
pub struct Comparison {
    first: Option<Box<dyn Expression>>,
    second: Option<Box<dyn Expression>>,
    relation: Relation,
    negated: bool,
}

impl Default for Comparison {
    fn default() -> Self {
        Self {
            first: None,
            second: None,
            relation: Relation::Equal,
            negated: false,
        }
    }
}

impl Comparison {
    fn relation_for(mark: i32) -> Relation {
        let or_equal = mark & OR_EQUAL != 0;
        if mark & GREATER != 0 {
            if or_equal {
                Relation::GreaterOrEqual
            } else {
                Relation::Greater
            }
        } else if mark & SMALLER != 0 {
            if or_equal {
                Relation::SmallerOrEqual
            } else {
                Relation::Smaller
            }
        } else {
            Relation::Equal
        }
    }
}

impl SyntaxElement for Comparison {
    fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
        self.first = result.take(0);
        self.second = result.take(1);
        self.relation = Self::relation_for(result.mark);
        // The second `is` pattern is the contracted negation
        self.negated = result.has_mark(NOT) || (self.relation == Relation::Equal && result.matched_pattern == 1);
        self.first.is_some() && self.second.is_some()
    }

    fn describe(&self, debug: bool) -> String {
        let (Some(first), Some(second)) = (&self.first, &self.second) else {
            return "comparison".to_string();
        };
        let relation = match (self.relation, self.negated) {
            (Relation::Equal, false) => "is",
            (Relation::Equal, true) | (Relation::NotEqual, _) => "is not",
            (Relation::Greater, _) => "is greater than",
            (Relation::GreaterOrEqual, _) => "is greater than or equal to",
            (Relation::Smaller, _) => "is less than",
            (Relation::SmallerOrEqual, _) => "is less than or equal to",
        };
        format!("{} {} {}", first.describe(debug), relation, second.describe(debug))
    }
}

impl Condition for Comparison {
    fn check(&self, ctx: &mut TriggerContext) -> Result<bool> {
        let (Some(first), Some(second)) = (&self.first, &self.second) else {
            return Ok(false);
        };
        let targets = second.get_all(ctx)?;
        if targets.is_empty() {
            return Ok(false);
        }
        let registry = Arc::clone(ctx.registry());
        let relation = self.relation;
        let all = second.and();
        first.check(
            ctx,
            &mut |value: &Value| {
                let holds = |target: &Value| registry.holds(value, relation, target);
                if all {
                    targets.iter().all(holds)
                } else {
                    targets.iter().any(holds)
                }
            },
            self.negated,
        )
    }
}
