//! Comparators
//!
//! Relations between values of (possibly different) types. Lookup falls
//! back from an exact pair to the swapped pair, then to comparing after
//! converting one side, and finally to plain value equality.

use crate::convert::ConverterRegistry;
use crate::types::TypeRegistry;
use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;

/// Relation between two values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Smaller,
    SmallerOrEqual,
}

impl Relation {
    pub fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Relation::Smaller,
            Ordering::Equal => Relation::Equal,
            Ordering::Greater => Relation::Greater,
        }
    }

    /// The relation seen from the other side (`a > b` is `b < a`)
    pub fn switched(self) -> Self {
        match self {
            Relation::Greater => Relation::Smaller,
            Relation::GreaterOrEqual => Relation::SmallerOrEqual,
            Relation::Smaller => Relation::Greater,
            Relation::SmallerOrEqual => Relation::GreaterOrEqual,
            other => other,
        }
    }

    /// Logical negation (`a > b` fails exactly when `a <= b` holds)
    pub fn inverse(self) -> Self {
        match self {
            Relation::Equal => Relation::NotEqual,
            Relation::NotEqual => Relation::Equal,
            Relation::Greater => Relation::SmallerOrEqual,
            Relation::GreaterOrEqual => Relation::Smaller,
            Relation::Smaller => Relation::GreaterOrEqual,
            Relation::SmallerOrEqual => Relation::Greater,
        }
    }

    /// Whether this relation holds given the actual outcome of a comparison
    pub fn is_implied_by(self, actual: Relation) -> bool {
        match self {
            Relation::Equal => actual == Relation::Equal,
            Relation::NotEqual => actual != Relation::Equal,
            Relation::Greater => actual == Relation::Greater,
            Relation::GreaterOrEqual => matches!(actual, Relation::Greater | Relation::Equal),
            Relation::Smaller => actual == Relation::Smaller,
            Relation::SmallerOrEqual => matches!(actual, Relation::Smaller | Relation::Equal),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Relation::Equal => "equal to",
            Relation::NotEqual => "not equal to",
            Relation::Greater => "greater than",
            Relation::GreaterOrEqual => "greater than or equal to",
            Relation::Smaller => "smaller than",
            Relation::SmallerOrEqual => "smaller than or equal to",
        };
        f.write_str(text)
    }
}

/// Comparison function: returns `Equal`, `NotEqual`, `Greater` or `Smaller`
pub type CompareFn = fn(&Value, &Value) -> Relation;

#[derive(Debug, Clone)]
pub struct ComparatorInfo {
    first: String,
    second: String,
    compare: CompareFn,
    supports_ordering: bool,
}

impl ComparatorInfo {
    pub fn supports_ordering(&self) -> bool {
        self.supports_ordering
    }
}

#[derive(Debug, Default)]
pub struct ComparatorRegistry {
    comparators: Vec<ComparatorInfo>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, first: &str, second: &str, compare: CompareFn, supports_ordering: bool) {
        self.comparators.push(ComparatorInfo {
            first: first.to_string(),
            second: second.to_string(),
            compare,
            supports_ordering,
        });
    }

    fn find(&self, a: &str, b: &str, types: &TypeRegistry) -> Option<&ComparatorInfo> {
        self.comparators
            .iter()
            .find(|c| c.first == a && c.second == b)
            .or_else(|| {
                self.comparators
                    .iter()
                    .find(|c| types.is_assignable(a, &c.first) && types.is_assignable(b, &c.second))
            })
    }

    fn compare_direct(&self, a: &Value, b: &Value, types: &TypeRegistry) -> Option<Relation> {
        if let Some(c) = self.find(a.type_name(), b.type_name(), types) {
            return Some((c.compare)(a, b));
        }
        self.find(b.type_name(), a.type_name(), types)
            .map(|c| (c.compare)(b, a).switched())
    }

    /// Compare two values
    pub fn compare(&self, a: &Value, b: &Value, types: &TypeRegistry, converters: &ConverterRegistry) -> Relation {
        if let Some(relation) = self.compare_direct(a, b, types) {
            return relation;
        }
        // Bring one side to the other's type
        if let Some(b) = converters.convert(b, a.type_name(), types) {
            if let Some(relation) = self.compare_direct(a, &b, types) {
                return relation;
            }
        }
        if let Some(a) = converters.convert(a, b.type_name(), types) {
            if let Some(relation) = self.compare_direct(&a, b, types) {
                return relation;
            }
        }
        if a == b {
            Relation::Equal
        } else {
            Relation::NotEqual
        }
    }

    /// Whether `a relation b` holds
    pub fn holds(
        &self,
        a: &Value,
        relation: Relation,
        b: &Value,
        types: &TypeRegistry,
        converters: &ConverterRegistry,
    ) -> bool {
        relation.is_implied_by(self.compare(a, b, types, converters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassInfo;

    fn numbers(a: &Value, b: &Value) -> Relation {
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).map(Relation::from_ordering).unwrap_or(Relation::NotEqual),
            _ => Relation::NotEqual,
        }
    }

    fn text_number(a: &Value, b: &Value) -> Relation {
        let length = a.as_text().map(|s| s.len() as f64);
        match (length, b.as_number()) {
            (Some(len), Some(n)) => Relation::from_ordering(len.total_cmp(&n)),
            _ => Relation::NotEqual,
        }
    }

    fn setup() -> (TypeRegistry, ConverterRegistry) {
        let mut types = TypeRegistry::new();
        for (code, name) in [("object", "object¦s"), ("number", "number¦s"), ("text", "text¦s")] {
            types.register(ClassInfo::new(code, name)).unwrap();
        }
        (types, ConverterRegistry::new())
    }

    #[test]
    fn test_relation_algebra() {
        assert_eq!(Relation::Greater.switched(), Relation::Smaller);
        assert_eq!(Relation::Greater.inverse(), Relation::SmallerOrEqual);
        assert!(Relation::GreaterOrEqual.is_implied_by(Relation::Equal));
        assert!(!Relation::Smaller.is_implied_by(Relation::Equal));
    }

    #[test]
    fn test_swapped_lookup() {
        let (types, converters) = setup();
        let mut comparators = ComparatorRegistry::new();
        comparators.register("text", "number", text_number, true);

        let relation = comparators.compare(&Value::from(2), &Value::from("abc"), &types, &converters);
        assert_eq!(relation, Relation::Smaller);
    }

    #[test]
    fn test_fallback_to_equality() {
        let (types, converters) = setup();
        let mut comparators = ComparatorRegistry::new();
        comparators.register("number", "number", numbers, true);

        assert_eq!(comparators.compare(&Value::from("a"), &Value::from("a"), &types, &converters), Relation::Equal);
        assert_eq!(comparators.compare(&Value::from("a"), &Value::from(1), &types, &converters), Relation::NotEqual);
        assert!(comparators.holds(&Value::from(3), Relation::GreaterOrEqual, &Value::from(3), &types, &converters));
    }
}
