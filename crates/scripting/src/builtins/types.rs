//! Built-in types, converters and comparators

use crate::compare::Relation;
use crate::error::Result;
use crate::parser::split::is_plain_number;
use crate::registry::RegistryBuilder;
use crate::types::ClassInfo;
use crate::value::{format_number, type_names, Value};

pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register_type(ClassInfo::new(type_names::OBJECT, "object¦s"))?;
    builder.register_type(
        ClassInfo::new(type_names::BOOLEAN, "boolean¦s")
            .parser(parse_boolean)
            .formatter(|value| value.to_string()),
    )?;
    builder.register_type(
        ClassInfo::new(type_names::NUMBER, "number¦s")
            .parser(parse_number)
            .formatter(|value| value.as_number().map(format_number).unwrap_or_default()),
    )?;
    builder.register_type(
        ClassInfo::new(type_names::TEXT, "text¦s").formatter(|value| value.as_text().unwrap_or_default().to_string()),
    )?;

    builder.register_converter(type_names::NUMBER, type_names::TEXT, |value| {
        value.as_number().map(|n| Value::Text(format_number(n)))
    });
    builder.register_converter(type_names::BOOLEAN, type_names::TEXT, |value| {
        value.as_bool().map(|b| Value::Text(b.to_string()))
    });

    builder.register_comparator(type_names::NUMBER, type_names::NUMBER, compare_numbers, true);
    builder.register_comparator(type_names::TEXT, type_names::TEXT, compare_texts, true);
    builder.register_comparator(type_names::BOOLEAN, type_names::BOOLEAN, compare_booleans, false);
    Ok(())
}

fn parse_boolean(text: &str) -> Option<Value> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" => Some(Value::Boolean(true)),
        "false" | "no" | "off" => Some(Value::Boolean(false)),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if !is_plain_number(text) {
        return None;
    }
    text.parse::<f64>().ok().map(Value::Number)
}

fn compare_numbers(a: &Value, b: &Value) -> Relation {
    match (a.as_number(), b.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).map_or(Relation::NotEqual, Relation::from_ordering),
        _ => Relation::NotEqual,
    }
}

/// Case-insensitive, like script literals
fn compare_texts(a: &Value, b: &Value) -> Relation {
    match (a.as_text(), b.as_text()) {
        (Some(a), Some(b)) => Relation::from_ordering(a.to_lowercase().cmp(&b.to_lowercase())),
        _ => Relation::NotEqual,
    }
}

fn compare_booleans(a: &Value, b: &Value) -> Relation {
    if a == b {
        Relation::Equal
    } else {
        Relation::NotEqual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_parsers() {
        assert_eq!(parse_boolean("Yes"), Some(Value::Boolean(true)));
        assert_eq!(parse_boolean("maybe"), None);
        assert_eq!(parse_number("-2.5"), Some(Value::Number(-2.5)));
        assert_eq!(parse_number("1e3"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_builtin_comparisons() {
        let mut builder = RegistryBuilder::new();
        register(&mut builder).unwrap();
        let registry = builder.close().unwrap();

        assert!(registry.holds(&Value::Number(3.0), Relation::Greater, &Value::Number(2.0)));
        assert!(registry.holds(&Value::from("Hello"), Relation::Equal, &Value::from("hello")));
        assert!(registry.holds(&Value::Boolean(true), Relation::NotEqual, &Value::Boolean(false)));
        assert_eq!(registry.format(&Value::Number(4.0)), "4");
        assert_eq!(registry.convert(&Value::Number(1.5), type_names::TEXT), Some(Value::from("1.5")));
    }
}
