//! Runtime values
//!
//! Everything an expression produces is a [`Value`]. Host-defined types
//! (players, items, worlds…) travel as [`HostObject`]s tagged with the code
//! name of their registered type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Code names of the built-in types
pub mod type_names {
    pub const OBJECT: &str = "object";
    pub const BOOLEAN: &str = "boolean";
    pub const NUMBER: &str = "number";
    pub const TEXT: &str = "text";
}

/// A value produced by an expression
#[derive(Clone)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Text(String),
    Object(HostObject),
}

impl Value {
    /// Code name of the value's type
    pub fn type_name(&self) -> &str {
        match self {
            Value::Boolean(_) => type_names::BOOLEAN,
            Value::Number(_) => type_names::NUMBER,
            Value::Text(_) => type_names::TEXT,
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Object(object) => write!(f, "{}({})", object.type_name(), object.key()),
        }
    }
}

/// Default textual form; type registries may override it per type
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Object(object) => write!(f, "{}", object.key()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<HostObject> for Value {
    fn from(value: HostObject) -> Self {
        Value::Object(value)
    }
}

/// Format a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// An opaque host value
///
/// Identity is the pair (type, key); the payload is whatever the host wants
/// to carry along and is never inspected by the engine.
#[derive(Clone)]
pub struct HostObject {
    type_name: Arc<str>,
    key: Arc<str>,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl HostObject {
    pub fn new(type_name: &str, key: &str) -> Self {
        Self {
            type_name: Arc::from(type_name),
            key: Arc::from(key),
            payload: None,
        }
    }

    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Downcast the payload
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.key == other.key
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("type_name", &self.type_name)
            .field("key", &self.key)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
    }

    #[test]
    fn test_host_object_identity() {
        let a = HostObject::new("player", "Notch").with_payload(42u32);
        let b = HostObject::new("player", "Notch");
        assert_eq!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(a.payload::<u32>(), Some(&42));
        assert_eq!(Value::from(a).type_name(), "player");
    }

    #[test]
    fn test_cross_type_inequality() {
        assert_ne!(Value::from("5"), Value::from(5.0));
    }
}
