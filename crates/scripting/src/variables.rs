//! Global variable store
//!
//! Variables are shared between all triggers and may be touched from the
//! main thread and from asynchronous event threads. Names are
//! case-insensitive.

use crate::value::Value;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct Variables {
    globals: DashMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.get(&name.to_lowercase()).map(|entry| entry.value().clone())
    }

    pub fn set(&self, name: &str, value: Value) {
        self.globals.insert(name.to_lowercase(), value);
    }

    pub fn delete(&self, name: &str) -> Option<Value> {
        self.globals.remove(&name.to_lowercase()).map(|(_, value)| value)
    }

    /// Set a variable only if it has no value yet; returns whether it was set
    pub fn set_default(&self, name: &str, value: Value) -> bool {
        let mut inserted = false;
        self.globals.entry(name.to_lowercase()).or_insert_with(|| {
            inserted = true;
            value
        });
        inserted
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// Sorted variable names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.globals.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.globals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_names() {
        let variables = Variables::new();
        variables.set("Score", Value::from(3));
        assert_eq!(variables.get("score"), Some(Value::from(3)));
        assert_eq!(variables.delete("SCORE"), Some(Value::from(3)));
        assert!(variables.is_empty());
    }

    #[test]
    fn test_defaults_do_not_overwrite() {
        let variables = Variables::new();
        variables.set("motd", Value::from("hello"));
        assert!(!variables.set_default("motd", Value::from("default")));
        assert!(variables.set_default("joins", Value::from(0)));
        assert_eq!(variables.get("motd"), Some(Value::from("hello")));
        assert_eq!(variables.names(), vec!["joins".to_string(), "motd".to_string()]);
    }
}
