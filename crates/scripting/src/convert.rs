//! Type converters
//!
//! A converter turns a value of one type into a value of another type,
//! failing per value (e.g. text that is not numeric). When the registry is
//! closed, converters are chained: `A→B` plus `B→C` yields `A→C` unless a
//! direct converter already exists.

use crate::types::TypeRegistry;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Conversion function as registered
pub type ConvertFn = fn(&Value) -> Option<Value>;

type SharedConvert = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// One registered or derived converter
#[derive(Clone)]
pub struct ConverterInfo {
    from: String,
    to: String,
    convert: SharedConvert,
    chained: bool,
}

impl ConverterInfo {
    pub fn from_type(&self) -> &str {
        &self.from
    }

    pub fn to_type(&self) -> &str {
        &self.to
    }

    /// Whether this converter was derived by chaining two others
    pub fn is_chained(&self) -> bool {
        self.chained
    }

    pub fn convert(&self, value: &Value) -> Option<Value> {
        (self.convert)(value)
    }
}

impl fmt::Debug for ConverterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)?;
        if self.chained {
            write!(f, " (chained)")?;
        }
        Ok(())
    }
}

/// All converters, direct ones first
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    converters: Vec<ConverterInfo>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, from: &str, to: &str, convert: ConvertFn) {
        self.converters.push(ConverterInfo {
            from: from.to_string(),
            to: to.to_string(),
            convert: Arc::new(convert),
            chained: false,
        });
    }

    /// Derive chained converters until no new pair appears
    pub fn close(&mut self, types: &TypeRegistry) {
        loop {
            let mut derived = Vec::new();
            for first in &self.converters {
                for second in &self.converters {
                    if !types.is_assignable(&first.to, &second.from) || first.from == second.to {
                        continue;
                    }
                    let exists = self
                        .converters
                        .iter()
                        .chain(derived.iter())
                        .any(|c: &ConverterInfo| c.from == first.from && c.to == second.to);
                    if exists {
                        continue;
                    }
                    let (a, b) = (first.convert.clone(), second.convert.clone());
                    derived.push(ConverterInfo {
                        from: first.from.clone(),
                        to: second.to.clone(),
                        convert: Arc::new(move |value: &Value| a(value).and_then(|mid| b(&mid))),
                        chained: true,
                    });
                }
            }
            if derived.is_empty() {
                break;
            }
            tracing::debug!("Derived {} chained converters", derived.len());
            self.converters.extend(derived);
        }
    }

    /// Find a converter accepting `from` and producing something usable as `to`
    pub fn find(&self, from: &str, to: &str, types: &TypeRegistry) -> Option<&ConverterInfo> {
        self.converters
            .iter()
            .find(|c| c.from == from && c.to == to)
            .or_else(|| {
                self.converters
                    .iter()
                    .find(|c| types.is_assignable(from, &c.from) && types.is_assignable(&c.to, to))
            })
    }

    /// Convert a value to the given type; values already of that type are
    /// returned unchanged.
    pub fn convert(&self, value: &Value, to: &str, types: &TypeRegistry) -> Option<Value> {
        if types.is_assignable(value.type_name(), to) {
            return Some(value.clone());
        }
        self.find(value.type_name(), to, types)?.convert(value)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassInfo;
    use crate::value::HostObject;

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        for (code, name) in [
            ("object", "object¦s"),
            ("number", "number¦s"),
            ("text", "text¦s"),
            ("player", "player¦s"),
        ] {
            types.register(ClassInfo::new(code, name)).unwrap();
        }
        types
    }

    fn player_name(value: &Value) -> Option<Value> {
        value.as_object().map(|p| Value::from(p.key()))
    }

    fn text_length(value: &Value) -> Option<Value> {
        value.as_text().map(|s| Value::Number(s.chars().count() as f64))
    }

    #[test]
    fn test_direct_conversion() {
        let types = types();
        let mut converters = ConverterRegistry::new();
        converters.register("player", "text", player_name);
        converters.close(&types);

        let notch = Value::Object(HostObject::new("player", "Notch"));
        assert_eq!(converters.convert(&notch, "text", &types), Some(Value::from("Notch")));
        assert!(converters.convert(&notch, "number", &types).is_none());
    }

    #[test]
    fn test_chained_conversion() {
        let types = types();
        let mut converters = ConverterRegistry::new();
        converters.register("player", "text", player_name);
        converters.register("text", "number", text_length);
        converters.close(&types);

        let info = converters.find("player", "number", &types).unwrap();
        assert!(info.is_chained());
        let notch = Value::Object(HostObject::new("player", "Notch"));
        assert_eq!(converters.convert(&notch, "number", &types), Some(Value::Number(5.0)));
    }

    #[test]
    fn test_same_type_is_identity() {
        let types = types();
        let converters = ConverterRegistry::new();
        assert_eq!(converters.convert(&Value::from(3), "number", &types), Some(Value::from(3)));
        assert_eq!(converters.convert(&Value::from(3), "object", &types), Some(Value::from(3)));
    }
}
