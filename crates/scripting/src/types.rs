//! Type registry
//!
//! Maps type names to descriptors ([`ClassInfo`]) used by the pattern
//! compiler (resolving `%type%` placeholders), the literal parser and the
//! value formatter.

use crate::error::{Result, ScriptError};
use crate::value::{type_names, Value};
use std::collections::HashMap;

/// Parses literal text into a value of one type
pub type ParseFn = fn(&str) -> Option<Value>;

/// Formats a value of one type for display
pub type FormatFn = fn(&Value) -> String;

/// Descriptor of one script-visible type
#[derive(Debug, Clone)]
pub struct ClassInfo {
    code_name: String,
    singular: String,
    plural: String,
    supertype: Option<String>,
    parser: Option<ParseFn>,
    formatter: Option<FormatFn>,
    event_default: bool,
}

impl ClassInfo {
    /// Create a descriptor.
    ///
    /// `user_name` uses the plural marker: `"number¦s"` is "number" /
    /// "numbers", `"entit¦y¦ies"` is "entity" / "entities".
    pub fn new(code_name: &str, user_name: &str) -> Self {
        let (singular, plural) = split_plural(user_name);
        Self {
            code_name: code_name.to_string(),
            singular,
            plural,
            supertype: (code_name != type_names::OBJECT).then(|| type_names::OBJECT.to_string()),
            parser: None,
            formatter: None,
            event_default: false,
        }
    }

    pub fn supertype(mut self, supertype: &str) -> Self {
        self.supertype = Some(supertype.to_string());
        self
    }

    pub fn parser(mut self, parser: ParseFn) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn formatter(mut self, formatter: FormatFn) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Omitted placeholders of this type default to the event's value
    pub fn event_default(mut self) -> Self {
        self.event_default = true;
        self
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn singular(&self) -> &str {
        &self.singular
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn has_event_default(&self) -> bool {
        self.event_default
    }

    /// Parse literal text as this type
    pub fn parse(&self, text: &str) -> Option<Value> {
        self.parser.and_then(|parse| parse(text))
    }

    /// Name with an indefinite article, for messages
    pub fn with_article(&self) -> String {
        let article = match self.singular.chars().next() {
            Some(c) if "aeiou".contains(c.to_ascii_lowercase()) => "an",
            _ => "a",
        };
        format!("{} {}", article, self.singular)
    }
}

/// Split a user name carrying `¦` plural markers into (singular, plural)
pub fn split_plural(name: &str) -> (String, String) {
    let parts: Vec<&str> = name.split('¦').collect();
    match parts.as_slice() {
        [stem, suffix] => (stem.to_string(), format!("{}{}", stem, suffix)),
        [stem, singular, plural, ..] => (format!("{}{}", stem, singular), format!("{}{}", stem, plural)),
        _ => (name.to_string(), name.to_string()),
    }
}

/// All registered types
#[derive(Debug, Default)]
pub struct TypeRegistry {
    classes: Vec<ClassInfo>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, (usize, bool)>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; code names and user names must be unique
    pub fn register(&mut self, info: ClassInfo) -> Result<()> {
        if self.by_code.contains_key(info.code_name()) {
            return Err(ScriptError::Registration(format!(
                "type '{}' is already registered",
                info.code_name()
            )));
        }
        let names = [(info.singular.to_lowercase(), false), (info.plural.to_lowercase(), true)];
        for (name, _) in &names {
            if let Some(&(other, _)) = self.by_name.get(name) {
                return Err(ScriptError::Registration(format!(
                    "type name '{}' of '{}' is already used by '{}'",
                    name,
                    info.code_name(),
                    self.classes[other].code_name()
                )));
            }
        }
        let index = self.classes.len();
        for (name, plural) in names {
            // Singular and plural may coincide, e.g. "sheep"
            self.by_name.entry(name).or_insert((index, plural));
        }
        self.by_code.insert(info.code_name.clone(), index);
        self.classes.push(info);
        Ok(())
    }

    /// Look up a type by code name
    pub fn get(&self, code_name: &str) -> Option<&ClassInfo> {
        self.by_code.get(code_name).map(|&i| &self.classes[i])
    }

    /// Look up a type by the name a script or pattern uses for it.
    ///
    /// Returns the descriptor and whether the plural form was used.
    pub fn lookup_name(&self, name: &str) -> Option<(&ClassInfo, bool)> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&(i, plural)| (&self.classes[i], plural))
    }

    /// Iterate all types in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.iter()
    }

    /// The type itself followed by each of its supertypes
    pub fn supertypes<'a>(&'a self, code_name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut current = Some(code_name);
        let mut steps = 0;
        std::iter::from_fn(move || {
            let name = current?;
            steps += 1;
            // Guards against cyclic supertype declarations
            current = if steps > self.classes.len() + 1 {
                None
            } else {
                self.get(name).and_then(|info| info.supertype.as_deref())
            };
            Some(name)
        })
    }

    /// Whether a value of type `sub` may be used where `sup` is required
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        sup == type_names::OBJECT || self.supertypes(sub).any(|t| t == sup)
    }

    /// Most specific type both arguments are assignable to
    pub fn common_supertype<'a>(&'a self, a: &'a str, b: &'a str) -> &'a str {
        self.supertypes(a)
            .find(|t| self.is_assignable(b, t))
            .unwrap_or(type_names::OBJECT)
    }

    /// Parse literal text as the given type; `object` tries every parser
    /// in registration order.
    pub fn parse_literal(&self, code_name: &str, text: &str) -> Option<Value> {
        if code_name == type_names::OBJECT {
            return self.classes.iter().find_map(|info| info.parse(text));
        }
        let info = self.get(code_name)?;
        info.parse(text).or_else(|| {
            // A parser of a subtype also yields a valid value
            self.classes
                .iter()
                .filter(|sub| sub.code_name != info.code_name && self.is_assignable(&sub.code_name, code_name))
                .find_map(|sub| sub.parse(text))
        })
    }

    /// Format a value using its type's formatter
    pub fn format(&self, value: &Value) -> String {
        self.supertypes(value.type_name())
            .filter_map(|t| self.get(t))
            .find_map(|info| info.formatter)
            .map(|format| format(value))
            .unwrap_or_else(|| value.to_string())
    }

    /// Format several values as "a, b and c" (or "a, b or c")
    pub fn format_list(&self, values: &[Value], and: bool) -> String {
        let parts: Vec<String> = values.iter().map(|v| self.format(v)).collect();
        join_list(&parts, if and { "and" } else { "or" })
    }

    /// Human-readable description of a set of accepted types
    pub fn describe_types(&self, codes: &[&str]) -> String {
        let names: Vec<String> = codes
            .iter()
            .map(|code| self.get(code).map(|i| i.with_article()).unwrap_or_else(|| code.to_string()))
            .collect();
        join_list(&names, "or")
    }
}

/// Join parts as "a, b and c"
pub fn join_list(parts: &[String], conjunction: &str) -> String {
    match parts {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} {} {}", init.join(", "), conjunction, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register(ClassInfo::new("object", "object¦s")).unwrap();
        types
            .register(ClassInfo::new("number", "number¦s").parser(|s| s.parse().ok().map(Value::Number)))
            .unwrap();
        types.register(ClassInfo::new("entity", "entit¦y¦ies")).unwrap();
        types.register(ClassInfo::new("player", "player¦s").supertype("entity")).unwrap();
        types
    }

    #[test]
    fn test_split_plural() {
        assert_eq!(split_plural("number¦s"), ("number".into(), "numbers".into()));
        assert_eq!(split_plural("entit¦y¦ies"), ("entity".into(), "entities".into()));
        assert_eq!(split_plural("sheep"), ("sheep".into(), "sheep".into()));
    }

    #[test]
    fn test_lookup_name() {
        let types = registry();
        let (info, plural) = types.lookup_name("Entities").unwrap();
        assert_eq!(info.code_name(), "entity");
        assert!(plural);
        let (_, plural) = types.lookup_name("player").unwrap();
        assert!(!plural);
        assert!(types.lookup_name("world").is_none());
    }

    #[test]
    fn test_assignability() {
        let types = registry();
        assert!(types.is_assignable("player", "entity"));
        assert!(types.is_assignable("player", "object"));
        assert!(!types.is_assignable("entity", "player"));
        assert_eq!(types.common_supertype("player", "entity"), "entity");
        assert_eq!(types.common_supertype("player", "number"), "object");
    }

    #[test]
    fn test_duplicate_registration() {
        let mut types = registry();
        assert!(types.register(ClassInfo::new("number", "digit¦s")).is_err());
        assert!(types.register(ClassInfo::new("amount", "number¦s")).is_err());
    }

    #[test]
    fn test_describe_types() {
        let types = registry();
        assert_eq!(types.describe_types(&["entity", "number"]), "an entity or a number");
    }
}
