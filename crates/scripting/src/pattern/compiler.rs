//! Pattern string compiler

use super::{Alternative, Element, Pattern, Placeholder};
use crate::error::{Result, ScriptError};
use crate::types::TypeRegistry;
use regex::Regex;

/// Compile a pattern string, resolving placeholder type names
pub fn compile(source: &str, types: &TypeRegistry) -> Result<Pattern> {
    let mut compiler = Compiler {
        source,
        chars: source.chars().collect(),
        pos: 0,
        types,
        placeholders: Vec::new(),
        regexes: Vec::new(),
    };
    let elements = compiler.sequence(None)?;
    if elements.is_empty() {
        return Err(compiler.error("pattern is empty"));
    }
    Ok(Pattern {
        source: source.to_string(),
        elements,
        placeholders: compiler.placeholders,
        regexes: compiler.regexes,
    })
}

struct Compiler<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    types: &'a TypeRegistry,
    placeholders: Vec<Placeholder>,
    regexes: Vec<Regex>,
}

impl<'a> Compiler<'a> {
    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Pattern {
            pattern: self.source.to_string(),
            message: format!("{} (at character {})", message.into(), self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Elements up to the end of input or the next group delimiter
    fn sequence(&mut self, enclosing: Option<char>) -> Result<Vec<Element>> {
        let mut elements = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.peek() {
            match c {
                ']' | ')' | '|' => {
                    if enclosing.is_none() {
                        return Err(self.error(format!("unexpected '{}' outside of a group", c)));
                    }
                    break;
                }
                '[' | '(' => {
                    flush_literal(&mut literal, &mut elements);
                    self.pos += 1;
                    let group = self.group(if c == '[' { ']' } else { ')' })?;
                    elements.push(group);
                }
                '%' => {
                    flush_literal(&mut literal, &mut elements);
                    self.pos += 1;
                    let placeholder = self.placeholder()?;
                    elements.push(placeholder);
                }
                '<' => {
                    flush_literal(&mut literal, &mut elements);
                    self.pos += 1;
                    let regex = self.regex()?;
                    elements.push(regex);
                }
                '\\' => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("pattern ends with '\\'"))?;
                    literal.extend(escaped.to_lowercase());
                    self.pos += 1;
                }
                c if c.is_whitespace() => {
                    flush_literal(&mut literal, &mut elements);
                    while self.peek().is_some_and(char::is_whitespace) {
                        self.pos += 1;
                    }
                    if !matches!(elements.last(), Some(Element::Space)) {
                        elements.push(Element::Space);
                    }
                }
                c => {
                    literal.extend(c.to_lowercase());
                    self.pos += 1;
                }
            }
        }

        flush_literal(&mut literal, &mut elements);
        Ok(elements)
    }

    /// Alternatives after an opening `[` or `(`
    fn group(&mut self, close: char) -> Result<Element> {
        let mut alternatives = Vec::new();
        loop {
            let mark = self.mark()?;
            let elements = self.sequence(Some(close))?;
            alternatives.push(Alternative { mark, elements });
            match self.peek() {
                Some('|') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                Some(c) => return Err(self.error(format!("expected '{}' but found '{}'", close, c))),
                None => return Err(self.error(format!("missing closing '{}'", close))),
            }
        }
        Ok(Element::Group {
            alternatives,
            optional: close == ']',
        })
    }

    /// Optional `N¦` prefix of an alternative
    fn mark(&mut self) -> Result<i32> {
        let mut end = self.pos;
        if self.chars.get(end) == Some(&'-') {
            end += 1;
        }
        let digits_start = end;
        while self.chars.get(end).is_some_and(char::is_ascii_digit) {
            end += 1;
        }
        if end == digits_start || self.chars.get(end) != Some(&'¦') {
            return Ok(0);
        }
        let text: String = self.chars[self.pos..end].iter().collect();
        let mark = text
            .parse()
            .map_err(|_| self.error(format!("invalid mark '{}'", text)))?;
        self.pos = end + 1;
        Ok(mark)
    }

    /// Body of a `%...%` placeholder
    fn placeholder(&mut self) -> Result<Element> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '%') {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("missing closing '%'"));
        }
        let body: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;

        let mut placeholder = Placeholder::of(&[]);
        let names = body.trim_start_matches(|c: char| {
            match c {
                '-' => placeholder.nullable = true,
                '*' => placeholder.literal_only = true,
                '+' => placeholder.greedy = true,
                '~' => {}
                _ => return false,
            }
            true
        });

        let mut single = true;
        for name in names.split('/') {
            let (info, plural) = self
                .types
                .lookup_name(name)
                .ok_or_else(|| self.error(format!("'{}' is not a type", name.trim())))?;
            single &= !plural;
            placeholder.types.push(info.code_name().to_string());
        }
        placeholder.single = single;

        self.placeholders.push(placeholder);
        Ok(Element::Placeholder(self.placeholders.len() - 1))
    }

    /// Body of a `<...>` regex group
    fn regex(&mut self) -> Result<Element> {
        let mut body = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("missing closing '>'")),
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    body.push('\\');
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        body.push(c);
                        self.pos += 1;
                    }
                }
                Some(c) => {
                    body.push(c);
                    self.pos += 1;
                }
            }
        }
        let regex = Regex::new(&format!("(?i)^(?:{})$", body))
            .map_err(|e| self.error(format!("invalid regex '{}': {}", body, e)))?;
        self.regexes.push(regex);
        Ok(Element::Regex(self.regexes.len() - 1))
    }
}

fn flush_literal(literal: &mut String, elements: &mut Vec<Element>) {
    if !literal.is_empty() {
        elements.push(Element::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassInfo;

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register(ClassInfo::new("object", "object¦s")).unwrap();
        types.register(ClassInfo::new("number", "number¦s")).unwrap();
        types.register(ClassInfo::new("itemtype", "itemtype¦s")).unwrap();
        types
    }

    #[test]
    fn test_structure() {
        let pattern = compile("drop[ping] [[of] %itemtypes%]", &types()).unwrap();
        let elements = pattern.elements();
        assert_eq!(elements.len(), 4);
        assert!(matches!(&elements[0], Element::Literal(l) if l == "drop"));
        assert!(matches!(&elements[1], Element::Group { optional: true, .. }));
        assert!(matches!(&elements[2], Element::Space));
        assert_eq!(pattern.placeholders().len(), 1);
        assert!(!pattern.placeholders()[0].single);
    }

    #[test]
    fn test_placeholder_flags() {
        let pattern = compile("every %*number% tick[s] %-+~number/objects%", &types()).unwrap();
        let first = &pattern.placeholders()[0];
        assert!(first.literal_only && first.single && !first.nullable);
        let second = &pattern.placeholders()[1];
        assert!(second.nullable && second.greedy && !second.single);
        assert_eq!(second.types, vec!["number", "object"]);
    }

    #[test]
    fn test_marks() {
        let pattern = compile("(1¦left|2¦right) click [(4¦twice)]", &types()).unwrap();
        match &pattern.elements()[0] {
            Element::Group { alternatives, optional } => {
                assert!(!optional);
                assert_eq!(alternatives.iter().map(|a| a.mark).collect::<Vec<_>>(), vec![1, 2]);
            }
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_escapes_and_case() {
        let pattern = compile("Say \\[hi\\]", &types()).unwrap();
        assert!(matches!(&pattern.elements()[0], Element::Literal(l) if l == "say"));
        assert!(matches!(&pattern.elements()[2], Element::Literal(l) if l == "[hi]"));
    }

    #[test]
    fn test_errors() {
        let types = types();
        assert!(compile("a (b", &types).is_err());
        assert!(compile("a ]", &types).is_err());
        assert!(compile("%worlds%", &types).is_err());
        assert!(compile("<(unclosed>", &types).is_err());
        assert!(compile("", &types).is_err());
    }
}
