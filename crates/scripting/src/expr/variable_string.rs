use crate::context::TriggerContext;
use crate::error::Result;
use crate::log::ErrorQuality;
use crate::parser::ParserState;
use crate::pattern::Placeholder;
use crate::syntax::{Expression, ParseResult, SyntaxElement};
use crate::value::{type_names, Value};

#[derive(Debug)]
enum Part {
    Text(String),
    Expr(Box<dyn Expression>),
}

/// Text with embedded `%expression%` segments
///
/// Used for quoted strings (where `""` escapes a quote) and for variable
/// names. `%%` escapes a percent sign in both.
#[derive(Debug)]
pub struct VariableString {
    parts: Vec<Part>,
}

impl VariableString {
    /// Parse the content of a quoted string, without the outer quotes
    pub fn parse(content: &str, state: &mut ParserState) -> Option<Self> {
        Self::parse_template(content, state, true)
    }

    /// Parse a variable name
    pub fn parse_name(content: &str, state: &mut ParserState) -> Option<Self> {
        Self::parse_template(content, state, false)
    }

    fn parse_template(content: &str, state: &mut ParserState, quoted: bool) -> Option<Self> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = content.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '"' if quoted => {
                    // Doubled quote
                    chars.next();
                    text.push('"');
                }
                '%' => {
                    if matches!(chars.peek(), Some((_, '%'))) {
                        chars.next();
                        text.push('%');
                        continue;
                    }
                    let start = i + 1;
                    let Some(end) = closing_percent(content, start) else {
                        state.error(
                            format!("Unclosed '%' in '{}'; write '%%' for a literal percent sign", content),
                            ErrorQuality::SemanticError,
                        );
                        return None;
                    };
                    let expr = state.parse_expression(&content[start..end], &Placeholder::of(&[type_names::OBJECT]))?;
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Expr(expr));
                    while chars.peek().is_some_and(|&(j, _)| j <= end) {
                        chars.next();
                    }
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(Part::Text(text));
        }
        Some(Self { parts })
    }

    /// Whether the text contains no expressions
    pub fn is_simple(&self) -> bool {
        self.parts.iter().all(|part| matches!(part, Part::Text(_)))
    }

    /// Fixed text of a simple string
    pub fn simple_text(&self) -> Option<String> {
        self.is_simple().then(|| {
            self.parts
                .iter()
                .filter_map(|part| match part {
                    Part::Text(text) => Some(text.as_str()),
                    Part::Expr(_) => None,
                })
                .collect()
        })
    }

    pub fn evaluate(&self, ctx: &mut TriggerContext) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Expr(expr) => {
                    let values = expr.get_array(ctx)?;
                    out.push_str(&ctx.registry().types().format_list(&values, expr.and()));
                }
            }
        }
        Ok(out)
    }

    /// Template form, e.g. `score of %loop-value%`
    pub fn template(&self, debug: bool) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => text.replace('%', "%%"),
                Part::Expr(expr) => format!("%{}%", expr.describe(debug)),
            })
            .collect()
    }
}

/// Index of the `%` closing an expression that starts at `start`
fn closing_percent(content: &str, start: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in content[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            '%' if depth <= 0 => return Some(start + i),
            _ => {}
        }
    }
    None
}

impl SyntaxElement for VariableString {
    fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
        true
    }

    fn describe(&self, debug: bool) -> String {
        format!("\"{}\"", self.template(debug).replace('"', "\"\""))
    }
}

impl Expression for VariableString {
    fn return_type(&self) -> &str {
        type_names::TEXT
    }

    fn is_single(&self) -> bool {
        true
    }

    fn get_all(&self, ctx: &mut TriggerContext) -> Result<Vec<Value>> {
        Ok(vec![Value::Text(self.evaluate(ctx)?)])
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        self.simple_text().map(|text| vec![Value::Text(text)])
    }
}

#[cfg(test)]
mod tests {
    use super::closing_percent;

    #[test]
    fn test_closing_percent_skips_braces() {
        assert_eq!(closing_percent("a% b", 0), Some(1));
        assert_eq!(closing_percent("{x::%y%}% z", 0), Some(8));
        assert_eq!(closing_percent("never", 0), None);
    }
}
