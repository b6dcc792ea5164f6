//! Text helpers for the parser: list splitting, parentheses and quotes

/// Separator between two list items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Comma,
    And,
    Or,
}

/// Items of a top-level list
#[derive(Debug, Clone, PartialEq)]
pub struct ListSplit<'a> {
    pub items: Vec<&'a str>,
    pub separators: Vec<Separator>,
}

impl ListSplit<'_> {
    pub fn has_and(&self) -> bool {
        self.separators.contains(&Separator::And)
    }

    pub fn has_or(&self) -> bool {
        self.separators.contains(&Separator::Or)
    }

    /// Both `and` and `or` at the same level
    pub fn is_mixed(&self) -> bool {
        self.has_and() && self.has_or()
    }

    /// Joined by commas only
    pub fn is_comma_only(&self) -> bool {
        !self.has_and() && !self.has_or()
    }

    /// Conjunctive unless joined by `or`
    pub fn is_and(&self) -> bool {
        !self.has_or()
    }
}

fn keyword_at(bytes: &[u8], at: usize, keyword: &[u8]) -> bool {
    bytes
        .get(at..at + keyword.len())
        .is_some_and(|slice| slice.eq_ignore_ascii_case(keyword))
}

/// Split `text` on top-level `,`, ` and ` and ` or ` (also `, and` / `, or`).
///
/// Separators inside quotes, parentheses or braces are ignored. Returns
/// `None` when an item would be empty.
pub fn split_list(text: &str) -> Option<ListSplit<'_>> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut separators = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            in_quote = b != b'"';
            i += 1;
            continue;
        }
        match b {
            b'"' => in_quote = true,
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth -= 1,
            _ if depth != 0 => {}
            b',' => {
                items.push(&text[start..i]);
                let mut j = i + 1;
                while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
                    j += 1;
                }
                let separator = if keyword_at(bytes, j, b"and ") {
                    j += 4;
                    Separator::And
                } else if keyword_at(bytes, j, b"or ") {
                    j += 3;
                    Separator::Or
                } else {
                    Separator::Comma
                };
                separators.push(separator);
                start = j;
                i = j;
                continue;
            }
            b' ' if keyword_at(bytes, i, b" and ") => {
                items.push(&text[start..i]);
                separators.push(Separator::And);
                start = i + 5;
                i = start;
                continue;
            }
            b' ' if keyword_at(bytes, i, b" or ") => {
                items.push(&text[start..i]);
                separators.push(Separator::Or);
                start = i + 4;
                i = start;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    items.push(&text[start..]);

    let items: Vec<&str> = items.into_iter().map(str::trim).collect();
    if items.iter().any(|item| item.is_empty()) {
        return None;
    }
    Some(ListSplit { items, separators })
}

/// Inner text if `text` is wrapped in one pair of matching parentheses
pub fn strip_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0i32;
    let mut in_quote = false;
    for c in inner.chars() {
        if in_quote {
            in_quote = c != '"';
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                // "(a) and (b)": the outer parentheses do not pair up
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

/// Content of a quoted string literal, still escaped
///
/// Inside the quotes, `""` stands for one quote; `%...%` segments may
/// contain quotes of their own.
pub fn unquote(text: &str) -> Option<&str> {
    if text.len() < 2 {
        return None;
    }
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if chars.next() != Some('"') {
                    return None;
                }
            }
            '%' => {
                if chars.peek() == Some(&'%') {
                    chars.next();
                    continue;
                }
                // Skip the embedded expression
                if !chars.by_ref().any(|c| c == '%') {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(inner)
}

/// `-12`, `3.5`: digits with an optional sign and fraction
pub fn is_plain_number(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };
    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}
