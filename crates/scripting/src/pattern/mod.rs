//! Syntax patterns
//!
//! A pattern is the mini-grammar a syntax element declares for the surface
//! text it accepts:
//!
//! - literal words, matched case-insensitively
//! - `[optional]` groups and `(a|b|c)` alternatives; an alternative written
//!   `N¦text` ORs `N` into the match mark
//! - `%type%` / `%types%` placeholders for nested expressions, with
//!   `/`-separated type lists and the flags `-` (nullable), `*` (literal
//!   only), `+` (greedy) and `~` (accepted, ignored)
//! - `<regex>` groups
//! - `\x` escapes a single character
//!
//! Patterns always match the entire input.

mod compiler;
mod matcher;

pub use compiler::compile;
pub use matcher::MatchState;

use regex::Regex;

/// One element of a compiled pattern
#[derive(Debug, Clone)]
pub enum Element {
    /// Lowercased literal text without whitespace
    Literal(String),
    /// A run of whitespace in the pattern
    Space,
    Group {
        alternatives: Vec<Alternative>,
        optional: bool,
    },
    /// Index into [`Pattern::placeholders`]
    Placeholder(usize),
    /// Index into the pattern's regex list
    Regex(usize),
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub mark: i32,
    pub elements: Vec<Element>,
}

/// A `%type%` slot
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Accepted type code names
    pub types: Vec<String>,
    /// Only one value may be produced
    pub single: bool,
    /// Omitting the placeholder leaves it empty instead of defaulting to
    /// the event's value
    pub nullable: bool,
    /// Only literals are accepted
    pub literal_only: bool,
    /// Longest extent is tried first
    pub greedy: bool,
}

impl Placeholder {
    /// A multi-value slot accepting the given types
    pub fn of(types: &[&str]) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            single: false,
            nullable: false,
            literal_only: false,
            greedy: false,
        }
    }

    /// A single-value slot accepting the given types
    pub fn single(types: &[&str]) -> Self {
        Self {
            single: true,
            ..Self::of(types)
        }
    }

    pub fn type_refs(&self) -> Vec<&str> {
        self.types.iter().map(String::as_str).collect()
    }
}

/// A compiled pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    elements: Vec<Element>,
    placeholders: Vec<Placeholder>,
    regexes: Vec<Regex>,
}

impl Pattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn regex_count(&self) -> usize {
        self.regexes.len()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
