//! Source locations for script diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line inside a script file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub script: String,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(script: impl Into<String>, line: usize) -> Self {
        Self {
            script: script.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}", self.script, self.line)
    }
}
