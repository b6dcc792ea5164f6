//! Error types for the scripting crate

use trellis_core::TrellisError;

/// Script-specific error types
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Pattern string failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Syntax or type registration failed
    #[error("Registration error: {0}")]
    Registration(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Script file I/O
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    /// Script not loaded
    #[error("Script not found: {0}")]
    NotFound(String),

    /// Main thread did not pick up a handed-off event in time
    #[error("Main thread did not respond within {0:?}")]
    SyncTimeout(std::time::Duration),
}

impl ScriptError {
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::RuntimeError(message.into())
    }
}

impl From<ScriptError> for TrellisError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::FileError(e) => TrellisError::Io(e),
            ScriptError::Registration(message) => TrellisError::Registration(message),
            ScriptError::NotFound(name) => TrellisError::NotFound(name),
            other => TrellisError::Script(other.to_string()),
        }
    }
}

/// Result type for scripting operations
pub type Result<T> = std::result::Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_core_error() {
        let err: TrellisError = ScriptError::NotFound("script 'a.sk'".to_string()).into();
        assert!(matches!(err, TrellisError::NotFound(_)));
        let err: TrellisError = ScriptError::runtime("boom").into();
        assert_eq!(err.to_string(), TrellisError::Script("Runtime error: boom".to_string()).to_string());
    }
}
