//! Core error types for Trellis

#[derive(thiserror::Error, Debug)]
pub enum TrellisError {
    #[error("Script error: {0}")]
    Script(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
