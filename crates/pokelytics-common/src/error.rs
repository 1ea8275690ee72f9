//! Error types shared across Pokelytics crates

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, PokelyticsError>;

/// Errors raised by configuration and logging setup
#[derive(Error, Debug)]
pub enum PokelyticsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl PokelyticsError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a logging error
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }
}
