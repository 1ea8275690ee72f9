//! Error taxonomy for the ETL stages
//!
//! Per-id failures (`FetchFailed`, `Invalid`, `PersistFailed`) are absorbed
//! by the orchestrator; `ConnectFailed` is the only one that ends a run.

use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// Rejected before any I/O took place
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network, HTTP status, body parsing or a missing reference URL
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// The raw record did not pass shaping
    #[error("Invalid record: {0}")]
    Invalid(String),

    /// A record write was rolled back
    #[error("Persist failed: {0}")]
    PersistFailed(String),

    #[error("Store connection failed: {0}")]
    ConnectFailed(String),

    #[error("Schema creation failed: {0}")]
    SchemaFailed(String),

    /// A read-side query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// A panic caught while processing one id
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl EtlError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Short stage label for log fields
    pub fn stage(&self) -> &'static str {
        match self {
            EtlError::InvalidInput(_) | EtlError::FetchFailed(_) => "extract",
            EtlError::Invalid(_) => "transform",
            EtlError::PersistFailed(_) => "load",
            EtlError::ConnectFailed(_) | EtlError::SchemaFailed(_) => "setup",
            EtlError::Query(_) => "query",
            EtlError::Unexpected(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        EtlError::FetchFailed(err.to_string())
    }
}
