//! Error types shared across the workspace

use thiserror::Error;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Upstream returned HTTP 429. Kept distinct from `Api` so orchestration
    /// loops can decide to back off and retry.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CascadeError {
    pub fn api(msg: impl Into<String>) -> Self {
        CascadeError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        CascadeError::Network(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        CascadeError::RateLimited(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        CascadeError::Parse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CascadeError::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CascadeError::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        CascadeError::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CascadeError::Internal(msg.into())
    }

    /// Whether this failure should be retried after a backoff wait.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CascadeError::RateLimited(_))
    }
}

/// Result type alias for cascade operations
pub type CascadeResult<T> = Result<T, CascadeError>;
