//! Backend error types

use thiserror::Error;

/// Errors surfaced by infrastructure backends
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Invalid properties for {kind} '{id}': {message}")]
    InvalidProperties {
        kind: String,
        id: String,
        message: String,
    },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Whether the operation that produced this error is worth retrying.
    ///
    /// Only transient conditions qualify; everything else fails the node on
    /// the first attempt regardless of the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited(_) | BackendError::Timeout(_) | BackendError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
