//! Cache store error types

use thiserror::Error;

/// Cache store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache store connection error: {0}")]
    Connection(String),

    #[error("Cache store operation timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Value too large: {size} bytes (max: {max} bytes)")]
    ValueTooLarge { size: usize, max: usize },

    #[error("Cache store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Whether the caller may retry the operation later.
    ///
    /// Connection loss and timeouts mean the store could not be reached;
    /// everything else is a rejection of this particular request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}

/// Result type for cache store operations
pub type StoreResult<T> = Result<T, StoreError>;
