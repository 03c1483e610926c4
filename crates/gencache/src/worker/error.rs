use std::time::Duration;

use thiserror::Error;

use crate::gate::GateError;
use crate::store::StoreError;

/// Errors raised by a SQL execution source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl SourceError {
    /// Whether re-running the query against the source may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::PoolExhausted
        )
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors converting a result set to or from the cached payload
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Row {row} has {actual} values, expected {expected}")]
    ColumnMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Payload of {size} bytes exceeds the store limit of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Column '{column}' expects {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },
}

pub type PayloadResult<T> = std::result::Result<T, PayloadError>;

/// Failure of a worker fetch.
///
/// `Execution` means the source query itself failed; `Serialization` means
/// the query succeeded but its result could not be turned into a storable
/// payload. Neither case writes to the cache store. `Store` means the
/// payload was ready but the cache write failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Query execution failed: {source}")]
    Execution {
        #[from]
        source: SourceError,
    },

    #[error("Result serialization failed: {source}")]
    Serialization {
        #[from]
        source: PayloadError,
    },

    #[error("No connection slot: {source}")]
    Gate {
        #[from]
        source: GateError,
    },

    #[error("Cache write failed: {source}")]
    Store { source: StoreError },
}

impl From<StoreError> for FetchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ValueTooLarge { size, max } => Self::Serialization {
                source: PayloadError::TooLarge { size, max },
            },
            source => Self::Store { source },
        }
    }
}

impl FetchError {
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    #[must_use]
    pub const fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    #[must_use]
    pub const fn is_gate(&self) -> bool {
        matches!(self, Self::Gate { .. })
    }

    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Whether retrying the whole fetch may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution { source } => source.is_transient(),
            Self::Gate { source } => source.is_timeout(),
            Self::Store { source } => source.is_retryable(),
            Self::Serialization { .. } => false,
        }
    }
}
