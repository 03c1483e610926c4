use thiserror::Error;

use crate::gate::GateError;
use crate::invalidation::MetamodelError;
use crate::store::StoreError;
use crate::worker::FetchError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Connection gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Metamodel error: {0}")]
    Metamodel(#[from] MetamodelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl Error {
    /// Whether the operation may succeed if the caller retries it.
    ///
    /// Store unavailability and gate timeouts are transient; fetch errors
    /// report their own classification.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Gate(e) => e.is_timeout(),
            Self::Fetch(e) => e.is_retryable(),
            Self::Metamodel(e) => e.is_unavailable(),
            Self::Config(_) | Self::InvalidKey(_) => false,
        }
    }

    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    #[must_use]
    pub const fn is_gate(&self) -> bool {
        matches!(self, Self::Gate(_))
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
