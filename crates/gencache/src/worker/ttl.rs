//! TTL policy for cached results

use std::time::Duration;

use thiserror::Error;

/// Raw policy value meaning "never expire"
pub const NO_EXPIRATION: i64 = -1;
/// Raw policy value meaning "use the worker's default TTL"
pub const WORKER_DEFAULT: i64 = -2;

/// Raw TTL value outside the accepted range
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid TTL policy {0}: expected -1, -2 or a non-negative number of seconds")]
pub struct InvalidTtl(pub i64);

/// How long a fetched result stays in the cache store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlPolicy {
    NoExpiration,
    #[default]
    WorkerDefault,
    Seconds(u64),
}

impl TtlPolicy {
    /// Concrete TTL to apply, `None` for no expiration.
    #[must_use]
    pub const fn resolve(self, worker_default: Duration) -> Option<Duration> {
        match self {
            Self::NoExpiration => None,
            Self::WorkerDefault => Some(worker_default),
            Self::Seconds(secs) => Some(Duration::from_secs(secs)),
        }
    }

    /// Raw integer form
    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::NoExpiration => NO_EXPIRATION,
            Self::WorkerDefault => WORKER_DEFAULT,
            Self::Seconds(secs) => i64::try_from(secs).unwrap_or(i64::MAX),
        }
    }
}

impl TryFrom<i64> for TtlPolicy {
    type Error = InvalidTtl;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            NO_EXPIRATION => Ok(Self::NoExpiration),
            WORKER_DEFAULT => Ok(Self::WorkerDefault),
            secs => u64::try_from(secs)
                .map(Self::Seconds)
                .map_err(|_| InvalidTtl(value)),
        }
    }
}

impl From<Duration> for TtlPolicy {
    fn from(ttl: Duration) -> Self {
        Self::Seconds(ttl.as_secs())
    }
}
