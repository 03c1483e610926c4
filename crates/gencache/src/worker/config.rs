//! Query worker configuration

use std::time::Duration;

/// Default number of workers in a pool
pub const DEFAULT_WORKERS: usize = 4;
/// Default TTL applied for [`TtlPolicy::WorkerDefault`](super::TtlPolicy::WorkerDefault)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default row cap when the caller does not request one
pub const DEFAULT_ROW_LIMIT: usize = 10_000;
/// Hard row ceiling regardless of the requested limit
pub const MAX_ROW_LIMIT: usize = 100_000;
/// Default query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Default size of each per-credential connection pool
pub const DEFAULT_CONNECTION_POOL_SIZE: usize = 4;

/// Query worker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub workers: usize,
    pub default_ttl: Duration,
    pub default_row_limit: usize,
    pub max_row_limit: usize,
    pub query_timeout: Duration,
    pub connection_pool_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            default_ttl: DEFAULT_TTL,
            default_row_limit: DEFAULT_ROW_LIMIT,
            max_row_limit: MAX_ROW_LIMIT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            connection_pool_size: DEFAULT_CONNECTION_POOL_SIZE,
        }
    }

    /// Row limit to apply for a caller-requested limit.
    ///
    /// Non-positive requests fall back to `default_row_limit`; the result
    /// never exceeds `max_row_limit`.
    #[must_use]
    pub fn effective_row_limit(&self, requested: i64) -> usize {
        let limit = if requested > 0 {
            usize::try_from(requested).unwrap_or(usize::MAX)
        } else {
            self.default_row_limit
        };
        limit.min(self.max_row_limit)
    }
}
