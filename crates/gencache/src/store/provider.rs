//! Cache store trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::StoreResult;

/// Entry metadata for observability and TTL inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// Size in bytes
    pub size_bytes: usize,
    /// Time-to-live remaining, `None` when the entry never expires
    pub ttl_remaining: Option<Duration>,
}

/// Store statistics for metrics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub deletes: u64,
    pub counter_increments: u64,
    pub entry_count: Option<u64>,
}

/// Shared, TTL-capable key-value store holding cached results and
/// dependency generation counters.
///
/// All operations are async to support network-based backends. Counter
/// operations work on batches: `increment_counters` must apply to every
/// name or to none of them.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value without expiration. Returns `false` if the store
    /// declined the write.
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<bool>;

    /// Apply a TTL to an existing key. Returns `false` if the key is absent.
    async fn set_ttl(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Write a value and apply its TTL.
    ///
    /// The default implementation issues `put` followed by `set_ttl`, so the
    /// value is briefly visible without its expiration. Backends with an
    /// atomic primitive override this.
    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        if !self.put(key, value).await? {
            return Ok(false);
        }
        self.set_ttl(key, ttl).await
    }

    /// Delete a key
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Get entry metadata without retrieving the value
    async fn metadata(&self, key: &str) -> StoreResult<Option<EntryMeta>>;

    /// Read the generation counters for `names`, in order. Absent counters
    /// read as 0.
    async fn read_counters(&self, names: &[String]) -> StoreResult<Vec<u64>>;

    /// Atomically increment every counter in `names` and return the new
    /// values, in order. Absent counters start from 0.
    async fn increment_counters(&self, names: &[String]) -> StoreResult<Vec<u64>>;

    /// Health check for the store backend
    async fn health_check(&self) -> StoreResult<()>;

    /// Get store statistics for observability
    async fn stats(&self) -> StoreStats;
}
