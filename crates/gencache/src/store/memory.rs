//! In-memory store implementation with TTL support

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::config::DEFAULT_MAX_VALUE_SIZE;
use super::error::{StoreError, StoreResult};
use super::provider::{CacheStore, EntryMeta, StoreStats};

/// Stored value with expiration
struct StoreEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

#[derive(Default)]
struct InMemoryStats {
    hits: u64,
    misses: u64,
    puts: u64,
    deletes: u64,
    counter_increments: u64,
}

/// Thread-safe in-memory store with TTL support and generation counters.
///
/// Suitable for single-process deployments and tests. Counter batches are
/// applied under one write lock, which makes `increment_counters`
/// all-or-nothing.
///
/// # Eviction Behavior
///
/// When `max_entries` is reached, expired entries are purged first; if the
/// store is still full an arbitrary entry is evicted. Counters are never
/// evicted.
#[derive(Clone)]
pub struct InMemoryStore {
    values: Arc<RwLock<HashMap<String, StoreEntry>>>,
    counters: Arc<RwLock<HashMap<String, u64>>>,
    stats: Arc<RwLock<InMemoryStats>>,
    max_entries: Option<usize>,
    max_value_size: usize,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("max_entries", &self.max_entries)
            .field("max_value_size", &self.max_value_size)
            .field("entry_count", &self.values.read().len())
            .field("counter_count", &self.counters.read().len())
            .finish_non_exhaustive()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(InMemoryStats::default())),
            max_entries: None,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }

    #[must_use]
    pub const fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    #[must_use]
    pub const fn with_max_value_size(mut self, max: usize) -> Self {
        self.max_value_size = max;
        self
    }

    fn insert(&self, key: &str, value: &[u8], expires_at: Option<Instant>) -> StoreResult<bool> {
        if value.len() > self.max_value_size {
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                max: self.max_value_size,
            });
        }

        let mut values = self.values.write();

        if let Some(max) = self.max_entries
            && values.len() >= max
            && !values.contains_key(key)
        {
            values.retain(|_, entry| !entry.is_expired());
            if values.len() >= max
                && let Some(victim) = values.keys().next().cloned()
            {
                values.remove(&victim);
            }
        }

        values.insert(
            key.to_string(),
            StoreEntry {
                value: value.to_vec(),
                expires_at,
            },
        );
        drop(values);

        self.stats.write().puts += 1;
        Ok(true)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let values = self.values.read();
        let value = values
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone());
        drop(values);

        let mut stats = self.stats.write();
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        self.insert(key, value, None)
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut values = self.values.write();
        match values.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        self.insert(key, value, Some(Instant::now() + ttl))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed = self.values.write().remove(key).is_some();
        if removed {
            self.stats.write().deletes += 1;
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .values
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn metadata(&self, key: &str) -> StoreResult<Option<EntryMeta>> {
        let values = self.values.read();
        Ok(values
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| EntryMeta {
                size_bytes: entry.value.len(),
                ttl_remaining: entry.ttl_remaining(),
            }))
    }

    async fn read_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
        let counters = self.counters.read();
        Ok(names
            .iter()
            .map(|name| counters.get(name).copied().unwrap_or(0))
            .collect())
    }

    async fn increment_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
        let mut counters = self.counters.write();
        let updated = names
            .iter()
            .map(|name| {
                let generation = counters.entry(name.clone()).or_insert(0);
                *generation += 1;
                *generation
            })
            .collect();
        drop(counters);

        self.stats.write().counter_increments += names.len() as u64;
        Ok(updated)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn stats(&self) -> StoreStats {
        let entry_count = self
            .values
            .read()
            .values()
            .filter(|e| !e.is_expired())
            .count() as u64;
        let stats = self.stats.read();

        StoreStats {
            hits: stats.hits,
            misses: stats.misses,
            puts: stats.puts,
            deletes: stats.deletes,
            counter_increments: stats.counter_increments,
            entry_count: Some(entry_count),
        }
    }
}
