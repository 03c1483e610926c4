//! Traced store wrapper for observability

use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use super::error::StoreResult;
use super::provider::{CacheStore, EntryMeta, StoreStats};

/// Wrapper that adds tracing to any `CacheStore`
///
/// Uses debug-level spans; keys are generational storage keys and counter
/// names are metamodel references, neither of which carries query text.
pub struct TracedStore<S> {
    inner: S,
    service_name: String,
}

impl<S: std::fmt::Debug> std::fmt::Debug for TracedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedStore")
            .field("inner", &self.inner)
            .field("service_name", &self.service_name)
            .finish()
    }
}

impl<S: Clone> Clone for TracedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            service_name: self.service_name.clone(),
        }
    }
}

impl<S> TracedStore<S> {
    pub fn new(store: S, service_name: impl Into<String>) -> Self {
        Self {
            inner: store,
            service_name: service_name.into(),
        }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: CacheStore> CacheStore for TracedStore<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let span = tracing::debug_span!(
            "store.get",
            cache.key = key,
            service = %self.service_name,
            otel.name = "store.get",
        );

        let result = self.inner.get(key).instrument(span).await;

        match &result {
            Ok(Some(data)) => {
                tracing::debug!(
                    cache.result = "hit",
                    cache.key = key,
                    cache.size_bytes = data.len(),
                );
            }
            Ok(None) => {
                tracing::debug!(cache.result = "miss", cache.key = key);
            }
            Err(e) => {
                tracing::warn!(cache.result = "error", cache.key = key, error = %e);
            }
        }

        result
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let span = tracing::debug_span!(
            "store.put",
            cache.key = key,
            cache.value_size = value.len(),
            otel.name = "store.put",
        );

        let result = self.inner.put(key, value).instrument(span).await;

        if let Err(ref e) = result {
            tracing::warn!(cache.operation = "put", cache.key = key, error = %e);
        }

        result
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let span = tracing::debug_span!(
            "store.set_ttl",
            cache.key = key,
            cache.ttl_secs = ttl.as_secs(),
            otel.name = "store.set_ttl",
        );

        let result = self.inner.set_ttl(key, ttl).instrument(span).await;

        match &result {
            Ok(false) => {
                tracing::warn!(
                    cache.operation = "set_ttl",
                    cache.key = key,
                    "TTL not applied, key absent"
                );
            }
            Err(e) => {
                tracing::warn!(cache.operation = "set_ttl", cache.key = key, error = %e);
            }
            Ok(true) => {}
        }

        result
    }

    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        let span = tracing::debug_span!(
            "store.put_with_ttl",
            cache.key = key,
            cache.value_size = value.len(),
            cache.ttl_secs = ttl.as_secs(),
            otel.name = "store.put_with_ttl",
        );

        let result = self.inner.put_with_ttl(key, value, ttl).instrument(span).await;

        if let Err(ref e) = result {
            tracing::warn!(cache.operation = "put_with_ttl", cache.key = key, error = %e);
        }

        result
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let span =
            tracing::debug_span!("store.delete", cache.key = key, otel.name = "store.delete");

        let result = self.inner.delete(key).instrument(span).await;

        match &result {
            Ok(deleted) => {
                tracing::debug!(
                    cache.operation = "delete",
                    cache.key = key,
                    cache.deleted = deleted
                );
            }
            Err(e) => {
                tracing::warn!(cache.operation = "delete", cache.key = key, error = %e);
            }
        }

        result
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let span =
            tracing::debug_span!("store.exists", cache.key = key, otel.name = "store.exists");

        self.inner.exists(key).instrument(span).await
    }

    async fn metadata(&self, key: &str) -> StoreResult<Option<EntryMeta>> {
        let span =
            tracing::debug_span!("store.metadata", cache.key = key, otel.name = "store.metadata");

        self.inner.metadata(key).instrument(span).await
    }

    async fn read_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
        let span = tracing::debug_span!(
            "store.read_counters",
            generation.count = names.len(),
            otel.name = "store.read_counters",
        );

        let result = self.inner.read_counters(names).instrument(span).await;

        if let Err(ref e) = result {
            tracing::warn!(
                generation.operation = "read",
                generation.count = names.len(),
                error = %e
            );
        }

        result
    }

    async fn increment_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
        let span = tracing::debug_span!(
            "store.increment_counters",
            generation.count = names.len(),
            otel.name = "store.increment_counters",
        );

        let result = self.inner.increment_counters(names).instrument(span).await;

        match &result {
            Ok(generations) => {
                tracing::debug!(
                    generation.operation = "increment",
                    generation.names = ?names,
                    generation.values = ?generations,
                );
            }
            Err(e) => {
                tracing::warn!(
                    generation.operation = "increment",
                    generation.names = ?names,
                    error = %e
                );
            }
        }

        result
    }

    async fn health_check(&self) -> StoreResult<()> {
        let span = tracing::debug_span!("store.health_check", otel.name = "store.health_check");

        self.inner.health_check().instrument(span).await
    }

    async fn stats(&self) -> StoreStats {
        self.inner.stats().await
    }
}
