//! Cache store abstraction layer
//!
//! The cache store holds two kinds of shared state: cached query results
//! addressed by generational storage keys, and the dependency generation
//! counters those keys are derived from.
//!
//! # Available Backends
//!
//! - [`InMemoryStore`] - Thread-safe in-process store with TTL support
//! - `RedisStore` - Redis-backed store shared between nodes (feature `redis`)
//!
//! # Observability
//!
//! Wrap any store with [`TracedStore`] to add tracing spans and logging.
//!
//! # TTL Semantics
//!
//! `put` writes without expiration. `put_with_ttl` defaults to a `put`
//! followed by `set_ttl`; in between the value is visible without its
//! expiration. Both bundled backends override it with a single atomic
//! write.

mod config;
mod error;
mod memory;
mod provider;
#[cfg(feature = "redis")]
mod redis;
mod traced;

use std::sync::Arc;

pub use config::{DEFAULT_KEY_PREFIX, DEFAULT_MAX_VALUE_SIZE, StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use provider::{CacheStore, EntryMeta, StoreStats};
#[cfg(feature = "redis")]
pub use redis::RedisStore;
pub use traced::TracedStore;

/// Service name attached to store spans
pub const SERVICE_NAME: &str = "gencache";

/// Create a cache store based on configuration
pub async fn create_store(config: &StoreConfig) -> crate::Result<Arc<dyn CacheStore>> {
    match config.backend {
        StoreBackend::Memory => {
            let mut store = InMemoryStore::new().with_max_value_size(config.max_value_size);
            if let Some(max) = config.max_entries {
                store = store.with_max_entries(max);
            }
            Ok(Arc::new(TracedStore::new(store, SERVICE_NAME)))
        }
        StoreBackend::Redis => create_redis_store(config).await,
    }
}

#[cfg(feature = "redis")]
async fn create_redis_store(config: &StoreConfig) -> crate::Result<Arc<dyn CacheStore>> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| crate::Error::Config("redis_url is required for the redis backend".into()))?;

    let store = RedisStore::connect(url)
        .await?
        .with_prefix(config.key_prefix.clone());
    tracing::info!(
        store.backend = "redis",
        store.prefix = %config.key_prefix,
        "Connected to cache store"
    );

    Ok(Arc::new(TracedStore::new(store, SERVICE_NAME)))
}

#[cfg(not(feature = "redis"))]
#[allow(clippy::unused_async)]
async fn create_redis_store(_config: &StoreConfig) -> crate::Result<Arc<dyn CacheStore>> {
    Err(crate::Error::Config(
        "redis backend requires the `redis` feature".into(),
    ))
}
