//! Redis-backed store shared across nodes

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::config::DEFAULT_KEY_PREFIX;
use super::error::{StoreError, StoreResult};
use super::provider::{CacheStore, EntryMeta, StoreStats};

#[derive(Debug, Default)]
struct RedisStats {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
    counter_increments: AtomicU64,
}

/// Store backed by a Redis server.
///
/// Values live under `<prefix><key>`, generation counters under
/// `<prefix>gen:<name>`. Counter batches run inside `MULTI`/`EXEC` so a
/// batch is applied as a whole; `put_with_ttl` uses `SET .. EX`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    stats: Arc<RedisStats>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("conn", &"<ConnectionManager>")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;

        Ok(Self {
            conn,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            stats: Arc::new(RedisStats::default()),
        })
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn value_key(&self, key: &str) -> String {
        value_key(&self.prefix, key)
    }

    fn counter_keys(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .map(|name| counter_key(&self.prefix, name))
            .collect()
    }
}

fn value_key(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

fn counter_key(prefix: &str, name: &str) -> String {
    format!("{prefix}gen:{name}")
}

fn map_redis_error(err: redis::RedisError) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Other(err.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn
            .get(self.value_key(key))
            .await
            .map_err(map_redis_error)?;

        let counter = if value.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);

        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let () = conn
            .set(self.value_key(key), value)
            .await
            .map_err(map_redis_error)?;

        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        conn.expire(self.value_key(key), seconds)
            .await
            .map_err(map_redis_error)
    }

    async fn put_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let key = self.value_key(key);

        // SET EX rejects a zero expiry; a zero TTL means the value is already gone.
        if ttl.as_secs() == 0 {
            let _: u64 = conn.del(&key).await.map_err(map_redis_error)?;
            return Ok(true);
        }

        let () = conn
            .set_ex(&key, value, ttl.as_secs())
            .await
            .map_err(map_redis_error)?;

        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(self.value_key(key))
            .await
            .map_err(map_redis_error)?;

        if removed > 0 {
            self.stats.deletes.fetch_add(removed, Ordering::Relaxed);
        }
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(self.value_key(key))
            .await
            .map_err(map_redis_error)
    }

    async fn metadata(&self, key: &str) -> StoreResult<Option<EntryMeta>> {
        let mut conn = self.conn.clone();
        let key = self.value_key(key);

        let ttl: i64 = conn.ttl(&key).await.map_err(map_redis_error)?;
        // -2: key does not exist, -1: key has no expiration
        if ttl == -2 {
            return Ok(None);
        }
        let size: usize = conn.strlen(&key).await.map_err(map_redis_error)?;

        Ok(Some(EntryMeta {
            size_bytes: size,
            ttl_remaining: u64::try_from(ttl).ok().map(Duration::from_secs),
        }))
    }

    async fn read_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<u64>> = redis::cmd("MGET")
            .arg(self.counter_keys(names))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(values.into_iter().map(Option::unwrap_or_default).collect())
    }

    async fn increment_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in self.counter_keys(names) {
            pipe.incr(key, 1u64);
        }

        let mut conn = self.conn.clone();
        let values: Vec<u64> = pipe.query_async(&mut conn).await.map_err(map_redis_error)?;

        self.stats
            .counter_increments
            .fetch_add(names.len() as u64, Ordering::Relaxed);
        Ok(values)
    }

    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn stats(&self) -> StoreStats {
        StoreStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            puts: self.stats.puts.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
            counter_increments: self.stats.counter_increments.load(Ordering::Relaxed),
            entry_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_key_uses_prefix() {
        assert_eq!(value_key("gencache:", "abc-3"), "gencache:abc-3");
    }

    #[test]
    fn test_counter_key_namespace() {
        assert_eq!(counter_key("gencache:", "p/1/d/2"), "gencache:gen:p/1/d/2");
    }

    #[test]
    fn test_same_name_maps_to_distinct_keys() {
        assert_ne!(value_key("x:", "a"), counter_key("x:", "a"));
    }

    #[tokio::test]
    async fn test_connect_invalid_url_is_error() {
        let result = RedisStore::connect("not a url").await;
        assert!(result.is_err());
    }
}
