//! Query worker: execute, serialize and cache one result

use std::fmt;
use std::sync::Arc;

use super::config::WorkerConfig;
use super::error::FetchError;
use super::payload::encode_payload;
use super::registry::SourceRegistry;
use super::source::{ConnectionInfo, SourceFactory};
use super::ttl::TtlPolicy;
use crate::gate::ConnectionGate;
use crate::store::CacheStore;

/// Stateless query executor with its own cache of SQL sources
pub struct QueryWorker {
    id: usize,
    store: Arc<dyn CacheStore>,
    gate: Arc<ConnectionGate>,
    sources: SourceRegistry,
    config: WorkerConfig,
}

impl fmt::Debug for QueryWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryWorker")
            .field("id", &self.id)
            .field("sources", &self.sources)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QueryWorker {
    pub fn new(
        id: usize,
        store: Arc<dyn CacheStore>,
        gate: Arc<ConnectionGate>,
        factory: Arc<dyn SourceFactory>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            store,
            gate,
            sources: SourceRegistry::new(factory),
            config,
        }
    }

    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    #[must_use]
    pub const fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Run `sql` and cache the encoded result under `key`.
    ///
    /// Holds a connection gate permit for `connection` from before the query
    /// until the cache write completes. The store is only written after the
    /// whole result has been serialized. Returns whether the store accepted
    /// the write. Source, serialization and store failures are returned as
    /// errors; a payload over the store's size limit counts as a
    /// serialization failure.
    pub async fn fetch(
        &self,
        key: &str,
        sql: &str,
        connection: &ConnectionInfo,
        ttl: TtlPolicy,
        row_limit: i64,
    ) -> Result<bool, FetchError> {
        let limit = self.config.effective_row_limit(row_limit);
        let source = self.sources.get(connection)?;

        let _permit = self.gate.acquire(&connection.target()).await?;

        let mut rows = source.query(sql, limit).await.inspect_err(|e| {
            tracing::warn!(
                worker.id = self.id,
                cache.key = key,
                error = %e,
                "Query execution failed"
            );
        })?;
        rows.truncate(limit);

        let payload = encode_payload(&rows)?;

        let written = match ttl.resolve(self.config.default_ttl) {
            Some(expiry) => self.store.put_with_ttl(key, &payload, expiry).await,
            None => self.store.put(key, &payload).await,
        };

        let stored = written.map_err(|e| {
            tracing::warn!(
                worker.id = self.id,
                cache.key = key,
                cache.bytes = payload.len(),
                error = %e,
                "Failed to cache query result"
            );
            FetchError::from(e)
        })?;

        tracing::debug!(
            worker.id = self.id,
            cache.key = key,
            cache.rows = rows.len(),
            cache.bytes = payload.len(),
            cache.ttl = ttl.as_raw(),
            cache.stored = stored,
            "Fetched and cached query result"
        );
        Ok(stored)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::gate::GateConfig;
    use crate::store::{EntryMeta, InMemoryStore, StoreError, StoreResult, StoreStats};
    use crate::worker::error::SourceError;
    use crate::worker::payload::decode_payload;
    use crate::worker::source::{Column, ColumnType, RowSet, SqlSource, Value};

    /// Source returning `rows` integer rows, or failing every query.
    pub(crate) struct FakeSource {
        pub rows: i64,
        pub fail: bool,
        pub queries: AtomicUsize,
    }

    #[async_trait]
    impl SqlSource for FakeSource {
        // Ignores the row limit so the worker's own truncation is exercised.
        async fn query(&self, _sql: &str, _row_limit: usize) -> Result<RowSet, SourceError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Query("relation does not exist".into()));
            }
            let rows = (0..self.rows)
                .map(|i| vec![Value::Int(i), Value::Text(format!("row-{i}"))])
                .collect();
            Ok(RowSet::new(
                vec![
                    Column::new("id", ColumnType::Int64),
                    Column::new("label", ColumnType::Utf8),
                ],
                rows,
            ))
        }
    }

    pub(crate) struct FakeFactory {
        pub source: Arc<FakeSource>,
    }

    impl FakeFactory {
        pub(crate) fn new(rows: i64, fail: bool) -> Self {
            Self {
                source: Arc::new(FakeSource {
                    rows,
                    fail,
                    queries: AtomicUsize::new(0),
                }),
            }
        }
    }

    impl SourceFactory for FakeFactory {
        fn create(
            &self,
            _connection: &ConnectionInfo,
        ) -> Result<Arc<dyn SqlSource>, SourceError> {
            Ok(Arc::clone(&self.source) as Arc<dyn SqlSource>)
        }
    }

    pub(crate) fn connection() -> ConnectionInfo {
        ConnectionInfo::new("hdbsql://db:30015", "analyst", "secret")
    }

    struct Fixture {
        store: InMemoryStore,
        gate: Arc<ConnectionGate>,
        worker: QueryWorker,
    }

    fn fixture(rows: i64, fail: bool) -> Fixture {
        let store = InMemoryStore::new();
        let gate = Arc::new(ConnectionGate::new(GateConfig {
            capacity: 1,
            acquire_timeout: Some(Duration::from_millis(200)),
        }));
        let config = WorkerConfig {
            default_ttl: Duration::from_secs(120),
            default_row_limit: 5,
            max_row_limit: 50,
            ..WorkerConfig::new()
        };
        let worker = QueryWorker::new(
            0,
            Arc::new(store.clone()),
            Arc::clone(&gate),
            Arc::new(FakeFactory::new(rows, fail)),
            config,
        );
        Fixture {
            store,
            gate,
            worker,
        }
    }

    #[tokio::test]
    async fn test_fetch_then_read_round_trip() {
        let f = fixture(150, false);
        let stored = f
            .worker
            .fetch("k-0", "SELECT 1", &connection(), TtlPolicy::NoExpiration, 100)
            .await
            .unwrap();
        assert!(stored);

        let bytes = f.store.get("k-0").await.unwrap().unwrap();
        let decoded = decode_payload(&bytes).unwrap();

        let source = f.worker.sources().get(&connection()).unwrap();
        let mut expected = source.query("SELECT 1", 100).await.unwrap();
        expected.truncate(50);

        assert_eq!(decoded.len(), 50);
        assert_eq!(decoded, expected);
        assert_eq!(decoded.rows()[49], vec![Value::Int(49), Value::Text("row-49".into())]);
    }

    #[tokio::test]
    async fn test_row_limit_truncates() {
        let f = fixture(20, false);
        f.worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::NoExpiration, 7)
            .await
            .unwrap();

        let rows = decode_payload(&f.store.get("k").await.unwrap().unwrap()).unwrap();
        assert_eq!(rows.len(), 7);
    }

    #[tokio::test]
    async fn test_non_positive_row_limit_uses_default() {
        let f = fixture(20, false);
        f.worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::NoExpiration, 0)
            .await
            .unwrap();

        let rows = decode_payload(&f.store.get("k").await.unwrap().unwrap()).unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn test_ttl_policy_mapping() {
        let f = fixture(1, false);
        let conn = connection();

        f.worker
            .fetch("default", "SELECT", &conn, TtlPolicy::WorkerDefault, 1)
            .await
            .unwrap();
        f.worker
            .fetch("explicit", "SELECT", &conn, TtlPolicy::Seconds(30), 1)
            .await
            .unwrap();
        f.worker
            .fetch("forever", "SELECT", &conn, TtlPolicy::NoExpiration, 1)
            .await
            .unwrap();

        let default_ttl = f.store.metadata("default").await.unwrap().unwrap();
        let ttl = default_ttl.ttl_remaining.unwrap();
        assert!(ttl <= Duration::from_secs(120) && ttl > Duration::from_secs(110));

        let explicit = f.store.metadata("explicit").await.unwrap().unwrap();
        let ttl = explicit.ttl_remaining.unwrap();
        assert!(ttl <= Duration::from_secs(30) && ttl > Duration::from_secs(20));

        let forever = f.store.metadata("forever").await.unwrap().unwrap();
        assert!(forever.ttl_remaining.is_none());
    }

    #[tokio::test]
    async fn test_execution_failure_is_typed_and_writes_nothing() {
        let f = fixture(0, true);
        let err = f
            .worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, 10)
            .await
            .unwrap_err();

        assert!(err.is_execution());
        assert!(err.to_string().contains("relation does not exist"));
        assert!(!f.store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_permit_released_after_failure() {
        let f = fixture(0, true);
        let target = connection().target();

        for _ in 0..3 {
            assert!(
                f.worker
                    .fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, 10)
                    .await
                    .is_err()
            );
            assert_eq!(f.gate.available(&target), 1);
        }
    }

    #[tokio::test]
    async fn test_permit_released_after_success() {
        let f = fixture(3, false);
        f.worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, 10)
            .await
            .unwrap();
        assert_eq!(f.gate.available(&connection().target()), 1);
    }

    #[tokio::test]
    async fn test_gate_timeout_surfaces_as_fetch_error() {
        let f = fixture(3, false);
        let _held = f.gate.acquire(&connection().target()).await.unwrap();

        let err = f
            .worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, 10)
            .await
            .unwrap_err();

        assert!(err.is_gate());
        assert!(err.is_retryable());
        assert!(!f.store.exists("k").await.unwrap());
    }

    /// Store whose writes all end with the same scripted outcome.
    struct ScriptedStore {
        inner: InMemoryStore,
        put_outcome: fn() -> StoreResult<bool>,
    }

    #[async_trait]
    impl CacheStore for ScriptedStore {
        async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }
        async fn put(&self, _key: &str, _value: &[u8]) -> StoreResult<bool> {
            (self.put_outcome)()
        }
        async fn put_with_ttl(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: Duration,
        ) -> StoreResult<bool> {
            (self.put_outcome)()
        }
        async fn set_ttl(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
            self.inner.set_ttl(key, ttl).await
        }
        async fn delete(&self, key: &str) -> StoreResult<bool> {
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.inner.exists(key).await
        }
        async fn metadata(&self, key: &str) -> StoreResult<Option<EntryMeta>> {
            self.inner.metadata(key).await
        }
        async fn read_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
            self.inner.read_counters(names).await
        }
        async fn increment_counters(&self, names: &[String]) -> StoreResult<Vec<u64>> {
            self.inner.increment_counters(names).await
        }
        async fn health_check(&self) -> StoreResult<()> {
            Ok(())
        }
        async fn stats(&self) -> StoreStats {
            self.inner.stats().await
        }
    }

    fn worker_with_store(store: Arc<dyn CacheStore>) -> QueryWorker {
        QueryWorker::new(
            0,
            store,
            Arc::new(ConnectionGate::default()),
            Arc::new(FakeFactory::new(10, false)),
            WorkerConfig::new(),
        )
    }

    #[tokio::test]
    async fn test_oversized_payload_is_serialization_error() {
        let store = InMemoryStore::new().with_max_value_size(8);
        let worker = worker_with_store(Arc::new(store.clone()));

        let err = worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::NoExpiration, 10)
            .await
            .unwrap_err();
        assert!(err.is_serialization());
        assert!(!err.is_retryable());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_is_typed_and_retryable() {
        let store = ScriptedStore {
            inner: InMemoryStore::new(),
            put_outcome: || Err(StoreError::Connection("down".into())),
        };
        let worker = worker_with_store(Arc::new(store));

        for ttl in [TtlPolicy::NoExpiration, TtlPolicy::WorkerDefault] {
            let err = worker
                .fetch("k", "SELECT", &connection(), ttl, 10)
                .await
                .unwrap_err();
            assert!(err.is_store());
            assert!(err.is_retryable());
            assert!(err.to_string().contains("down"));
        }
    }

    #[tokio::test]
    async fn test_declined_store_write_returns_false() {
        let store = ScriptedStore {
            inner: InMemoryStore::new(),
            put_outcome: || Ok(false),
        };
        let worker = worker_with_store(Arc::new(store));

        let stored = worker
            .fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, 10)
            .await
            .unwrap();
        assert!(!stored);
    }

    #[tokio::test]
    async fn test_sources_reused_across_fetches() {
        let f = fixture(1, false);
        for key in ["a", "b", "c"] {
            f.worker
                .fetch(key, "SELECT", &connection(), TtlPolicy::WorkerDefault, 1)
                .await
                .unwrap();
        }
        assert_eq!(f.worker.sources().len(), 1);
    }
}
