use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::config::WorkerConfig;
use super::error::FetchError;
use super::query::QueryWorker;
use super::source::{ConnectionInfo, SourceFactory};
use super::ttl::TtlPolicy;
use crate::gate::ConnectionGate;
use crate::store::CacheStore;

/// Fixed set of [`QueryWorker`]s sharing one store and one connection gate.
///
/// Requests are dispatched round-robin. Each worker keeps its own source
/// registry; the gate bounds connections across all of them.
pub struct WorkerPool {
    workers: Vec<QueryWorker>,
    next: AtomicUsize,
    gate: Arc<ConnectionGate>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn CacheStore>,
        gate: Arc<ConnectionGate>,
        factory: Arc<dyn SourceFactory>,
        config: WorkerConfig,
    ) -> Self {
        let workers = (0..config.workers.max(1))
            .map(|id| {
                QueryWorker::new(
                    id,
                    Arc::clone(&store),
                    Arc::clone(&gate),
                    Arc::clone(&factory),
                    config,
                )
            })
            .collect();

        tracing::info!(
            workers = config.workers.max(1),
            gate.capacity = gate.capacity(),
            "Query worker pool started"
        );

        Self {
            workers,
            next: AtomicUsize::new(0),
            gate,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    #[must_use]
    pub const fn gate(&self) -> &Arc<ConnectionGate> {
        &self.gate
    }

    /// Next worker in round-robin order
    pub fn worker(&self) -> &QueryWorker {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[idx]
    }

    /// Dispatch a fetch to the next worker. See [`QueryWorker::fetch`].
    pub async fn fetch(
        &self,
        key: &str,
        sql: &str,
        connection: &ConnectionInfo,
        ttl: TtlPolicy,
        row_limit: i64,
    ) -> Result<bool, FetchError> {
        self.worker()
            .fetch(key, sql, connection, ttl, row_limit)
            .await
    }

    /// Drop the cached source for `connection` on every worker.
    pub fn evict(&self, connection: &ConnectionInfo) -> usize {
        self.workers
            .iter()
            .filter(|w| w.sources().evict(connection))
            .count()
    }

    /// Drop all cached sources and close the connection gate.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.sources().clear();
        }
        self.gate.close();
        tracing::info!("Query worker pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::gate::GateConfig;
    use crate::store::InMemoryStore;
    use crate::worker::query::tests::{FakeFactory, connection};

    fn pool(workers: usize) -> (WorkerPool, InMemoryStore) {
        let store = InMemoryStore::new();
        let config = WorkerConfig {
            workers,
            ..WorkerConfig::new()
        };
        let pool = WorkerPool::new(
            Arc::new(store.clone()),
            Arc::new(ConnectionGate::new(GateConfig::default())),
            Arc::new(FakeFactory::new(3, false)),
            config,
        );
        (pool, store)
    }

    #[test]
    fn test_round_robin_dispatch() {
        let (pool, _) = pool(3);
        let ids: Vec<usize> = (0..6).map(|_| pool.worker().id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let (pool, _) = pool(0);
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_through_pool() {
        let (pool, store) = pool(2);
        assert!(
            pool.fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, -1)
                .await
                .unwrap()
        );
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_each_worker_owns_its_sources() {
        let (pool, _) = pool(2);
        for key in ["a", "b"] {
            pool.fetch(key, "SELECT", &connection(), TtlPolicy::WorkerDefault, 1)
                .await
                .unwrap();
        }

        assert_eq!(pool.evict(&connection()), 2);
        assert_eq!(pool.evict(&connection()), 0);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_gate() {
        let (pool, store) = pool(4);
        let pool = Arc::new(pool);
        let mut handles = Vec::new();

        for i in 0..16 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let key = format!("k-{i}");
                pool.fetch(&key, "SELECT", &connection(), TtlPolicy::WorkerDefault, 1)
                    .await
                    .unwrap();
                key
            }));
        }

        let mut keys = HashSet::new();
        for handle in handles {
            keys.insert(handle.await.unwrap());
        }
        for key in &keys {
            assert!(store.exists(key).await.unwrap());
        }
        assert_eq!(pool.gate().available(&connection().target()), 8);
    }

    #[tokio::test]
    async fn test_shutdown_closes_gate() {
        let (pool, _) = pool(1);
        pool.shutdown();

        let err = pool
            .fetch("k", "SELECT", &connection(), TtlPolicy::WorkerDefault, 1)
            .await
            .unwrap_err();
        assert!(err.is_gate());
    }
}
