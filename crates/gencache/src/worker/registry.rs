//! Per-worker cache of SQL sources keyed by connection identity

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::SourceError;
use super::source::{ConnectionInfo, SourceFactory, SqlSource};

/// Lazily created, reusable [`SqlSource`]s keyed by `(user, url, password)`.
///
/// The map lock is held while a source is created, so concurrent first use
/// of an identity creates exactly one source.
pub struct SourceRegistry {
    factory: Arc<dyn SourceFactory>,
    sources: Mutex<HashMap<ConnectionInfo, Arc<dyn SqlSource>>>,
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources.lock().len())
            .finish_non_exhaustive()
    }
}

impl SourceRegistry {
    pub fn new(factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            factory,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Source for `connection`, created on first use.
    pub fn get(&self, connection: &ConnectionInfo) -> Result<Arc<dyn SqlSource>, SourceError> {
        let mut sources = self.sources.lock();
        if let Some(source) = sources.get(connection) {
            return Ok(Arc::clone(source));
        }

        let source = self.factory.create(connection)?;
        tracing::debug!(
            source.target = %connection.target(),
            source.count = sources.len() + 1,
            "Created SQL source"
        );
        sources.insert(connection.clone(), Arc::clone(&source));
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.sources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.lock().is_empty()
    }

    /// Drop the source for `connection`; the next `get` recreates it.
    pub fn evict(&self, connection: &ConnectionInfo) -> bool {
        self.sources.lock().remove(connection).is_some()
    }

    /// Drop every cached source.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.sources.lock());
        tracing::debug!(source.count = dropped.len(), "Cleared SQL sources");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::worker::source::RowSet;

    struct EmptySource;

    #[async_trait]
    impl SqlSource for EmptySource {
        async fn query(&self, _sql: &str, _row_limit: usize) -> Result<RowSet, SourceError> {
            Ok(RowSet::default())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl SourceFactory for CountingFactory {
        fn create(&self, _connection: &ConnectionInfo) -> Result<Arc<dyn SqlSource>, SourceError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EmptySource))
        }
    }

    struct FailingFactory;

    impl SourceFactory for FailingFactory {
        fn create(&self, _connection: &ConnectionInfo) -> Result<Arc<dyn SqlSource>, SourceError> {
            Err(SourceError::Connection("bad url".into()))
        }
    }

    fn info(user: &str) -> ConnectionInfo {
        ConnectionInfo::new("hdbsql://db:30015", user, "secret")
    }

    #[test]
    fn test_reuses_source_per_identity() {
        let factory = Arc::new(CountingFactory::default());
        let registry = SourceRegistry::new(Arc::clone(&factory) as Arc<dyn SourceFactory>);

        let a1 = registry.get(&info("a")).unwrap();
        let a2 = registry.get(&info("a")).unwrap();
        registry.get(&info("b")).unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_first_use_creates_once() {
        let factory = Arc::new(CountingFactory::default());
        let registry = Arc::new(SourceRegistry::new(
            Arc::clone(&factory) as Arc<dyn SourceFactory>
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get(&info("shared")).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_evict_and_clear() {
        let factory = Arc::new(CountingFactory::default());
        let registry = SourceRegistry::new(Arc::clone(&factory) as Arc<dyn SourceFactory>);

        registry.get(&info("a")).unwrap();
        registry.get(&info("b")).unwrap();

        assert!(registry.evict(&info("a")));
        assert!(!registry.evict(&info("a")));
        assert_eq!(registry.len(), 1);

        registry.get(&info("a")).unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 3);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_factory_error_not_cached() {
        let registry = SourceRegistry::new(Arc::new(FailingFactory));
        assert!(registry.get(&info("a")).is_err());
        assert!(registry.is_empty());
    }
}
