//! Key synthesizer: logical computation + dependencies -> generational key

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use super::config::KeyConfig;
use super::generational::{DepGen, GenerationalKey};
use crate::store::{CacheStore, StoreError};
use crate::{Error, Result};

type KeySlot = Arc<AsyncMutex<Option<GenerationalKey>>>;

/// Produces generational keys and bumps dependency generations.
///
/// Each logical name has its own async mutex, so calls for the same
/// logical name are serialized (snapshot read, comparison and version bump
/// form one critical section) while calls for different logical names run
/// concurrently. The registry map itself is only locked long enough to
/// look up or insert a slot.
///
/// The registry keeps one slot per logical name ever requested and never
/// evicts on its own. Callers that generate unbounded logical names must
/// release them with [`KeySynthesizer::forget`].
pub struct KeySynthesizer {
    store: Arc<dyn CacheStore>,
    registry: Mutex<HashMap<String, KeySlot>>,
    config: KeyConfig,
}

impl fmt::Debug for KeySynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySynthesizer")
            .field("store", &"<CacheStore>")
            .field("registered", &self.registry.lock().len())
            .field("config", &self.config)
            .finish()
    }
}

impl KeySynthesizer {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_config(store, KeyConfig::default())
    }

    pub fn with_config(store: Arc<dyn CacheStore>, config: KeyConfig) -> Self {
        Self {
            store,
            registry: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The store generations are read from and bumped in
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    fn slot(&self, logical_name: &str) -> KeySlot {
        let mut registry = self.registry.lock();
        Arc::clone(
            registry
                .entry(logical_name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
        )
    }

    async fn snapshot(&self, dependencies: &[String]) -> Result<DepGen> {
        if dependencies.is_empty() {
            return Ok(DepGen::new());
        }

        let generations = self.store.read_counters(dependencies).await?;
        if generations.len() != dependencies.len() {
            return Err(StoreError::Other(format!(
                "expected {} generations, store returned {}",
                dependencies.len(),
                generations.len()
            ))
            .into());
        }

        Ok(dependencies.iter().cloned().zip(generations).collect())
    }

    /// Get or refresh the generational key for `logical_name`.
    ///
    /// Reads the current generation of every dependency. A key whose stored
    /// snapshot differs (changed generation, added or removed name) gets a
    /// new version and the fresh snapshot. Store errors are returned as-is;
    /// the registered key is left untouched in that case.
    pub async fn get_key(
        &self,
        logical_name: &str,
        dependencies: &[String],
    ) -> Result<GenerationalKey> {
        if logical_name.is_empty() {
            return Err(Error::InvalidKey("logical name must not be empty".into()));
        }

        let slot = self.slot(logical_name);
        let mut guard = slot.lock().await;

        let snapshot = self.snapshot(dependencies).await?;

        let key = if let Some(key) = guard.as_mut() {
            if key.is_stale(&snapshot) {
                key.advance(snapshot);
                tracing::debug!(
                    key.logical_name = logical_name,
                    key.version = key.version(),
                    key.storage = %key,
                    "Dependency snapshot changed, minted new key version"
                );
            }
            key.clone()
        } else {
            let key = GenerationalKey::new(logical_name, snapshot);
            tracing::debug!(
                key.logical_name = logical_name,
                key.storage = %key,
                key.dependencies = key.dep_gen().len(),
                "Registered generational key"
            );
            *guard = Some(key.clone());
            key
        };

        Ok(key)
    }

    /// Currently registered key for `logical_name`, without consulting the store.
    pub async fn peek(&self, logical_name: &str) -> Option<GenerationalKey> {
        let slot = self.registry.lock().get(logical_name).cloned()?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Drop the registered key; the next `get_key` mints a new unique id.
    ///
    /// This is the only way a slot leaves the registry. Returns whether a key
    /// was registered.
    pub fn forget(&self, logical_name: &str) -> bool {
        self.registry.lock().remove(logical_name).is_some()
    }

    /// Number of registered logical names
    pub fn registered(&self) -> usize {
        self.registry.lock().len()
    }

    /// Current generation of a single dependency
    pub async fn generation(&self, dependency: &str) -> Result<u64> {
        let generations = self
            .store
            .read_counters(std::slice::from_ref(&dependency.to_string()))
            .await?;
        Ok(generations.first().copied().unwrap_or(0))
    }

    /// Bump the generation of every dependency in `dependencies` as one batch.
    ///
    /// Retryable store errors are retried for the whole batch up to
    /// `refresh_retries` times. A retried batch may bump a name twice, which
    /// only over-invalidates.
    pub async fn try_refresh(&self, dependencies: &[String]) -> Result<()> {
        let batch: Vec<String> = dependencies
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if batch.is_empty() {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.store.increment_counters(&batch).await {
                Ok(generations) => {
                    tracing::debug!(
                        refresh.names = ?batch,
                        refresh.generations = ?generations,
                        refresh.attempt = attempt,
                        "Bumped dependency generations"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.config.refresh_retries => {
                    attempt += 1;
                    tracing::warn!(
                        refresh.count = batch.len(),
                        refresh.attempt = attempt,
                        error = %e,
                        "Generation bump failed, retrying batch"
                    );
                    tokio::time::sleep(self.config.refresh_backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Bump every dependency in `dependencies`; `true` if the batch was applied.
    pub async fn refresh(&self, dependencies: &[String]) -> bool {
        match self.try_refresh(dependencies).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    refresh.names = ?dependencies,
                    error = %e,
                    "Generation bump failed, dependent cache entries may be stale"
                );
                false
            }
        }
    }
}
