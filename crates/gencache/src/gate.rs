//! Per-target connection gate
//!
//! Bounds how many live connections may be open concurrently against one
//! backing database. A [`GatePermit`] returns its slot when dropped, so a
//! permit is released on every exit path including errors and panics.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent connections per target
pub const DEFAULT_GATE_CAPACITY: usize = 8;

/// Connection gate errors
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Timed out after {waited:?} waiting for a connection slot on {target}")]
    Timeout { target: String, waited: Duration },

    #[error("Connection gate for {target} is closed")]
    Closed { target: String },
}

impl GateError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// Connection gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Concurrent permits per target
    pub capacity: usize,
    /// Maximum wait for a permit, `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_GATE_CAPACITY,
            acquire_timeout: None,
        }
    }
}

/// Held connection slot for one target
pub struct GatePermit {
    target: String,
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Return the slot now rather than at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePermit")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        tracing::trace!(gate.target = %self.target, "Released connection slot");
    }
}

/// Bounded semaphore per backing database target.
///
/// Semaphores are created lazily on first acquisition and live until
/// [`close`](Self::close) is called. The gate does not check connection
/// health.
pub struct ConnectionGate {
    config: GateConfig,
    targets: Mutex<HashMap<String, Arc<Semaphore>>>,
    closed: AtomicBool,
}

impl fmt::Debug for ConnectionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionGate")
            .field("config", &self.config)
            .field("targets", &self.targets.lock().len())
            .finish()
    }
}

impl Default for ConnectionGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

impl ConnectionGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            config: GateConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            targets: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.capacity
    }

    fn semaphore(&self, target: &str) -> Arc<Semaphore> {
        let mut targets = self.targets.lock();
        Arc::clone(
            targets
                .entry(target.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.capacity))),
        )
    }

    /// Wait for a slot on `target`, honoring the configured acquire timeout.
    pub async fn acquire(&self, target: &str) -> Result<GatePermit, GateError> {
        match self.config.acquire_timeout {
            Some(timeout) => self.acquire_timeout(target, timeout).await,
            None => self.acquire_blocking(target).await,
        }
    }

    /// Wait for a slot on `target` without a time limit.
    pub async fn acquire_blocking(&self, target: &str) -> Result<GatePermit, GateError> {
        if self.is_closed() {
            return Err(GateError::Closed {
                target: target.to_string(),
            });
        }

        let semaphore = self.semaphore(target);
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed {
                target: target.to_string(),
            })?;

        tracing::trace!(gate.target = target, "Acquired connection slot");
        Ok(GatePermit {
            target: target.to_string(),
            _permit: permit,
        })
    }

    /// Wait at most `timeout` for a slot on `target`.
    pub async fn acquire_timeout(
        &self,
        target: &str,
        timeout: Duration,
    ) -> Result<GatePermit, GateError> {
        tokio::time::timeout(timeout, self.acquire_blocking(target))
            .await
            .map_err(|_| {
                tracing::warn!(
                    gate.target = target,
                    gate.waited = ?timeout,
                    "Connection slot wait timed out"
                );
                GateError::Timeout {
                    target: target.to_string(),
                    waited: timeout,
                }
            })?
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Free slots on `target`
    pub fn available(&self, target: &str) -> usize {
        self.targets
            .lock()
            .get(target)
            .map_or(self.config.capacity, |s| s.available_permits())
    }

    /// Close every target; pending and future acquisitions fail with
    /// [`GateError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let targets = std::mem::take(&mut *self.targets.lock());
        for semaphore in targets.values() {
            semaphore.close();
        }
        tracing::debug!(gate.targets = targets.len(), "Closed connection gate");
    }
}
