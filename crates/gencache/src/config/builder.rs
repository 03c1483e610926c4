//! Configuration builder

use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::Error;
use crate::gate::{DEFAULT_GATE_CAPACITY, GateConfig};
use crate::keys::KeyConfig;
use crate::store::{
    DEFAULT_KEY_PREFIX, DEFAULT_MAX_VALUE_SIZE, SERVICE_NAME, StoreBackend, StoreConfig,
};
use crate::worker::WorkerConfig;

/// Default maximum entries for the in-memory store
const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Cache layer configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub keys: KeyConfig,
    pub worker: WorkerConfig,
    pub gate: GateConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn store(&self) -> &StoreConfig {
        &self.store
    }

    #[must_use]
    pub const fn keys(&self) -> &KeyConfig {
        &self.keys
    }

    #[must_use]
    pub const fn worker(&self) -> &WorkerConfig {
        &self.worker
    }

    #[must_use]
    pub const fn gate(&self) -> &GateConfig {
        &self.gate
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    store_backend: StoreBackend,
    redis_url: Option<Url>,
    key_prefix: Option<String>,
    max_entries: Option<usize>,
    max_value_size: usize,
    keys: KeyConfig,
    worker: WorkerConfig,
    gate: GateConfig,
    telemetry: TelemetryConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            redis_url: None,
            key_prefix: None,
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            keys: KeyConfig::new(),
            worker: WorkerConfig::new(),
            gate: GateConfig {
                capacity: DEFAULT_GATE_CAPACITY,
                acquire_timeout: None,
            },
            telemetry: TelemetryConfig {
                service_name: String::new(),
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    // Store

    #[must_use]
    pub const fn store_backend(mut self, backend: StoreBackend) -> Self {
        self.store_backend = backend;
        self
    }

    #[must_use]
    pub fn redis_url(mut self, url: Url) -> Self {
        self.redis_url = Some(url);
        self
    }

    #[must_use]
    pub fn key_prefix(mut self, prefix: String) -> Self {
        self.key_prefix = Some(prefix);
        self
    }

    /// Maximum in-memory entries, `None` for unbounded
    #[must_use]
    pub const fn max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self
    }

    #[must_use]
    pub const fn max_value_size(mut self, max: usize) -> Self {
        self.max_value_size = max;
        self
    }

    // Key synthesizer

    #[must_use]
    pub const fn refresh_retries(mut self, retries: u32) -> Self {
        self.keys.refresh_retries = retries;
        self
    }

    #[must_use]
    pub const fn refresh_backoff(mut self, backoff: Duration) -> Self {
        self.keys.refresh_backoff = backoff;
        self
    }

    // Workers

    #[must_use]
    pub const fn workers(mut self, workers: NonZeroUsize) -> Self {
        self.worker.workers = workers.get();
        self
    }

    #[must_use]
    pub const fn default_ttl(mut self, ttl: Duration) -> Self {
        self.worker.default_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn default_row_limit(mut self, limit: NonZeroUsize) -> Self {
        self.worker.default_row_limit = limit.get();
        self
    }

    #[must_use]
    pub const fn max_row_limit(mut self, limit: NonZeroUsize) -> Self {
        self.worker.max_row_limit = limit.get();
        self
    }

    #[must_use]
    pub const fn query_timeout(mut self, timeout: Duration) -> Self {
        self.worker.query_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn connection_pool_size(mut self, size: NonZeroUsize) -> Self {
        self.worker.connection_pool_size = size.get();
        self
    }

    // Connection gate

    #[must_use]
    pub const fn gate_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.gate.capacity = capacity.get();
        self
    }

    #[must_use]
    pub const fn gate_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.gate.acquire_timeout = timeout;
        self
    }

    // Telemetry

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        if self.store_backend == StoreBackend::Redis && self.redis_url.is_none() {
            return Err(Error::Config(
                "redis_url is required for the redis store backend".into(),
            ));
        }

        if self.max_value_size == 0 {
            return Err(Error::Config("max_value_size must be positive".into()));
        }

        if self.worker.default_row_limit > self.worker.max_row_limit {
            return Err(Error::Config(format!(
                "default_row_limit ({}) exceeds max_row_limit ({})",
                self.worker.default_row_limit, self.worker.max_row_limit
            )));
        }

        let service_name = if self.telemetry.service_name.is_empty() {
            SERVICE_NAME.to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            store: StoreConfig {
                backend: self.store_backend,
                redis_url: self.redis_url.map(String::from),
                key_prefix: self
                    .key_prefix
                    .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
                max_entries: self.max_entries,
                max_value_size: self.max_value_size,
            },
            keys: self.keys,
            worker: self.worker,
            gate: self.gate,
            telemetry: TelemetryConfig {
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }
}
