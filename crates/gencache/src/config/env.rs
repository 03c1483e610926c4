//! Environment variable loading for configuration

use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;
use crate::store::StoreBackend;

/// Environment variable names
mod vars {
    pub const STORE_BACKEND: &str = "GENCACHE_STORE_BACKEND";
    pub const REDIS_URL: &str = "GENCACHE_REDIS_URL";
    pub const KEY_PREFIX: &str = "GENCACHE_KEY_PREFIX";
    pub const MAX_ENTRIES: &str = "GENCACHE_MAX_ENTRIES";
    pub const MAX_VALUE_SIZE: &str = "GENCACHE_MAX_VALUE_SIZE";
    pub const REFRESH_RETRIES: &str = "GENCACHE_REFRESH_RETRIES";
    pub const WORKERS: &str = "GENCACHE_WORKERS";
    pub const DEFAULT_TTL_SECS: &str = "GENCACHE_DEFAULT_TTL_SECS";
    pub const DEFAULT_ROW_LIMIT: &str = "GENCACHE_DEFAULT_ROW_LIMIT";
    pub const MAX_ROW_LIMIT: &str = "GENCACHE_MAX_ROW_LIMIT";
    pub const QUERY_TIMEOUT_SECS: &str = "GENCACHE_QUERY_TIMEOUT_SECS";
    pub const CONNECTION_POOL_SIZE: &str = "GENCACHE_CONNECTION_POOL_SIZE";
    pub const GATE_CAPACITY: &str = "GENCACHE_GATE_CAPACITY";
    pub const GATE_TIMEOUT_MS: &str = "GENCACHE_GATE_TIMEOUT_MS";
    pub const SERVICE_NAME: &str = "GENCACHE_SERVICE_NAME";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "GENCACHE_JSON_LOGS";
}

/// Serializes tests that mutate the process environment
#[cfg(test)]
pub(super) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn nonzero(name: &str) -> Option<NonZeroUsize> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .and_then(NonZeroUsize::new)
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Store
    if let Ok(backend) = env::var(vars::STORE_BACKEND) {
        builder = builder.store_backend(backend.parse::<StoreBackend>()?);
    }

    if let Ok(url_str) = env::var(vars::REDIS_URL) {
        let url = Url::parse(&url_str)
            .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", vars::REDIS_URL, e)))?;
        builder = builder.redis_url(url);
    }

    if let Ok(prefix) = env::var(vars::KEY_PREFIX) {
        builder = builder.key_prefix(prefix);
    }

    if let Ok(max_str) = env::var(vars::MAX_ENTRIES)
        && let Ok(max) = max_str.parse::<usize>()
    {
        builder = builder.max_entries((max > 0).then_some(max));
    }

    if let Ok(max_str) = env::var(vars::MAX_VALUE_SIZE)
        && let Ok(max) = max_str.parse::<usize>()
    {
        builder = builder.max_value_size(max);
    }

    // Key synthesizer
    if let Ok(retries_str) = env::var(vars::REFRESH_RETRIES)
        && let Ok(retries) = retries_str.parse::<u32>()
    {
        builder = builder.refresh_retries(retries);
    }

    // Workers
    if let Some(nz) = nonzero(vars::WORKERS) {
        builder = builder.workers(nz);
    }

    if let Ok(ttl_str) = env::var(vars::DEFAULT_TTL_SECS)
        && let Ok(secs) = ttl_str.parse::<u64>()
    {
        builder = builder.default_ttl(Duration::from_secs(secs));
    }

    if let Some(nz) = nonzero(vars::DEFAULT_ROW_LIMIT) {
        builder = builder.default_row_limit(nz);
    }

    if let Some(nz) = nonzero(vars::MAX_ROW_LIMIT) {
        builder = builder.max_row_limit(nz);
    }

    if let Ok(timeout_str) = env::var(vars::QUERY_TIMEOUT_SECS)
        && let Ok(secs) = timeout_str.parse::<u64>()
    {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }

    if let Some(nz) = nonzero(vars::CONNECTION_POOL_SIZE) {
        builder = builder.connection_pool_size(nz);
    }

    // Connection gate
    if let Some(nz) = nonzero(vars::GATE_CAPACITY) {
        builder = builder.gate_capacity(nz);
    }

    if let Ok(timeout_str) = env::var(vars::GATE_TIMEOUT_MS)
        && let Ok(ms) = timeout_str.parse::<u64>()
    {
        builder = builder.gate_timeout((ms > 0).then(|| Duration::from_millis(ms)));
    }

    // Telemetry
    if let Ok(name) = env::var(vars::SERVICE_NAME) {
        builder = builder.service_name(name);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
