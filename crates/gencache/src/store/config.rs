//! Cache store configuration types

use std::str::FromStr;

/// Default maximum value size: 16MB
pub const DEFAULT_MAX_VALUE_SIZE: usize = 16 * 1_048_576;

/// Default prefix applied to every key written by the Redis backend
pub const DEFAULT_KEY_PREFIX: &str = "gencache:";

/// Cache store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(crate::Error::Config(format!(
                "Unknown store backend '{other}' (expected memory or redis)"
            ))),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store backend type
    pub backend: StoreBackend,
    /// Redis connection URL (redis backend only)
    pub redis_url: Option<String>,
    /// Prefix for every stored key
    pub key_prefix: String,
    /// Maximum entries for the in-memory backend
    pub max_entries: Option<usize>,
    /// Maximum size of a single cached value in bytes
    pub max_value_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_entries: Some(100_000),
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_from_str_memory() {
        assert_eq!(
            "memory".parse::<StoreBackend>().unwrap(),
            StoreBackend::Memory
        );
        assert_eq!(
            "MEMORY".parse::<StoreBackend>().unwrap(),
            StoreBackend::Memory
        );
        assert_eq!("mem".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
    }

    #[test]
    fn test_store_backend_from_str_redis() {
        assert_eq!("redis".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert_eq!("Redis".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
    }

    #[test]
    fn test_store_backend_from_str_unknown_is_error() {
        let err = "memcached".parse::<StoreBackend>().unwrap_err();
        assert!(err.to_string().contains("memcached"));
    }

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert!(config.redis_url.is_none());
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.max_entries, Some(100_000));
        assert_eq!(config.max_value_size, DEFAULT_MAX_VALUE_SIZE);
    }
}
