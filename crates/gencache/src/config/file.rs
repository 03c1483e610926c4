//! TOML configuration file loading

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;
use crate::store::StoreBackend;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./gencache.toml",
    "~/.config/gencache/config.toml",
    "/etc/gencache/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(store) = config.store {
        if let Some(backend) = store.backend {
            builder = builder.store_backend(backend.parse::<StoreBackend>()?);
        }

        if let Some(url_str) = store.redis_url {
            let url = Url::parse(&url_str)
                .map_err(|e| crate::Error::Config(format!("Invalid redis URL: {e}")))?;
            builder = builder.redis_url(url);
        }

        if let Some(prefix) = store.key_prefix {
            builder = builder.key_prefix(prefix);
        }

        // 0 means unbounded
        if let Some(max) = store.max_entries {
            builder = builder.max_entries((max > 0).then_some(max));
        }

        if let Some(max) = store.max_value_size {
            builder = builder.max_value_size(max);
        }
    }

    if let Some(keys) = config.keys {
        if let Some(retries) = keys.refresh_retries {
            builder = builder.refresh_retries(retries);
        }

        if let Some(ms) = keys.refresh_backoff_ms {
            builder = builder.refresh_backoff(Duration::from_millis(ms));
        }
    }

    if let Some(worker) = config.worker {
        if let Some(nz) = worker.workers.and_then(NonZeroUsize::new) {
            builder = builder.workers(nz);
        }

        if let Some(secs) = worker.default_ttl_secs {
            builder = builder.default_ttl(Duration::from_secs(secs));
        }

        if let Some(nz) = worker.default_row_limit.and_then(NonZeroUsize::new) {
            builder = builder.default_row_limit(nz);
        }

        if let Some(nz) = worker.max_row_limit.and_then(NonZeroUsize::new) {
            builder = builder.max_row_limit(nz);
        }

        if let Some(secs) = worker.query_timeout_secs {
            builder = builder.query_timeout(Duration::from_secs(secs));
        }

        if let Some(nz) = worker.connection_pool_size.and_then(NonZeroUsize::new) {
            builder = builder.connection_pool_size(nz);
        }
    }

    if let Some(gate) = config.gate {
        if let Some(nz) = gate.capacity.and_then(NonZeroUsize::new) {
            builder = builder.gate_capacity(nz);
        }

        if let Some(ms) = gate.acquire_timeout_ms {
            builder = builder.gate_timeout((ms > 0).then(|| Duration::from_millis(ms)));
        }
    }

    if let Some(telemetry) = config.telemetry {
        if let Some(name) = telemetry.service_name {
            builder = builder.service_name(name);
        }

        if let Some(level) = telemetry.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = telemetry.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    store: Option<StoreFileConfig>,
    keys: Option<KeysFileConfig>,
    worker: Option<WorkerFileConfig>,
    gate: Option<GateFileConfig>,
    telemetry: Option<TelemetryFileConfig>,
}

#[derive(Debug, Deserialize)]
struct StoreFileConfig {
    backend: Option<String>,
    redis_url: Option<String>,
    key_prefix: Option<String>,
    max_entries: Option<usize>,
    max_value_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct KeysFileConfig {
    refresh_retries: Option<u32>,
    refresh_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WorkerFileConfig {
    workers: Option<usize>,
    default_ttl_secs: Option<u64>,
    default_row_limit: Option<usize>,
    max_row_limit: Option<usize>,
    query_timeout_secs: Option<u64>,
    connection_pool_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GateFileConfig {
    capacity: Option<usize>,
    acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelemetryFileConfig {
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[store]
backend = "redis"
redis_url = "redis://localhost:6379"
key_prefix = "analytics:"
max_entries = 5000
max_value_size = 1048576

[keys]
refresh_retries = 5
refresh_backoff_ms = 10

[worker]
workers = 8
default_ttl_secs = 600
default_row_limit = 500
max_row_limit = 5000
query_timeout_secs = 60
connection_pool_size = 2

[gate]
capacity = 16
acquire_timeout_ms = 2500

[telemetry]
service_name = "cache-node"
log_level = "debug"
json_logs = true
"#;

        let config: FileConfig = toml::from_str(toml_content).unwrap();

        let store = config.store.unwrap();
        assert_eq!(store.backend.as_deref(), Some("redis"));
        assert_eq!(store.max_entries, Some(5000));

        let worker = config.worker.unwrap();
        assert_eq!(worker.workers, Some(8));
        assert_eq!(worker.default_ttl_secs, Some(600));

        assert_eq!(config.gate.unwrap().capacity, Some(16));
        assert_eq!(config.keys.unwrap().refresh_retries, Some(5));
        assert_eq!(config.telemetry.unwrap().json_logs, Some(true));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: FileConfig = toml::from_str("[gate]\ncapacity = 2\n").unwrap();
        assert!(config.gate.is_some());
        assert!(config.store.is_none());
        assert!(config.worker.is_none());
    }

    #[test]
    fn test_load_from_file_success() {
        let toml_content = r#"
[store]
backend = "redis"
redis_url = "redis://cache:6379"

[worker]
workers = 2
default_row_limit = 100
max_row_limit = 1000

[gate]
capacity = 3
acquire_timeout_ms = 250
"#;
        let temp_file = create_temp_config(toml_content);

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.worker.workers, 2);
        assert_eq!(config.worker.default_row_limit, 100);
        assert_eq!(config.worker.max_row_limit, 1000);
        assert_eq!(config.gate.capacity, 3);
        assert_eq!(config.gate.acquire_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_values_keep_defaults() {
        let toml_content = r#"
[store]
max_entries = 0

[worker]
workers = 0

[gate]
capacity = 0
acquire_timeout_ms = 0
"#;
        let temp_file = create_temp_config(toml_content);

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        assert!(config.store.max_entries.is_none());
        assert_eq!(config.worker.workers, 4);
        assert_eq!(config.gate.capacity, 8);
        assert!(config.gate.acquire_timeout.is_none());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(
            Path::new("/nonexistent/path/config.toml"),
            ConfigBuilder::new(),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let temp_file = create_temp_config("this is not valid toml {{{{");

        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_from_file_invalid_redis_url() {
        let temp_file = create_temp_config("[store]\nredis_url = \"not a valid url\"\n");

        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("Invalid redis URL"));
    }

    #[test]
    fn test_load_from_file_unknown_backend() {
        let temp_file = create_temp_config("[store]\nbackend = \"memcached\"\n");

        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("memcached"));
    }

    #[test]
    fn test_load_telemetry_config() {
        let toml_content = r#"
[telemetry]
service_name = "my-cache"
log_level = "trace"
json_logs = true
"#;
        let temp_file = create_temp_config(toml_content);

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.telemetry.service_name, "my-cache");
        assert_eq!(config.telemetry.log_level, "trace");
        assert!(config.telemetry.json_logs);
    }

    #[test]
    fn test_find_config_file_returns_existing_path() {
        if let Some(path) = find_config_file() {
            assert!(path.exists());
        }
    }
}
