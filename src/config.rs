//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::index::{IndexConf, IndexSet, StorageStrategy};
use crate::ingest::{Jitter, PoolConfig, RetryPolicy};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Indices in retrieval priority order
    #[serde(default = "default_indices", rename = "index")]
    pub indices: Vec<IndexEntry>,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Basic-auth password required on `/messages`
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

/// Backing store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Expiry of the recent buffers, reset on every write
    #[serde(default = "default_recent_ttl")]
    pub recent_ttl_secs: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_recent_ttl() -> u64 {
    600 // 10 minutes
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            recent_ttl_secs: default_recent_ttl(),
        }
    }
}

/// Worker pool and commit retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_jitter_min")]
    pub jitter_min_ms: u64,

    #[serde(default = "default_jitter_max")]
    pub jitter_max_ms: u64,
}

fn default_workers() -> usize {
    40
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    10
}

fn default_jitter_min() -> u64 {
    5
}

fn default_jitter_max() -> u64 {
    50
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            jitter_min_ms: default_jitter_min(),
            jitter_max_ms: default_jitter_max(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// One `[[index]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub key: String,

    #[serde(default = "default_max_size")]
    pub max_size: usize,

    #[serde(default = "default_index_ttl")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub split_values: bool,

    #[serde(default = "default_storage")]
    pub storage: Vec<StorageStrategy>,
}

fn default_max_size() -> usize {
    500
}

fn default_index_ttl() -> u64 {
    48 * 3600 // 48 hours
}

fn default_storage() -> Vec<StorageStrategy> {
    vec![StorageStrategy::Compacted]
}

fn default_indices() -> Vec<IndexEntry> {
    vec![IndexEntry {
        key: "request_id".to_string(),
        max_size: default_max_size(),
        ttl_secs: default_index_ttl(),
        split_values: true,
        storage: default_storage(),
    }]
}

impl IndexEntry {
    fn to_conf(&self) -> IndexConf {
        IndexConf::new(
            self.key.clone(),
            self.max_size,
            Duration::from_secs(self.ttl_secs),
        )
        .split_values(self.split_values)
        .storage(&self.storage)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `explicit` if given, else from default locations or
    /// environment
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_with_env(path)?;
            tracing::info!("Loaded config from {:?}", path);
            return Ok(config);
        }

        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("lvat").join("config.toml")),
            Some(PathBuf::from("/etc/lvat/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        match Self::load_first(&config_paths)? {
            Some(config) => Ok(config),
            None => {
                tracing::info!("Using default config with environment overrides");
                Ok(Self::from_env())
            }
        }
    }

    /// Load the first of `paths` that exists
    ///
    /// A file that exists but fails to load is an error; it never falls
    /// through to a later path or to the defaults.
    fn load_first(paths: &[PathBuf]) -> Result<Option<Self>, ConfigError> {
        let Some(path) = paths.iter().find(|p| p.exists()) else {
            return Ok(None);
        };

        let config = Self::load_with_env(path)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(Some(config))
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // API overrides
        if let Some(key) = var("API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(host) = var("LVAT_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Store overrides
        if let Some(url) = var("REDIS_URL").or_else(|| var("OPENREDIS_URL")) {
            self.store.redis_url = url;
        }

        // Ingest overrides
        if let Some(workers) = var("LVAT_WORKERS") {
            if let Ok(w) = workers.parse() {
                self.ingest.workers = w;
            }
        }

        // Logging overrides
        if var("VERBOSE").as_deref() == Some("true") {
            self.logging.level = "debug".to_string();
        }
        if let Some(level) = var("LVAT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LVAT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check everything the server needs before it starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Invalid("Need API_KEY".to_string()));
        }
        if self.store.redis_url.is_empty() {
            return Err(ConfigError::Invalid("Need REDIS_URL".to_string()));
        }
        if self.store.recent_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "store.recent_ttl_secs must be positive".to_string(),
            ));
        }
        if self.ingest.workers == 0 || self.ingest.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "ingest.workers and ingest.queue_capacity must be positive".to_string(),
            ));
        }
        if self.ingest.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "ingest.max_attempts must be positive".to_string(),
            ));
        }
        if self.ingest.jitter_min_ms > self.ingest.jitter_max_ms {
            return Err(ConfigError::Invalid(
                "ingest.jitter_min_ms exceeds ingest.jitter_max_ms".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "unknown log format '{}'",
                self.logging.format
            )));
        }

        self.index_set().map(|_| ())
    }

    /// The validated, ordered index list
    pub fn index_set(&self) -> Result<IndexSet, ConfigError> {
        IndexSet::new(self.indices.iter().map(IndexEntry::to_conf).collect())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.ingest.max_attempts,
            Jitter::Uniform {
                min: Duration::from_millis(self.ingest.jitter_min_ms),
                max: Duration::from_millis(self.ingest.jitter_max_ms),
            },
        )
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.ingest.workers,
            queue_capacity: self.ingest.queue_capacity,
        }
    }

    pub fn recent_ttl(&self) -> Duration {
        Duration::from_secs(self.store.recent_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
            indices: default_indices(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# lvat Configuration
#
# Environment variables override these settings:
# - API_KEY
# - PORT
# - REDIS_URL (or OPENREDIS_URL)
# - VERBOSE=true (debug logging)
# - LVAT_HOST
# - LVAT_WORKERS
# - LVAT_LOG_LEVEL
# - LVAT_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 5000

# Basic-auth password for /messages (prefer the API_KEY variable)
# api_key = ""

[store]
# Redis connection URL
redis_url = "redis://127.0.0.1:6379"

# Expiry of the recent buffers (seconds)
recent_ttl_secs = 600

[ingest]
# Concurrent ingest workers
workers = 40

# Batches waiting before POST /messages blocks
queue_capacity = 100

# Commit attempts per group before giving up
max_attempts = 10

# Random delay between conflicting commits (ms)
jitter_min_ms = 5
jitter_max_ms = 50

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Indices, in lookup priority order
[[index]]
key = "request_id"

# Recent buffer cap (lines)
max_size = 500

# Compacted history lifetime (seconds)
ttl_secs = 172800

# Index each comma-separated part of the value on its own
split_values = true

# Storage strategies: "compacted", "recent"
storage = ["compacted"]
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.ingest.workers, 40);
        assert_eq!(config.recent_ttl(), Duration::from_secs(600));

        let indices = config.index_set().unwrap();
        let conf = indices.get("request_id").unwrap();
        assert_eq!(conf.max_size, 500);
        assert_eq!(conf.ttl, Duration::from_secs(48 * 3600));
        assert!(conf.split_values);
        assert!(conf.uses(StorageStrategy::Compacted));
        assert!(!conf.uses(StorageStrategy::Recent));
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.store.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.indices.len(), 1);
        assert_eq!(config.index_set().unwrap().len(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[api]
port = 8080
api_key = "secret"

[ingest]
workers = 4

[[index]]
key = "request_id"
max_size = 10
ttl_secs = 60
storage = ["compacted", "recent"]

[[index]]
key = "user"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.pool_config().workers, 4);
        assert_eq!(config.pool_config().queue_capacity, 100);
        config.validate().unwrap();

        let set = config.index_set().unwrap();
        let keys: Vec<&str> = set.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["request_id", "user"]);
        assert_eq!(config.indices[0].storage.len(), 2);
        assert!(!config.indices[1].split_values);
    }

    fn index_file(key: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[index]]\nkey = \"{}\"\n", key).unwrap();
        file
    }

    #[test]
    fn test_load_first_skips_missing_paths() {
        let file = index_file("user");
        let paths = vec![
            PathBuf::from("/nonexistent/lvat/config.toml"),
            file.path().to_path_buf(),
        ];

        let config = Config::load_first(&paths).unwrap().unwrap();
        assert_eq!(config.indices[0].key, "user");
    }

    #[test]
    fn test_load_first_without_files() {
        let paths = vec![PathBuf::from("/nonexistent/lvat/config.toml")];
        assert!(Config::load_first(&paths).unwrap().is_none());
    }

    #[test]
    fn test_load_first_rejects_broken_file() {
        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "[[index]]\nkey = ").unwrap();
        let valid = index_file("user");
        let paths = vec![broken.path().to_path_buf(), valid.path().to_path_buf()];

        let err = Config::load_first(&paths).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == broken.path()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/lvat.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[api\nport = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("API_KEY", "k"),
            ("PORT", "9000"),
            ("OPENREDIS_URL", "redis://open:6379"),
            ("VERBOSE", "true"),
            ("LVAT_WORKERS", "8"),
        ]));

        assert_eq!(config.api.api_key.as_deref(), Some("k"));
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.store.redis_url, "redis://open:6379");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.ingest.workers, 8);
    }

    #[test]
    fn test_redis_url_takes_precedence() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("REDIS_URL", "redis://primary:6379"),
            ("OPENREDIS_URL", "redis://open:6379"),
        ]));
        assert_eq!(config.store.redis_url, "redis://primary:6379");
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.api.api_key = Some("k".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut base = Config::default();
        base.api.api_key = Some("k".to_string());

        let mut config = base.clone();
        config.ingest.workers = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.indices.clear();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.indices.push(config.indices[0].clone());
        assert!(config.validate().is_err());

        let mut config = base;
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
