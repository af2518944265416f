//! Index definitions
//!
//! An [`IndexConf`] names a log field to index on and the retention policy
//! for the two stored representations. An [`IndexSet`] is the validated,
//! ordered list of them; its order is the retrieval priority.

use serde::Deserialize;
use std::time::Duration;

use crate::config::ConfigError;

/// Storage strategy an index writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStrategy {
    /// Gzip history blob, the system of record
    Compacted,
    /// Capped most-recent-first list
    Recent,
}

/// One index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConf {
    /// Field name to index on
    pub key: String,
    /// Maximum number of lines kept in the recent buffer
    pub max_size: usize,
    /// Lifetime of the compacted blob, refreshed on every append
    pub ttl: Duration,
    /// Treat a comma-separated value as several independent values
    pub split_values: bool,
    /// Enabled storage strategies
    pub storage: Vec<StorageStrategy>,
}

impl IndexConf {
    /// New index writing only the compacted blob, without value splitting
    pub fn new(key: impl Into<String>, max_size: usize, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            max_size,
            ttl,
            split_values: false,
            storage: vec![StorageStrategy::Compacted],
        }
    }

    /// Builder: enable or disable comma splitting
    pub fn split_values(mut self, split: bool) -> Self {
        self.split_values = split;
        self
    }

    /// Builder: replace the enabled strategies
    pub fn storage(mut self, strategies: &[StorageStrategy]) -> Self {
        self.storage = strategies.to_vec();
        self
    }

    /// Whether `strategy` is enabled on this index
    pub fn uses(&self, strategy: StorageStrategy) -> bool {
        self.storage.contains(&strategy)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::Invalid("index key cannot be empty".to_string()));
        }
        if self.max_size == 0 {
            return Err(ConfigError::Invalid(format!(
                "index '{}': max_size must be positive",
                self.key
            )));
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "index '{}': ttl must be positive",
                self.key
            )));
        }
        Ok(())
    }
}

/// Ordered, validated list of index definitions
#[derive(Debug, Clone)]
pub struct IndexSet {
    confs: Vec<IndexConf>,
}

impl IndexSet {
    /// Validate and wrap `confs`; order is kept as given
    pub fn new(confs: Vec<IndexConf>) -> Result<Self, ConfigError> {
        if confs.is_empty() {
            return Err(ConfigError::Invalid("at least one index is required".to_string()));
        }

        for (i, conf) in confs.iter().enumerate() {
            conf.validate()?;
            if confs[..i].iter().any(|c| c.key == conf.key) {
                return Err(ConfigError::Invalid(format!(
                    "index '{}' is defined twice",
                    conf.key
                )));
            }
        }

        Ok(Self { confs })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexConf> {
        self.confs.iter()
    }

    pub fn len(&self) -> usize {
        self.confs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confs.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&IndexConf> {
        self.confs.iter().find(|c| c.key == key)
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = &'a IndexConf;
    type IntoIter = std::slice::Iter<'a, IndexConf>;

    fn into_iter(self) -> Self::IntoIter {
        self.confs.iter()
    }
}
