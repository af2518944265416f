//! Retrieval
//!
//! Resolves a value to its stored history by walking the configured indices
//! in priority order. The compacted blob is returned as stored (gzip); the
//! caller decides whether to decompress it.

use std::sync::Arc;

use crate::index::{build_key, build_key_compressed, IndexSet, StorageStrategy};
use crate::storage::{OptimisticStore, StoreResult};

/// A compacted blob found for a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactedHit {
    /// Index the value matched under
    pub index: String,
    /// Store key holding the blob
    pub key: String,
    /// Gzip bytes
    pub blob: Vec<u8>,
}

/// Read side over the same indices and store the workers write to
#[derive(Clone)]
pub struct Retriever {
    indices: Arc<IndexSet>,
    store: Arc<dyn OptimisticStore>,
}

impl Retriever {
    pub fn new(indices: Arc<IndexSet>, store: Arc<dyn OptimisticStore>) -> Self {
        Self { indices, store }
    }

    /// First compacted blob for `value`, in index order
    ///
    /// A store error aborts the walk; later indices are not consulted.
    pub async fn find(&self, value: &str) -> StoreResult<Option<CompactedHit>> {
        for conf in self.indices.iter() {
            if !conf.uses(StorageStrategy::Compacted) {
                continue;
            }

            let key = build_key_compressed(&conf.key, value);
            match self.store.get(&key).await? {
                Some(blob) if !blob.is_empty() => {
                    tracing::debug!(index = %conf.key, value, bytes = blob.len(), "Lookup hit");
                    return Ok(Some(CompactedHit {
                        index: conf.key.clone(),
                        key,
                        blob,
                    }));
                }
                _ => continue,
            }
        }

        tracing::debug!(value, "Lookup miss");
        Ok(None)
    }

    /// Gzip history for `value`, if any index holds one
    pub async fn lookup(&self, value: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.find(value).await?.map(|hit| hit.blob))
    }

    /// Recent lines for `value`, newest first, from the first index that
    /// keeps a non-empty recent buffer for it
    pub async fn recent(&self, value: &str) -> StoreResult<Option<Vec<Vec<u8>>>> {
        for conf in self.indices.iter() {
            if !conf.uses(StorageStrategy::Recent) {
                continue;
            }

            let key = build_key(&conf.key, value);
            let stop = conf.max_size.saturating_sub(1) as isize;
            let lines = self.store.list_range(&key, 0, stop).await?;
            if !lines.is_empty() {
                return Ok(Some(lines));
            }
        }

        Ok(None)
    }
}
