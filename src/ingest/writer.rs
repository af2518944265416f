//! Index writers
//!
//! One [`IndexWriter`] per storage strategy:
//!
//! - [`CompactedWriter`] appends to the gzip history blob with an optimistic
//!   watch/read/commit loop, retrying lost races with jittered backoff.
//! - [`RecentBufferWriter`] pushes onto the capped recent list in a single
//!   atomic unit.
//!
//! [`IndexWriters`] routes a group to every strategy enabled on its index.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::index::{build_key, build_key_compressed, IndexConf, StorageStrategy};
use crate::ingest::backoff::RetryPolicy;
use crate::storage::compression::append_lines;
use crate::storage::{CommitOutcome, Operation, OptimisticStore, StoreError};

/// Default lifetime of a recent buffer, refreshed on every push
pub const DEFAULT_RECENT_TTL: Duration = Duration::from_secs(600);

/// Errors from writing one group
#[derive(Error, Debug)]
pub enum WriteError {
    /// Every attempt lost its commit race
    #[error("Gave up on {key} after {attempts} conflicting commits")]
    Conflict { key: String, attempts: u32 },

    /// Store failure or corrupt stored data; not retried
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WriteError {
    /// Whether trying the same write again later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            WriteError::Conflict { .. } => true,
            WriteError::Store(StoreError::Corrupt { .. }) => false,
            WriteError::Store(e) => e.is_connection(),
        }
    }
}

/// Result type for writer operations
pub type WriteResult<T> = Result<T, WriteError>;

/// A storage strategy for grouped lines
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Strategy this writer implements
    fn strategy(&self) -> StorageStrategy;

    /// Persist `lines` (in order) under (`conf`, `value`)
    async fn write(&self, conf: &IndexConf, value: &str, lines: &[&[u8]]) -> WriteResult<()>;
}

/// Appends lines to the compacted gzip blob
pub struct CompactedWriter {
    store: Arc<dyn OptimisticStore>,
    retry: RetryPolicy,
}

impl CompactedWriter {
    pub fn new(store: Arc<dyn OptimisticStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Append `lines` to the blob for (`conf.key`, `value`)
    ///
    /// Each attempt watches the blob key, reads and re-compresses the
    /// existing history with the new lines after it, and commits only if no
    /// other writer touched the key in between. The commit also resets the
    /// key's expiry to `conf.ttl`.
    pub async fn compress(&self, conf: &IndexConf, value: &str, lines: &[&[u8]]) -> WriteResult<()> {
        let key = build_key_compressed(&conf.key, value);
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let mut tx = self.store.watch(&key).await?;
            let existing = tx.get().await?.filter(|b| !b.is_empty());

            let blob = append_lines(&key, existing.as_deref(), lines)?;

            let ops = vec![
                Operation::Set {
                    key: key.clone(),
                    value: blob,
                },
                Operation::Expire {
                    key: key.clone(),
                    ttl: conf.ttl,
                },
            ];

            match tx.commit(ops).await? {
                CommitOutcome::Committed => {
                    if attempt > 1 {
                        tracing::debug!(key = %key, attempt, "Commit succeeded after retry");
                    }
                    return Ok(());
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(key = %key, attempt, "Lost commit race");
                    if attempt < max_attempts {
                        self.retry.pause(attempt).await;
                    }
                }
            }
        }

        Err(WriteError::Conflict {
            key,
            attempts: max_attempts,
        })
    }
}

#[async_trait]
impl IndexWriter for CompactedWriter {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::Compacted
    }

    async fn write(&self, conf: &IndexConf, value: &str, lines: &[&[u8]]) -> WriteResult<()> {
        self.compress(conf, value, lines).await
    }
}

/// Keeps the capped most-recent-first list
pub struct RecentBufferWriter {
    store: Arc<dyn OptimisticStore>,
    expiry: Duration,
}

impl RecentBufferWriter {
    pub fn new(store: Arc<dyn OptimisticStore>, expiry: Duration) -> Self {
        Self { store, expiry }
    }

    /// Push `lines` onto the head of the buffer, trim it to `conf.max_size`
    /// and reset its expiry, all in one atomic unit
    pub async fn push_and_trim(
        &self,
        conf: &IndexConf,
        value: &str,
        lines: &[&[u8]],
    ) -> WriteResult<()> {
        let key = build_key(&conf.key, value);
        let stop = conf.max_size.saturating_sub(1) as isize;

        let ops = vec![
            Operation::LPush {
                key: key.clone(),
                values: lines.iter().map(|l| l.to_vec()).collect(),
            },
            Operation::LTrim {
                key: key.clone(),
                start: 0,
                stop,
            },
            Operation::Expire {
                key,
                ttl: self.expiry,
            },
        ];

        self.store.atomic(ops).await?;
        Ok(())
    }
}

#[async_trait]
impl IndexWriter for RecentBufferWriter {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::Recent
    }

    async fn write(&self, conf: &IndexConf, value: &str, lines: &[&[u8]]) -> WriteResult<()> {
        self.push_and_trim(conf, value, lines).await
    }
}

/// Dispatches a group to the writers enabled on its index
#[derive(Clone)]
pub struct IndexWriters {
    writers: Vec<Arc<dyn IndexWriter>>,
}

impl IndexWriters {
    /// Both strategies over one store
    pub fn new(store: Arc<dyn OptimisticStore>, retry: RetryPolicy, recent_ttl: Duration) -> Self {
        let writers: Vec<Arc<dyn IndexWriter>> = vec![
            Arc::new(CompactedWriter::new(Arc::clone(&store), retry)),
            Arc::new(RecentBufferWriter::new(store, recent_ttl)),
        ];
        Self::with_writers(writers)
    }

    pub fn with_writers(writers: Vec<Arc<dyn IndexWriter>>) -> Self {
        Self { writers }
    }

    /// Run every writer whose strategy `conf` enables
    ///
    /// Strategies are independent: a failure in one does not skip the others.
    /// Returns the failures, if any.
    pub async fn write_group(
        &self,
        conf: &IndexConf,
        value: &str,
        lines: &[&[u8]],
    ) -> Vec<(StorageStrategy, WriteError)> {
        let mut failures = Vec::new();

        for writer in &self.writers {
            let strategy = writer.strategy();
            if !conf.uses(strategy) {
                continue;
            }
            if let Err(e) = writer.write(conf, value, lines).await {
                failures.push((strategy, e));
            }
        }

        failures
    }
}
