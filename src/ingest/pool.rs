//! Ingestion worker pool
//!
//! A fixed number of tokio tasks drain one bounded queue of batches. Each
//! batch is handled start to finish by a single worker: group it, then hand
//! every group to the enabled writers one after another. A failing group is
//! logged and counted; it never stops its siblings or the worker.
//!
//! ```text
//! submit(batch) ──> [ bounded queue ] ──┬─> worker 0 ─┐
//!   (waits when full)                   ├─> worker 1 ─┼─> build_groups → IndexWriters
//!                                       └─> worker N ─┘
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::index::{build_groups, IndexSet, LogMessage};
use crate::ingest::writer::IndexWriters;

/// A batch of parsed lines, as delivered by one ingest request
pub type Batch = Vec<LogMessage>;

/// Worker pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Batches that may wait in the queue before `submit` blocks
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 40,
            queue_capacity: 100,
        }
    }
}

/// Errors from handing a batch to the pool
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Ingest queue is closed")]
    Closed,
}

/// Running counters for the pool
#[derive(Debug, Default)]
pub struct IngestStats {
    batches: AtomicU64,
    lines: AtomicU64,
    groups: AtomicU64,
    failed_groups: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub batches: u64,
    pub lines: u64,
    pub groups: u64,
    pub failed_groups: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            groups: self.groups.load(Ordering::Relaxed),
            failed_groups: self.failed_groups.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable producer side of the pool
#[derive(Clone)]
pub struct IngestHandle {
    sender: Arc<Mutex<Option<mpsc::Sender<Batch>>>>,
    stats: Arc<IngestStats>,
    capacity: usize,
}

impl IngestHandle {
    /// Queue a whole batch, waiting while the queue is full
    pub async fn submit(&self, batch: Batch) -> Result<(), IngestError> {
        let sender = self.sender.lock().clone().ok_or(IngestError::Closed)?;
        sender.send(batch).await.map_err(|_| IngestError::Closed)
    }

    /// Batches currently waiting in the queue
    pub fn queued(&self) -> usize {
        match self.sender.lock().as_ref() {
            Some(sender) => self.capacity - sender.capacity(),
            None => 0,
        }
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Fixed set of workers sharing one bounded queue
pub struct WorkerPool {
    handle: IngestHandle,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers onto the current runtime
    pub fn start(indices: Arc<IndexSet>, writers: IndexWriters, config: &PoolConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Batch>(capacity);
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let stats = Arc::new(IngestStats::default());

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let indices = Arc::clone(&indices);
                let writers = writers.clone();
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    run_worker(id, receiver, indices, writers, stats).await;
                })
            })
            .collect::<Vec<_>>();

        tracing::info!(
            workers = workers.len(),
            queue_capacity = capacity,
            "Ingest worker pool started"
        );

        Self {
            handle: IngestHandle {
                sender: Arc::new(Mutex::new(Some(sender))),
                stats,
                capacity,
            },
            workers,
        }
    }

    pub fn handle(&self) -> IngestHandle {
        self.handle.clone()
    }

    /// Stop accepting batches, drain what is queued, and wait for every
    /// worker to finish
    pub async fn shutdown(self) {
        self.handle.sender.lock().take();

        for result in futures_util::future::join_all(self.workers).await {
            if let Err(e) = result {
                tracing::error!("Ingest worker ended abnormally: {}", e);
            }
        }

        tracing::info!(stats = ?self.handle.stats(), "Ingest worker pool stopped");
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Batch>>>,
    indices: Arc<IndexSet>,
    writers: IndexWriters,
    stats: Arc<IngestStats>,
) {
    loop {
        // the lock is only held while waiting, never while processing
        let batch = receiver.lock().await.recv().await;
        let Some(batch) = batch else {
            break;
        };

        process_batch(&indices, &writers, &stats, &batch).await;
    }

    tracing::debug!(worker = id, "Ingest worker exiting");
}

/// Group one batch and write every group, isolating failures per group
pub async fn process_batch(
    indices: &IndexSet,
    writers: &IndexWriters,
    stats: &IngestStats,
    batch: &[LogMessage],
) {
    stats.batches.fetch_add(1, Ordering::Relaxed);
    stats.lines.fetch_add(batch.len() as u64, Ordering::Relaxed);

    let groups = build_groups(indices, batch);
    tracing::debug!(lines = batch.len(), groups = groups.len(), "Processing batch");

    for group in groups.iter() {
        stats.groups.fetch_add(1, Ordering::Relaxed);

        let failures = writers
            .write_group(group.conf, group.value, &group.lines)
            .await;
        if failures.is_empty() {
            continue;
        }

        stats.failed_groups.fetch_add(1, Ordering::Relaxed);
        for (strategy, e) in failures {
            tracing::warn!(
                index = %group.conf.key,
                value = %group.value,
                strategy = ?strategy,
                lines = group.lines.len(),
                transient = e.is_transient(),
                "Failed to store group: {}",
                e
            );
        }
    }
}
