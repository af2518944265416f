//! lvat Ingestion
//!
//! Moves parsed batches from the HTTP surface into the store:
//!
//! - **pool**: bounded queue drained by a fixed set of workers
//! - **writer**: per-strategy writers ([`CompactedWriter`], [`RecentBufferWriter`])
//! - **backoff**: retry budget and jitter for lost commit races

pub mod backoff;
pub mod pool;
pub mod writer;

pub use backoff::{Jitter, RetryPolicy};
pub use pool::{
    process_batch, Batch, IngestError, IngestHandle, IngestStats, IngestStatsSnapshot, PoolConfig,
    WorkerPool,
};
pub use writer::{
    CompactedWriter, IndexWriter, IndexWriters, RecentBufferWriter, WriteError, WriteResult,
    DEFAULT_RECENT_TTL,
};
