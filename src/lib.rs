//! # lvat
//!
//! Log line indexing: lines arriving from a logplex drain are grouped by the
//! values of configured fields (for example `request_id`) and appended to a
//! per-value history kept in Redis, so that every line ever logged for one
//! request can be fetched with a single lookup.
//!
//! ## Modules
//!
//! - [`transport`]: logplex framing and logfmt parsing
//! - [`index`]: index definitions, key layout and batch grouping
//! - [`ingest`]: worker pool and storage writers
//! - [`query`]: retrieval of stored history
//! - [`storage`]: store capability, Redis and in-memory stores, gzip blobs
//! - [`api`]: REST API server with Axum
//! - [`config`]: file and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lvat::index::{IndexConf, IndexSet};
//! use lvat::ingest::{IndexWriters, PoolConfig, RetryPolicy, WorkerPool, DEFAULT_RECENT_TTL};
//! use lvat::query::Retriever;
//! use lvat::storage::{MemoryStore, OptimisticStore};
//! use lvat::transport::parse_batch;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let indices = Arc::new(IndexSet::new(vec![
//!         IndexConf::new("request_id", 500, Duration::from_secs(48 * 3600)),
//!     ])?);
//!     let store: Arc<dyn OptimisticStore> = Arc::new(MemoryStore::new());
//!
//!     let writers = IndexWriters::new(Arc::clone(&store), RetryPolicy::default(), DEFAULT_RECENT_TTL);
//!     let pool = WorkerPool::start(Arc::clone(&indices), writers, &PoolConfig::default());
//!
//!     let body = b"73 <190>1 2024-01-01T00:00:00+00:00 host app web.1 - request_id=req1 at=info";
//!     pool.handle().submit(parse_batch(body)).await?;
//!     pool.shutdown().await;
//!
//!     let retriever = Retriever::new(indices, store);
//!     let gzip = retriever.lookup("req1").await?;
//!     println!("found: {}", gzip.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod index;
pub mod ingest;
pub mod query;
pub mod storage;
pub mod transport;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};
pub use config::{Config, ConfigError};
pub use index::{build_groups, IndexConf, IndexSet, LogMessage, StorageStrategy};
pub use ingest::{IngestHandle, IndexWriters, PoolConfig, RetryPolicy, WorkerPool};
pub use query::Retriever;
pub use storage::{MemoryStore, OptimisticStore, RedisStore, StoreError, StoreResult};
