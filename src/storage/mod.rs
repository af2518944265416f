//! lvat Storage Layer
//!
//! Everything that touches the backing key-value store:
//!
//! - **store**: the [`OptimisticStore`] capability (reads, atomic units,
//!   watch-then-commit transactions)
//! - **memory**: in-process implementation with deterministic test hooks
//! - **redis_store**: Redis implementation (`WATCH`/`MULTI`/`EXEC`)
//! - **compression**: gzip append/decompress for compacted blobs
//! - **error**: Error types
//!
//! # Write paths
//!
//! ```text
//! Compacted blob:  WATCH k → GET k → gunzip + append + gzip → MULTI SET k, PEXPIRE k → EXEC
//! Recent buffer:   MULTI LPUSH k lines.. → LTRIM k 0 max-1 → PEXPIRE k → EXEC
//! ```

pub mod compression;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryState, MemoryStore};
pub use redis_store::RedisStore;
pub use store::{CommitOutcome, Operation, OptimisticStore, Transaction};
