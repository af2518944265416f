//! Store capability
//!
//! The ingest and retrieval paths only talk to the backing store through
//! [`OptimisticStore`]. It offers plain reads, unconditional atomic
//! multi-operation units, and watch-then-commit transactions that report an
//! explicit conflict when the watched key changed underneath them.

use async_trait::async_trait;
use std::time::Duration;

use crate::storage::error::StoreResult;

/// A single write inside an atomic unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Replace the byte value of `key`
    Set { key: String, value: Vec<u8> },
    /// Set the remaining lifetime of `key`
    Expire { key: String, ttl: Duration },
    /// Push `values` onto the head of the list at `key`, one at a time
    /// (the last value ends up first)
    LPush { key: String, values: Vec<Vec<u8>> },
    /// Keep only the inclusive index range `start..=stop` of the list at `key`
    LTrim { key: String, start: isize, stop: isize },
}

impl Operation {
    /// Key this operation writes to
    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key, .. }
            | Operation::Expire { key, .. }
            | Operation::LPush { key, .. }
            | Operation::LTrim { key, .. } => key,
        }
    }
}

/// Result of a conditional commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All operations were applied
    Committed,
    /// The watched key changed since it was watched; nothing was applied
    Conflict,
}

/// An open optimistic transaction on one watched key
#[async_trait]
pub trait Transaction: Send {
    /// Read the watched key's current bytes
    async fn get(&mut self) -> StoreResult<Option<Vec<u8>>>;

    /// Apply `ops` only if the watched key is unchanged since the watch began
    async fn commit(self: Box<Self>, ops: Vec<Operation>) -> StoreResult<CommitOutcome>;
}

/// Key-value store with list primitives and optimistic transactions
#[async_trait]
pub trait OptimisticStore: Send + Sync {
    /// Read a byte value
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Start watching `key` for a conditional commit
    async fn watch(&self, key: &str) -> StoreResult<Box<dyn Transaction>>;

    /// Apply `ops` as one unit, without any condition
    async fn atomic(&self, ops: Vec<Operation>) -> StoreResult<()>;

    /// Read the inclusive range `start..=stop` of a list (negative indices
    /// count from the tail); an absent key is an empty list
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<Vec<u8>>>;

    /// Remaining lifetime of `key`, `None` if absent or without expiry
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Round-trip check used by readiness probes
    async fn ping(&self) -> StoreResult<()>;
}
