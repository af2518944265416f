//! In-memory store
//!
//! A single-process [`OptimisticStore`] used by tests and local runs. Every
//! write stamps its key with the next value of a store-wide sequence; a
//! transaction remembers the stamp of its watched key and refuses to commit
//! if it moved. Stamps are kept for live keys only. An absent key reads as
//! the sequence value of the most recent removal, so a key that was written
//! and then removed still looks changed. Expiry is evaluated lazily on
//! access.
//!
//! Two test hooks make concurrency deterministic:
//! - [`MemoryStore::before_next_commit`] runs a closure between a
//!   transaction's read and its commit, standing in for a competing writer.
//! - [`MemoryStore::fail_next`] makes the next store call fail with a
//!   connection error.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::store::{CommitOutcome, Operation, OptimisticStore, Transaction};

type CommitHook = Box<dyn FnOnce(&mut MemoryState) + Send>;

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    List(VecDeque<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// Contents of a [`MemoryStore`]
///
/// Exposed to commit hooks so tests can play the part of another writer.
#[derive(Debug, Default)]
pub struct MemoryState {
    entries: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
    seq: u64,
    removed_at: u64,
}

impl MemoryState {
    fn bump(&mut self, key: &str) {
        self.seq += 1;
        self.versions.insert(key.to_string(), self.seq);
    }

    /// Remove `key` and its version stamp
    fn forget(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.versions.remove(key);
            self.seq += 1;
            self.removed_at = self.seq;
        }
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(self.removed_at)
    }

    /// Drop `key` if its expiry has passed
    fn purge(&mut self, key: &str) {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at <= Instant::now())
            .unwrap_or(false);

        if expired {
            self.forget(key);
        }
    }

    fn live(&mut self, key: &str) -> Option<&Entry> {
        self.purge(key);
        self.entries.get(key)
    }

    /// Read a byte value
    pub fn get_bytes(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    /// Overwrite a byte value, clearing any expiry
    pub fn set_bytes(&mut self, key: &str, value: Vec<u8>) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value),
                expires_at: None,
            },
        );
        self.bump(key);
    }

    fn list_range(&mut self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<Vec<u8>>> {
        match self.live(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(match normalize_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn ttl(&mut self, key: &str) -> Option<Duration> {
        let expires_at = self.live(key)?.expires_at?;
        Some(expires_at.saturating_duration_since(Instant::now()))
    }

    /// Apply `ops` all-or-nothing
    fn apply_all(&mut self, ops: Vec<Operation>) -> StoreResult<()> {
        let mut scratch: Vec<(String, Option<Entry>)> = Vec::new();

        for op in ops {
            let key = op.key().to_string();
            let idx = match scratch.iter().position(|(k, _)| *k == key) {
                Some(idx) => idx,
                None => {
                    let current = self.live(&key).cloned();
                    scratch.push((key, current));
                    scratch.len() - 1
                }
            };
            apply_op(&mut scratch[idx].1, op)?;
        }

        for (key, slot) in scratch {
            match slot {
                Some(entry) => {
                    self.entries.insert(key.clone(), entry);
                    self.bump(&key);
                }
                None => self.forget(&key),
            }
        }

        Ok(())
    }
}

fn apply_op(slot: &mut Option<Entry>, op: Operation) -> StoreResult<()> {
    match op {
        Operation::Set { value, .. } => {
            *slot = Some(Entry {
                value: Value::Bytes(value),
                expires_at: None,
            });
        }
        Operation::Expire { ttl, .. } => {
            if let Some(entry) = slot.as_mut() {
                entry.expires_at = Some(Instant::now() + ttl);
            }
        }
        Operation::LPush { key, values } => {
            let entry = slot.get_or_insert_with(|| Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::List(list) => {
                    for value in values {
                        list.push_front(value);
                    }
                }
                Value::Bytes(_) => return Err(StoreError::WrongType(key)),
            }
        }
        Operation::LTrim { key, start, stop } => {
            let Some(entry) = slot.as_mut() else {
                return Ok(());
            };
            let list = match &mut entry.value {
                Value::List(list) => list,
                Value::Bytes(_) => return Err(StoreError::WrongType(key)),
            };
            match normalize_range(list.len(), start, stop) {
                Some((from, to)) => {
                    list.truncate(to + 1);
                    list.drain(..from);
                }
                None => list.clear(),
            }
            if list.is_empty() {
                *slot = None;
            }
        }
    }
    Ok(())
}

/// Resolve a Redis-style inclusive range against a list of `len` items
fn normalize_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[derive(Default)]
struct Inner {
    state: Mutex<MemoryState>,
    hook: Mutex<Option<CommitHook>>,
    failure: Mutex<Option<String>>,
}

impl Inner {
    fn check_failure(&self) -> StoreResult<()> {
        match self.failure.lock().take() {
            Some(message) => Err(StoreError::Connection(message)),
            None => Ok(()),
        }
    }
}

/// Process-local [`OptimisticStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` inside the next transaction commit, after the transaction
    /// has read its key and before the conflict check
    pub fn before_next_commit<F>(&self, hook: F)
    where
        F: FnOnce(&mut MemoryState) + Send + 'static,
    {
        *self.inner.hook.lock() = Some(Box::new(hook));
    }

    /// Make the next store call fail with a connection error
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.inner.failure.lock() = Some(message.into());
    }

    /// Write a byte value directly, bypassing transactions
    pub fn set_raw(&self, key: &str, value: Vec<u8>) {
        self.inner.state.lock().set_bytes(key, value);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let mut state = self.inner.state.lock();
        let keys: Vec<String> = state.entries.keys().cloned().collect();
        for key in &keys {
            state.purge(key);
        }
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    key: String,
    version: u64,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self) -> StoreResult<Option<Vec<u8>>> {
        self.inner.check_failure()?;
        self.inner.state.lock().get_bytes(&self.key)
    }

    async fn commit(self: Box<Self>, ops: Vec<Operation>) -> StoreResult<CommitOutcome> {
        self.inner.check_failure()?;

        let hook = self.inner.hook.lock().take();
        let mut state = self.inner.state.lock();
        if let Some(hook) = hook {
            hook(&mut *state);
        }

        state.purge(&self.key);
        if state.version(&self.key) != self.version {
            return Ok(CommitOutcome::Conflict);
        }

        state.apply_all(ops)?;
        Ok(CommitOutcome::Committed)
    }
}

#[async_trait]
impl OptimisticStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.check_failure()?;
        self.inner.state.lock().get_bytes(key)
    }

    async fn watch(&self, key: &str) -> StoreResult<Box<dyn Transaction>> {
        self.inner.check_failure()?;
        let version = {
            let mut state = self.inner.state.lock();
            state.purge(key);
            state.version(key)
        };

        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            version,
        }))
    }

    async fn atomic(&self, ops: Vec<Operation>) -> StoreResult<()> {
        self.inner.check_failure()?;
        self.inner.state.lock().apply_all(ops)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<Vec<u8>>> {
        self.inner.check_failure()?;
        self.inner.state.lock().list_range(key, start, stop)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.inner.check_failure()?;
        Ok(self.inner.state.lock().ttl(key))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.check_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(key: &str, values: &[&str]) -> Operation {
        Operation::LPush {
            key: key.to_string(),
            values: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store
            .atomic(vec![Operation::Set {
                key: "k".to_string(),
                value: b"v".to_vec(),
            }])
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_lpush_puts_newest_first() {
        let store = MemoryStore::new();
        store.atomic(vec![push("l", &["a", "b", "c"])]).await.unwrap();

        let items = store.list_range("l", 0, -1).await.unwrap();
        assert_eq!(items, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[tokio::test]
    async fn test_ltrim() {
        let store = MemoryStore::new();
        store
            .atomic(vec![
                push("l", &["a", "b", "c", "d"]),
                Operation::LTrim {
                    key: "l".to_string(),
                    start: 0,
                    stop: 1,
                },
            ])
            .await
            .unwrap();

        let items = store.list_range("l", 0, -1).await.unwrap();
        assert_eq!(items, vec![b"d".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_wrong_type_rolls_back_unit() {
        let store = MemoryStore::new();
        store.set_raw("k", b"bytes".to_vec());

        let err = store
            .atomic(vec![push("other", &["x"]), push("k", &["y"])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WrongType(_)));

        // nothing from the failed unit is visible
        assert!(store.list_range("other", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_commits_when_untouched() {
        let store = MemoryStore::new();
        let mut tx = store.watch("k").await.unwrap();
        assert_eq!(tx.get().await.unwrap(), None);

        let outcome = tx
            .commit(vec![Operation::Set {
                key: "k".to_string(),
                value: b"1".to_vec(),
            }])
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::Committed);
        assert_eq!(store.get("k").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_transaction_conflicts_after_concurrent_write() {
        let store = MemoryStore::new();
        let tx = store.watch("k").await.unwrap();

        store.set_raw("k", b"other".to_vec());

        let outcome = tx
            .commit(vec![Operation::Set {
                key: "k".to_string(),
                value: b"mine".to_vec(),
            }])
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::Conflict);
        assert_eq!(store.get("k").await.unwrap(), Some(b"other".to_vec()));
    }

    #[tokio::test]
    async fn test_commit_hook_runs_once() {
        let store = MemoryStore::new();
        store.before_next_commit(|state| state.set_bytes("k", b"hook".to_vec()));

        let tx = store.watch("k").await.unwrap();
        let set = vec![Operation::Set {
            key: "k".to_string(),
            value: b"mine".to_vec(),
        }];
        assert_eq!(tx.commit(set.clone()).await.unwrap(), CommitOutcome::Conflict);

        let tx = store.watch("k").await.unwrap();
        assert_eq!(tx.commit(set).await.unwrap(), CommitOutcome::Committed);
        assert_eq!(store.get("k").await.unwrap(), Some(b"mine".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = MemoryStore::new();
        store
            .atomic(vec![
                Operation::Set {
                    key: "k".to_string(),
                    value: b"v".to_vec(),
                },
                Operation::Expire {
                    key: "k".to_string(),
                    ttl: Duration::from_secs(10),
                },
            ])
            .await
            .unwrap();

        assert_eq!(store.ttl("k").await.unwrap(), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), None);
    }

    fn set_with_ttl(key: &str, secs: u64) -> Vec<Operation> {
        vec![
            Operation::Set {
                key: key.to_string(),
                value: b"v".to_vec(),
            },
            Operation::Expire {
                key: key.to_string(),
                ttl: Duration::from_secs(secs),
            },
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_keys_release_their_versions() {
        let store = MemoryStore::new();
        for i in 0..50 {
            store.atomic(set_with_ttl(&format!("k{}", i), 10)).await.unwrap();
        }
        assert_eq!(store.inner.state.lock().versions.len(), 50);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.is_empty());
        assert!(store.inner.state.lock().versions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_then_expiry_during_transaction_conflicts() {
        let store = MemoryStore::new();
        let tx = store.watch("k").await.unwrap();

        // the key appears and expires again before the commit
        store.atomic(set_with_ttl("k", 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        let outcome = tx
            .commit(vec![Operation::Set {
                key: "k".to_string(),
                value: b"mine".to_vec(),
            }])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_trimmed_away_list_releases_its_version() {
        let store = MemoryStore::new();
        store.atomic(vec![push("l", &["a"])]).await.unwrap();
        store
            .atomic(vec![Operation::LTrim {
                key: "l".to_string(),
                start: 1,
                stop: 0,
            }])
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(store.inner.state.lock().versions.is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let store = MemoryStore::new();
        store.fail_next("connection reset");

        let err = store.get("k").await.unwrap_err();
        assert!(err.is_connection());
        assert!(store.get("k").await.is_ok());
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range(5, 0, -1), Some((0, 4)));
        assert_eq!(normalize_range(5, 0, 1), Some((0, 1)));
        assert_eq!(normalize_range(5, -2, -1), Some((3, 4)));
        assert_eq!(normalize_range(5, 0, 99), Some((0, 4)));
        assert_eq!(normalize_range(5, 3, 1), None);
        assert_eq!(normalize_range(0, 0, -1), None);
    }
}
