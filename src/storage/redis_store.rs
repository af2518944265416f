//! Redis-backed store
//!
//! Plain commands and unconditional units go through a shared
//! [`ConnectionManager`]. `WATCH` is scoped to a connection, so every
//! transaction checks out a dedicated connection, runs `WATCH`/`GET` on it
//! and finishes with a `MULTI`/`EXEC` pipeline. A nil `EXEC` reply means the
//! watched key changed. Dedicated connections go back to a small idle list
//! once `EXEC` has cleared the watch, up to a caller-chosen cap.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::{Connection, ConnectionManager};
use redis::{Client, Pipeline};
use std::sync::Arc;
use std::time::Duration;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::store::{CommitOutcome, Operation, OptimisticStore, Transaction};

/// Connections parked between transactions, at most `cap` of them
struct IdleList<T> {
    items: Mutex<Vec<T>>,
    cap: usize,
}

impl<T> IdleList<T> {
    fn new(cap: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    fn pop(&self) -> Option<T> {
        self.items.lock().pop()
    }

    /// Park `item`, or drop it when the list is full
    fn push(&self, item: T) {
        let mut items = self.items.lock();
        if items.len() < self.cap {
            items.push(item);
        }
    }
}

struct Shared {
    client: Client,
    idle: IdleList<Connection>,
}

impl Shared {
    async fn checkout(&self) -> StoreResult<Connection> {
        match self.idle.pop() {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_async_connection().await?),
        }
    }

    fn checkin(&self, conn: Connection) {
        self.idle.push(conn);
    }
}

/// [`OptimisticStore`] over a Redis server
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    shared: Arc<Shared>,
}

impl RedisStore {
    /// Connect to the server at `url` (`redis://[:password@]host:port[/db]`)
    ///
    /// `max_idle` bounds the dedicated transaction connections kept open
    /// between transactions. Size it to the number of concurrent writers so
    /// contended rounds reuse connections instead of reconnecting.
    pub async fn connect(url: &str, max_idle: usize) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client.clone()).await?;

        tracing::info!(max_idle, "Connected to Redis");

        Ok(Self {
            manager,
            shared: Arc::new(Shared {
                client,
                idle: IdleList::new(max_idle),
            }),
        })
    }
}

/// Translate operations into an atomic pipeline
fn build_pipeline(ops: &[Operation]) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();

    for op in ops {
        match op {
            Operation::Set { key, value } => {
                pipe.cmd("SET").arg(key).arg(value.as_slice()).ignore();
            }
            Operation::Expire { key, ttl } => {
                let millis = ttl.as_millis().max(1) as u64;
                pipe.cmd("PEXPIRE").arg(key).arg(millis).ignore();
            }
            Operation::LPush { key, values } => {
                let mut cmd = redis::cmd("LPUSH");
                cmd.arg(key);
                for value in values {
                    cmd.arg(value.as_slice());
                }
                pipe.add_command(cmd).ignore();
            }
            Operation::LTrim { key, start, stop } => {
                pipe.cmd("LTRIM").arg(key).arg(*start).arg(*stop).ignore();
            }
        }
    }

    pipe
}

struct RedisTransaction {
    conn: Option<Connection>,
    shared: Arc<Shared>,
    key: String,
}

impl RedisTransaction {
    fn conn(&mut self) -> StoreResult<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::Connection("transaction already finished".to_string()))
    }
}

#[async_trait]
impl Transaction for RedisTransaction {
    async fn get(&mut self) -> StoreResult<Option<Vec<u8>>> {
        let key = self.key.clone();
        let conn = self.conn()?;
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(&key).query_async(conn).await?;
        Ok(value)
    }

    async fn commit(self: Box<Self>, ops: Vec<Operation>) -> StoreResult<CommitOutcome> {
        let mut this = self;
        let mut conn = this
            .conn
            .take()
            .ok_or_else(|| StoreError::Connection("transaction already finished".to_string()))?;

        // a connection that errors mid-EXEC is dropped rather than reused
        let reply: Option<()> = build_pipeline(&ops).query_async(&mut conn).await?;
        this.shared.checkin(conn);

        Ok(match reply {
            Some(()) => CommitOutcome::Committed,
            None => CommitOutcome::Conflict,
        })
    }
}

#[async_trait]
impl OptimisticStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn watch(&self, key: &str) -> StoreResult<Box<dyn Transaction>> {
        let mut conn = self.shared.checkout().await?;
        redis::cmd("WATCH")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(Box::new(RedisTransaction {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            key: key.to_string(),
        }))
    }

    async fn atomic(&self, ops: Vec<Operation>) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        build_pipeline(&ops)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let items: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut conn = self.manager.clone();
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;

        // -2: no such key, -1: no expiry
        Ok(if millis < 0 {
            None
        } else {
            Some(Duration::from_millis(millis as u64))
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
