//! # Store
//!
//! Owns the turso `Database` and hands out connections. Two rules hold for
//! every caller:
//!
//! - At most `max_connections` connections are checked out at once; further
//!   requests wait for a permit.
//! - Writes go through [`Store::write`], which serializes writers behind an
//!   async mutex before `BEGIN`. SQLite admits a single writer, and holding
//!   the mutex for the whole transaction gives read-check-write sequences
//!   (voucher stock, point balances) the same guarantee a row lock would.

pub mod sql;

pub use core_access::columns;

use crate::{constants::DEFAULT_MAX_CONNECTIONS, errors::DomainError};
use std::{
    fmt::{self, Debug},
    ops::Deref,
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use turso::{Connection, Database};

#[derive(Clone)]
pub struct Store {
    pub db: Database,
    permits: Arc<Semaphore>,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Opens (or creates) the database at `db_path`. Use ":memory:" for an
    /// isolated in-memory database; clones share the same instance.
    pub async fn open(db_path: &str, max_connections: usize) -> Result<Self, DomainError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))?;
        // PRAGMA returns a row, so it has to go through `query`.
        conn.query("PRAGMA journal_mode=WAL;", ())
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))?;

        info!(db_path, max_connections, "Opened store");
        Ok(Self {
            db,
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn open_in_memory() -> Result<Self, DomainError> {
        Self::open(":memory:", DEFAULT_MAX_CONNECTIONS).await
    }

    /// Creates every table and index. Idempotent.
    pub async fn initialize_schema(&self) -> Result<(), DomainError> {
        let tx = self.write().await?;
        let result: Result<(), DomainError> = async {
            for statement in sql::ALL_TABLE_CREATION_SQL {
                tx.execute(statement, ()).await?;
            }
            for statement in sql::CREATE_INDEXES {
                tx.execute(statement, ()).await?;
            }
            Ok(())
        }
        .await;
        tx.settle(result).await
    }

    /// A helper for tests to pre-populate data from `;`-separated statements.
    pub async fn initialize_with_data(&self, init_sql: &str) -> Result<(), DomainError> {
        let tx = self.write().await?;
        let result: Result<(), DomainError> = async {
            for statement in init_sql.split(';').filter(|s| !s.trim().is_empty()) {
                tx.execute(statement, ()).await?;
            }
            Ok(())
        }
        .await;
        tx.settle(result).await
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, DomainError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))
    }

    /// A pooled connection for reads.
    pub async fn read(&self) -> Result<PooledConnection, DomainError> {
        let permit = self.acquire().await?;
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))?;
        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Starts a serialized write transaction.
    ///
    /// Finish it with [`WriteTx::settle`], [`WriteTx::commit`] or
    /// [`WriteTx::rollback`]. A transaction dropped unfinished is rolled back
    /// in the background while the writer lock is still held.
    pub async fn write(&self) -> Result<WriteTx, DomainError> {
        let guard = self.write_lock.clone().lock_owned().await;
        let permit = self.acquire().await?;
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))?;
        conn.execute("BEGIN TRANSACTION", ()).await?;
        debug!("Write transaction started");
        Ok(WriteTx {
            inner: Some(TxInner {
                conn,
                _permit: permit,
                _guard: guard,
            }),
        })
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

/// A connection checked out of the store's pool.
pub struct PooledConnection {
    conn: Connection,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

struct TxInner {
    conn: Connection,
    _permit: OwnedSemaphorePermit,
    _guard: OwnedMutexGuard<()>,
}

/// An open write transaction holding the store's writer lock.
pub struct WriteTx {
    inner: Option<TxInner>,
}

impl WriteTx {
    fn take(&mut self) -> Result<TxInner, DomainError> {
        self.inner
            .take()
            .ok_or_else(|| DomainError::StorageUnavailable("transaction already finished".into()))
    }

    pub async fn commit(mut self) -> Result<(), DomainError> {
        let inner = self.take()?;
        inner.conn.execute("COMMIT", ()).await?;
        debug!("Write transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), DomainError> {
        let inner = self.take()?;
        inner.conn.execute("ROLLBACK", ()).await?;
        debug!("Write transaction rolled back");
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err`, and passes the result through.
    pub async fn settle<T>(self, result: Result<T, DomainError>) -> Result<T, DomainError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!("Rollback after '{err}' failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }
}

impl Deref for WriteTx {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.inner {
            Some(inner) => &inner.conn,
            // `inner` is only taken by the consuming methods above.
            None => unreachable!("WriteTx used after it was finished"),
        }
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        warn!("Write transaction dropped without commit; rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = inner.conn.execute("ROLLBACK", ()).await {
                        warn!("Background rollback failed: {e}");
                    }
                    drop(inner);
                });
            }
            Err(_) => warn!("No runtime available to roll back dropped transaction"),
        }
    }
}
