//! # cr-db
//!
//! libSQL persistence and the review workflow service for CodeReview.
//!
//! Stores users, rubric trees, reviews and scored rows. Every operation that
//! checks a rule and then writes (claim capacity, request capacity, rubric
//! and score reconciliation) runs inside one `BEGIN IMMEDIATE` transaction
//! taken under an in-process write gate, so the check and the write see the
//! same state. Reads take the same gate, so they only ever see committed rows.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod service;
pub mod updates;

mod test_support;

use error::DatabaseError;
use libsql::{Builder, TransactionBehavior};
use tokio::sync::{Mutex, MutexGuard};

/// Central database handle.
///
/// Wraps a libSQL database and its single connection, plus the gate that
/// serializes write transactions.
pub struct ReviewDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    write_gate: Mutex<()>,
}

impl ReviewDb {
    /// Open a local database at the given path. Runs migrations on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let review_db = Self {
            db,
            conn,
            write_gate: Mutex::new(()),
        };
        review_db.run_migrations().await?;
        Ok(review_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"rev-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        generate_id(&self.conn, prefix).await
    }

    /// The shared connection, held under the write gate so a read never sees
    /// rows from a transaction that has not committed yet.
    pub(crate) async fn read(&self) -> ReadConn<'_> {
        ReadConn {
            _gate: self.write_gate.lock().await,
            conn: &self.conn,
        }
    }

    /// Take the write gate and open an immediate transaction.
    pub(crate) async fn begin_write(&self) -> Result<WriteTx<'_>, DatabaseError> {
        let gate = self.write_gate.lock().await;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;
        Ok(WriteTx { _gate: gate, tx })
    }
}

/// Uses `randomblob(4)` in SQL to produce 8 hex chars, then prepends the prefix.
pub(crate) async fn generate_id(
    conn: &libsql::Connection,
    prefix: &str,
) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT '{prefix}-' || lower(hex(randomblob(4)))"),
            (),
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}

/// Read access to the shared connection while no write is in flight.
pub(crate) struct ReadConn<'a> {
    _gate: MutexGuard<'a, ()>,
    conn: &'a libsql::Connection,
}

impl ReadConn<'_> {
    pub(crate) const fn conn(&self) -> &libsql::Connection {
        self.conn
    }
}

/// An open write transaction holding the write gate.
pub(crate) struct WriteTx<'a> {
    _gate: MutexGuard<'a, ()>,
    tx: libsql::Transaction,
}

impl WriteTx<'_> {
    pub(crate) fn conn(&self) -> &libsql::Connection {
        &self.tx
    }

    /// Commit on `Ok`, roll back on `Err`, and release the gate either way.
    pub(crate) async fn finish<T>(
        self,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let Self { _gate, tx } = self;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
