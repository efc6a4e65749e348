// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite document-style backend
//!
//! Every primitive is a single statement, so atomicity comes from SQLite
//! itself and several processes can share one database file:
//! - reservations are rows keyed by worker id; `INSERT OR REPLACE` moves a
//!   worker's single reservation wherever it was
//! - dedup entries are rows with an absolute expiry, inserted with an
//!   upsert that only overwrites rows that already expired
//! - counters are incremented with `RETURNING`
//!
//! Calls run on the blocking pool; the connection sits behind a mutex.
//! Liveness probes use a second connection so a statement stuck on another
//! writer's lock never delays them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turnstile_core::{
    validate_collection, Clock, Reservation, StorageBackend, StorageConnection, StoreError,
    SystemClock, WorkerId,
};

const BACKEND: &str = "sqlite";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Table names derived from the collection
#[derive(Debug)]
struct Tables {
    reservations: String,
    dedup: String,
    counters: String,
}

impl Tables {
    fn for_collection(collection: &str) -> Self {
        Self {
            reservations: format!("{}_reservations", collection),
            dedup: format!("{}_dedup", collection),
            counters: format!("{}_counters", collection),
        }
    }

    fn create(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {r} (
                worker_id TEXT PRIMARY KEY,
                aggregate_id TEXT NOT NULL,
                reserved_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {r}_by_aggregate
                ON {r} (aggregate_id, reserved_at);

            CREATE TABLE IF NOT EXISTS {d} (
                key TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS {c} (
                namespace TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );",
            r = self.reservations,
            d = self.dedup,
            c = self.counters,
        ))
    }
}

/// Backend storing one collection in a SQLite database file
#[derive(Clone, Debug)]
pub struct SqliteBackend<C: Clock = SystemClock> {
    path: PathBuf,
    collection: String,
    clock: C,
}

impl SqliteBackend<SystemClock> {
    pub fn new(path: impl Into<PathBuf>, collection: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_clock(path, collection, SystemClock)
    }
}

impl<C: Clock> SqliteBackend<C> {
    /// Create a backend whose expiries follow the given clock
    pub fn with_clock(
        path: impl Into<PathBuf>,
        collection: impl Into<String>,
        clock: C,
    ) -> Result<Self, StoreError> {
        let collection = collection.into();
        validate_collection(&collection)?;
        Ok(Self {
            path: path.into(),
            collection,
            clock,
        })
    }

}

type Handle = Arc<Mutex<Option<Connection>>>;

fn open(path: &Path, tables: &Tables) -> rusqlite::Result<(Connection, Connection)> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // journal_mode returns a row, so it cannot go through execute()
    conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
    tables.create(&conn)?;

    let probe = Connection::open(path)?;
    Ok((conn, probe))
}

/// Run `f` on the blocking pool against the connection behind `handle`
async fn blocking<T, F>(handle: &Handle, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
{
    let handle = Arc::clone(handle);

    tokio::task::spawn_blocking(move || {
        let guard = handle.lock().unwrap_or_else(|e| e.into_inner());
        let conn = guard
            .as_ref()
            .ok_or_else(|| StoreError::connection(BACKEND, "connection closed"))?;
        f(conn).map_err(|e| StoreError::connection(BACKEND, e))
    })
    .await
    .map_err(|e| StoreError::connection(BACKEND, e))?
}

#[async_trait]
impl<C: Clock> StorageBackend for SqliteBackend<C> {
    type Connection = SqliteConnection<C>;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn connect(&self) -> Result<SqliteConnection<C>, StoreError> {
        let path = self.path.clone();
        let tables = Arc::new(Tables::for_collection(&self.collection));
        let schema = Arc::clone(&tables);

        let (conn, probe) = tokio::task::spawn_blocking(move || open(&path, &schema))
            .await
            .map_err(|e| StoreError::connection(BACKEND, e))?
            .map_err(|e| StoreError::connection(BACKEND, e))?;

        Ok(SqliteConnection {
            handle: Arc::new(Mutex::new(Some(conn))),
            probe: Arc::new(Mutex::new(Some(probe))),
            tables,
            clock: self.clock.clone(),
        })
    }
}

/// Open SQLite connection; clones share it
#[derive(Clone)]
pub struct SqliteConnection<C: Clock = SystemClock> {
    handle: Handle,
    /// Used only by `ping`
    probe: Handle,
    tables: Arc<Tables>,
    clock: C,
}

impl<C: Clock> SqliteConnection<C> {
    /// Run a statement on the blocking pool
    async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &Tables) -> rusqlite::Result<T> + Send + 'static,
    {
        let tables = Arc::clone(&self.tables);
        blocking(&self.handle, move |conn| f(conn, &tables)).await
    }
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl<C: Clock> StorageConnection for SqliteConnection<C> {
    async fn close(&self) -> Result<(), StoreError> {
        let handles = [Arc::clone(&self.probe), Arc::clone(&self.handle)];
        tokio::task::spawn_blocking(move || {
            let mut result = Ok(());
            for handle in handles {
                let taken = handle.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(Err((_, e))) = taken.map(Connection::close) {
                    result = result.and(Err(StoreError::connection(BACKEND, e)));
                }
            }
            result
        })
        .await
        .map_err(|e| StoreError::connection(BACKEND, e))?
    }

    async fn ping(&self) -> Result<(), StoreError> {
        blocking(&self.probe, |conn| conn.query_row("SELECT 1", [], |_| Ok(()))).await
    }

    async fn closed(&self) {
        // A database file never drops the connection on its own
        std::future::pending::<()>().await
    }

    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let worker_id = reservation.worker_id.to_string();
        let aggregate_id = reservation.aggregate_id.clone();
        let reserved_at = reservation.timestamp.timestamp_micros();

        self.call(move |conn, tables| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (worker_id, aggregate_id, reserved_at)
                     VALUES (?1, ?2, ?3)",
                    tables.reservations
                ),
                params![worker_id, aggregate_id, reserved_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn list_reservations(&self, aggregate_id: &str) -> Result<Vec<WorkerId>, StoreError> {
        let aggregate_id = aggregate_id.to_string();

        self.call(move |conn, tables| {
            let mut stmt = conn.prepare(&format!(
                "SELECT worker_id FROM {} WHERE aggregate_id = ?1
                 ORDER BY reserved_at ASC, rowid ASC",
                tables.reservations
            ))?;
            let rows = stmt.query_map(params![aggregate_id], |row| {
                row.get::<_, String>(0).map(WorkerId::new)
            })?;
            rows.collect()
        })
        .await
    }

    async fn delete_reservations(&self, aggregate_id: &str) -> Result<(), StoreError> {
        let aggregate_id = aggregate_id.to_string();

        self.call(move |conn, tables| {
            conn.execute(
                &format!("DELETE FROM {} WHERE aggregate_id = ?1", tables.reservations),
                params![aggregate_id],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete_all_reservations(&self) -> Result<(), StoreError> {
        self.call(|conn, tables| {
            conn.execute(&format!("DELETE FROM {}", tables.reservations), [])
                .map(|_| ())
        })
        .await
    }

    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let key = key.to_string();
        let now = millis(self.clock.utc_now());
        let expires_at = now.saturating_add(ttl_millis(ttl));

        self.call(move |conn, tables| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO {d} (key, expires_at) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET expires_at = excluded.expires_at
                     WHERE {d}.expires_at <= ?3",
                    d = tables.dedup
                ),
                params![key, expires_at, now],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn delete_expired_dedup_entry(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let now = millis(self.clock.utc_now());

        self.call(move |conn, tables| {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE key = ?1 AND expires_at <= ?2",
                    tables.dedup
                ),
                params![key, now],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete_all_dedup_entries(&self) -> Result<(), StoreError> {
        self.call(|conn, tables| {
            conn.execute(&format!("DELETE FROM {}", tables.dedup), [])
                .map(|_| ())
        })
        .await
    }

    async fn increment_counter(&self, namespace: &str) -> Result<u64, StoreError> {
        let namespace = namespace.to_string();

        let value: i64 = self
            .call(move |conn, tables| {
                conn.query_row(
                    &format!(
                        "INSERT INTO {c} (namespace, value) VALUES (?1, 1)
                         ON CONFLICT(namespace) DO UPDATE SET value = {c}.value + 1
                         RETURNING value",
                        c = tables.counters
                    ),
                    params![namespace],
                    |row| row.get(0),
                )
            })
            .await?;
        u64::try_from(value).map_err(|e| StoreError::connection(BACKEND, e))
    }

    async fn reset_counter(&self, namespace: &str) -> Result<(), StoreError> {
        let namespace = namespace.to_string();

        self.call(move |conn, tables| {
            conn.execute(
                &format!("DELETE FROM {} WHERE namespace = ?1", tables.counters),
                params![namespace],
            )
            .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
