//! `DatabaseManager` — single write connection + small read pool, WAL mode.
//!
//! SQLite allows one writer at a time; serializing writes through a mutex
//! avoids `SQLITE_BUSY` churn, while WAL lets the pooled readers proceed
//! concurrently. In-memory databases are per-connection, so the in-memory
//! variant routes reads through the writer connection too.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::debug;

use strata_core::errors::StorageError;

use crate::migrations;
use crate::sqe;

const READ_POOL_SIZE: usize = 4;

pub struct DatabaseManager {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    path: Option<PathBuf>,
}

impl DatabaseManager {
    /// Open a file-backed database, apply pragmas, and run migrations.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let writer = Connection::open(path).map_err(sqe)?;
        apply_write_pragmas(&writer)?;
        migrations::run_migrations(&writer)?;

        let mut readers = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let conn = Connection::open(path).map_err(sqe)?;
            apply_read_pragmas(&conn)?;
            readers.push(Mutex::new(conn));
        }

        debug!(path = %path.display(), "opened database");
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing). Reads and writes share the
    /// single connection.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let writer = Connection::open_in_memory().map_err(sqe)?;
        writer
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(sqe)?;
        migrations::run_migrations(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            next_reader: AtomicUsize::new(0),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a closure against the write connection.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.writer.lock().map_err(|_| StorageError::SqliteError {
            message: "writer mutex poisoned".to_string(),
        })?;
        f(&conn)
    }

    /// Run a closure against a pooled read connection (round-robin).
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        if self.readers.is_empty() {
            // In-memory: fall through to the writer connection.
            return self.with_writer(f);
        }
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|_| StorageError::SqliteError {
                message: "reader mutex poisoned".to_string(),
            })?;
        f(&conn)
    }

    /// Force a WAL checkpoint.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.with_writer(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(sqe)
        })
    }
}

fn apply_write_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(sqe)
}

fn apply_read_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA query_only = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(sqe)
}
