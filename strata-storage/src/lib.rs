//! # strata-storage
//!
//! SQLite persistence layer for the Strata aggregation engine.
//! WAL mode, write-serialized + read-pooled, keyset pagination,
//! forward-only schema migrations.

pub mod connection;
pub mod engine;
pub mod migrations;
pub mod pagination;
pub mod queries;

pub use connection::DatabaseManager;
pub use engine::MetricStorageEngine;

use strata_core::errors::StorageError;

/// Map a rusqlite error into a `StorageError`, keeping busy-contention
/// distinguishable so the retry policy can treat it as transient.
pub(crate) fn sqe(e: rusqlite::Error) -> StorageError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::DatabaseBusy
            || err.code == rusqlite::ErrorCode::DatabaseLocked
        {
            return StorageError::DbBusy;
        }
    }
    StorageError::SqliteError { message: e.to_string() }
}
