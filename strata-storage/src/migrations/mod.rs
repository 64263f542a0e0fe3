//! Schema migrations, applied in order on every open.
//!
//! Each migration runs inside its own immediate transaction and records
//! itself in `schema_version`, so an interrupted open leaves the schema at
//! whatever version last committed. There is no downgrade path.

mod v001_initial_schema;

use rusqlite::Connection;
use tracing::{debug, info};

use strata_core::errors::StorageError;

use crate::sqe;

type MigrationFn = fn(&Connection) -> Result<(), StorageError>;

/// Schema version this build of the crate expects.
pub const LATEST_VERSION: u32 = 1;

const MIGRATIONS: [(u32, &str, MigrationFn); 1] =
    [(1, "initial_schema", v001_initial_schema::migrate)];

/// Version recorded in the database; 0 for a file that has never been
/// migrated.
pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    let has_table = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(sqe)?;
    if !has_table {
        return Ok(0);
    }
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(sqe)
}

/// Bring the schema up to [`LATEST_VERSION`]. Returns how many migrations
/// ran; 0 when the schema was already current.
pub fn run_migrations(conn: &Connection) -> Result<u32, StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .map_err(sqe)?;

    let from = current_version(conn)?;
    let mut ran = 0;
    for &(version, name, apply) in MIGRATIONS.iter().filter(|&&(v, _, _)| v > from) {
        info!(version, name, "applying schema migration");
        apply_one(conn, version, apply)?;
        ran += 1;
    }

    if ran == 0 {
        debug!(version = from, "schema already current");
    } else {
        info!(from, to = LATEST_VERSION, ran, "schema migrated");
    }
    Ok(ran)
}

fn apply_one(conn: &Connection, version: u32, apply: MigrationFn) -> Result<(), StorageError> {
    let failed = |message: String| StorageError::MigrationFailed { version, message };

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| failed(format!("begin: {e}")))?;

    let outcome = apply(conn).and_then(|()| {
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(sqe)
            .map(|_| ())
    });

    match outcome {
        Ok(()) => conn
            .execute_batch("COMMIT")
            .map_err(|e| failed(format!("commit: {e}"))),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(failed(e.to_string()))
        }
    }
}
