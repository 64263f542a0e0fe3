//! Storage-layer errors for SQLite operations.

/// Errors that can occur in the storage layer.
///
/// Only busy contention is treated as transient by the aggregation retry
/// policy; everything else, generic SQLite failures included, is
/// deterministic and fails the operation outright.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("Migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Database busy (another operation in progress)")]
    DbBusy,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid pagination token: {token}")]
    InvalidPageToken { token: String },
}

impl StorageError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DbBusy)
    }
}
