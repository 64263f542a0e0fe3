//! Aggregation task errors.

use super::configuration_error::ConfigurationError;
use super::storage_error::StorageError;

/// Errors surfaced by aggregation tasks.
///
/// A failed task never fails the triggering pipeline execution — by the time
/// aggregation runs, the execution has already reported success. Transient
/// storage errors are retried with backoff; `RetriesExhausted` is what the
/// operator sees when the budget runs out.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("unknown metric '{name}' in aggregation request")]
    UnknownMetric { name: String },

    #[error("aggregation task '{task}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        task: String,
        attempts: u32,
        last_error: String,
    },

    #[error("worker pool shut down before task completed")]
    WorkerPoolShutDown,
}

impl AggregationError {
    /// Whether the retry policy should attempt this task again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}
