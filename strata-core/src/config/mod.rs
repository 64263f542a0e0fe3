//! Aggregation engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the aggregation subsystem.
///
/// All fields are optional in config files; `effective_*` accessors apply
/// the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AggregationConfig {
    /// Worker threads for roll-up tasks. 0 = one per roll-up unit.
    pub worker_threads: Option<usize>,
    /// Maximum attempts per aggregation task (first try included). Default: 3.
    pub max_retry_attempts: Option<u32>,
    /// Base backoff between retries in milliseconds, doubled per attempt.
    /// Default: 250.
    pub retry_backoff_ms: Option<u64>,
    /// Bound of the worker task channel. Default: 256.
    pub task_channel_bound: Option<usize>,
    /// Per-task completion timeout in milliseconds; a task that exceeds it
    /// counts as a failed attempt. Default: 30_000.
    pub task_timeout_ms: Option<u64>,
    /// Rows per page for query-layer scans. Default: 500.
    pub page_size: Option<usize>,
}

impl AggregationConfig {
    /// Parse from TOML, e.g. the `[aggregation]` section of a config file.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn effective_worker_threads(&self) -> usize {
        match self.worker_threads {
            Some(0) | None => 4,
            Some(n) => n,
        }
    }

    pub fn effective_max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts.unwrap_or(3).max(1)
    }

    pub fn effective_retry_backoff_ms(&self) -> u64 {
        self.retry_backoff_ms.unwrap_or(250)
    }

    pub fn effective_task_channel_bound(&self) -> usize {
        self.task_channel_bound.unwrap_or(256)
    }

    pub fn effective_task_timeout_ms(&self) -> u64 {
        self.task_timeout_ms.unwrap_or(30_000)
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or(500).max(1)
    }
}
