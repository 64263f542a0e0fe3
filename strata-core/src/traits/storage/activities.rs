//! `ActivityStore` trait — raw activity data consumed by aggregation.
//!
//! Activity rows are written by pipeline executions (outside this
//! workspace's scope); the aggregation engine only reads day-level
//! summaries from them. The insert method exists so executions — and
//! tests — have a door to push rows through.

use chrono::NaiveDate;

use crate::errors::StorageError;
use crate::types::group::GroupPath;
use crate::types::metric::AggregationType;
use crate::types::metric::PipelineInput;
use crate::types::time::DateRange;

/// One raw activity output value.
///
/// `activity_key` identifies the logical activity; re-emitting the same key
/// supersedes the previous value — only the most recent `created_at` per
/// (key, output column) participates in aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub activity_key: String,
    pub group_id: GroupPath,
    pub pipeline_id: String,
    pub execution_id: String,
    pub output_column: String,
    pub date: NaiveDate,
    pub value: f64,
    pub created_at: i64,
}

/// A per-day aggregate of raw activity values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub value: f64,
}

/// Read (and test-write) seam over raw activity data.
pub trait ActivityStore: Send + Sync {
    fn insert_activities(&self, rows: &[ActivityRow]) -> Result<usize, StorageError>;

    /// Collapse raw activity values into one total per day for exactly this
    /// group, over the given pipeline inputs, using the metric's aggregate
    /// function. Days without data are absent from the result.
    fn aggregate_activities_by_day(
        &self,
        group: &GroupPath,
        inputs: &[PipelineInput],
        agg: AggregationType,
        range: DateRange,
    ) -> Result<Vec<DailyTotal>, StorageError>;

    /// The min/max activity dates written by an execution, or `None` if the
    /// execution produced no rows.
    fn affected_date_range(
        &self,
        pipeline_id: &str,
        execution_id: &str,
    ) -> Result<Option<DateRange>, StorageError>;
}
