//! Metric definitions and materialized metric values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::group::GroupPath;
use super::time::TimeUnit;

/// How raw activity rows collapse into a single per-day group value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationType {
    GroupBy,
    Sum,
    Mean,
    Max,
    Min,
    Count,
}

/// A raw activity input: one output column of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    pub pipeline_id: String,
    pub output_column: String,
}

/// A metric definition: what to aggregate and from where.
///
/// Definitions are versioned — every edit bumps `version` and leaves a
/// snapshot behind. A metric may consume raw pipeline outputs, other
/// metrics, or both; the `input_metrics` graph must be acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub id: String,
    pub name: String,
    pub aggregation_type: AggregationType,
    #[serde(default)]
    pub input_metrics: Vec<String>,
    #[serde(default)]
    pub input_pipelines: Vec<PipelineInput>,
    #[serde(default)]
    pub groups: Vec<GroupPath>,
    pub version: u32,
}

/// One materialized bucket: a metric's value for a group at a date truncated
/// to a time unit.
///
/// `group_value` is the group's own contribution (raw activity plus input
/// metrics); `sub_groups_value` is the sum of all descendant contributions.
/// Keeping them separate lets "this group only" and "group plus descendants"
/// queries both be answered without rescanning children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub group_id: GroupPath,
    pub date: NaiveDate,
    pub time_unit: TimeUnit,
    pub name: String,
    /// Monotonic row version, assigned by the store on write.
    pub version: i64,
    pub group_value: f64,
    pub sub_groups_value: f64,
    /// Provenance: the execution whose aggregation produced this row.
    pub pipeline_id: String,
    pub execution_id: String,
}

impl MetricValue {
    /// Total value for the group including all descendants.
    pub fn total(&self) -> f64 {
        self.group_value + self.sub_groups_value
    }
}

/// Which row version a read should resolve.
///
/// The store keeps every version; `Latest` resolves to the highest version
/// per bucket, `At(n)` to an exact historical snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    #[default]
    Latest,
    At(i64),
}
