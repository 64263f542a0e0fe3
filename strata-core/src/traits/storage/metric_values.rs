//! `MetricValueStore` trait — materialized metric value persistence.

use chrono::NaiveDate;

use crate::errors::StorageError;
use crate::types::group::GroupPath;
use crate::types::metric::{MetricValue, VersionSelector};
use crate::types::time::{DateRange, TimeUnit};

/// One bucket write, as computed by an aggregator.
///
/// The store assigns the row version: each upsert inserts a new row with
/// `version = max(existing) + 1` in a single statement, so two concurrent
/// writers can never mint the same version.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValueUpsert {
    pub group_id: GroupPath,
    pub date: NaiveDate,
    pub time_unit: TimeUnit,
    pub group_value: f64,
    pub sub_groups_value: f64,
}

/// One page of a keyset-paginated value scan.
#[derive(Debug, Clone, Default)]
pub struct MetricValuePage {
    pub items: Vec<MetricValue>,
    /// Opaque continuation token; `None` means the scan is exhausted.
    pub next_token: Option<String>,
}

/// Persistence seam for materialized metric values.
///
/// Writes happen exclusively from the aggregation engine; the query layer
/// is read-only.
pub trait MetricValueStore: Send + Sync {
    /// Upsert a batch of buckets for one metric in a single transaction,
    /// stamping provenance. Existing buckets get a new version; reads
    /// resolving `Latest` see the new row, prior versions stay queryable.
    fn save_values(
        &self,
        metric_id: &str,
        metric_name: &str,
        pipeline_id: &str,
        execution_id: &str,
        values: &[MetricValueUpsert],
    ) -> Result<(), StorageError>;

    /// Series for exactly this group (descendants excluded).
    fn list_group_series(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
        version: VersionSelector,
    ) -> Result<Vec<MetricValue>, StorageError>;

    /// One page of the series for this group and all its descendants
    /// (prefix range scan).
    fn list_subtree_page(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
        version: VersionSelector,
        after: Option<&str>,
        limit: usize,
    ) -> Result<MetricValuePage, StorageError>;

    /// Latest series rows for the **immediate** children of `group` only.
    /// Deeper descendants are already folded into the children's own
    /// `sub_groups_value` by the bottom-up ordering.
    fn list_child_series(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
    ) -> Result<Vec<MetricValue>, StorageError>;

    /// Remove every value row for a metric (definition-delete cascade).
    fn delete_values(&self, metric_id: &str) -> Result<usize, StorageError>;
}
