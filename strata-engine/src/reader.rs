//! Read/query layer over materialized metric values.

use std::sync::Arc;

use strata_core::errors::AggregationError;
use strata_core::traits::storage::MetricValueStore;
use strata_core::types::metric::{MetricValue, VersionSelector};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::{AggregationConfig, GroupPath};

/// Serves materialized series to API consumers.
///
/// Subtree scans page through the store internally (keyset tokens) and
/// return the assembled series; callers never see pagination.
pub struct MetricReader {
    store: Arc<dyn MetricValueStore>,
    page_size: usize,
}

impl MetricReader {
    pub fn new(store: Arc<dyn MetricValueStore>, config: &AggregationConfig) -> Self {
        Self {
            store,
            page_size: config.effective_page_size(),
        }
    }

    /// Series for exactly this group. `version` defaults to latest via
    /// [`VersionSelector::default`].
    pub fn list_own_series(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
        version: VersionSelector,
    ) -> Result<Vec<MetricValue>, AggregationError> {
        Ok(self
            .store
            .list_group_series(metric_id, group, unit, range, version)?)
    }

    /// Series for the group and all of its descendants, ordered by
    /// (group, date).
    pub fn list_subtree_series(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
        version: VersionSelector,
    ) -> Result<Vec<MetricValue>, AggregationError> {
        let mut series = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.store.list_subtree_page(
                metric_id,
                group,
                unit,
                range,
                version,
                token.as_deref(),
                self.page_size,
            )?;
            series.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(series),
            }
        }
    }
}
