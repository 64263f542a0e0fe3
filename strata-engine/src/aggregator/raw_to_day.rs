//! Raw-to-day aggregation for one (metric, group) over a day window.

use chrono::NaiveDate;
use tracing::debug;

use strata_core::errors::AggregationError;
use strata_core::traits::storage::MetricValueUpsert;
use strata_core::types::metric::{MetricDefinition, VersionSelector};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::{FxHashMap, GroupPath};

use crate::AggregationStore;

/// Compute and upsert this group's day buckets.
///
/// `group_value` is the group's own raw activity aggregate plus the
/// own-group day values of the declared input metrics; `sub_groups_value`
/// is the sum of the immediate children's totals. Children must already be
/// materialized (bottom-up ordering) for the subtree to be captured
/// transitively. Days never materialized and without any contribution
/// produce no row; days whose latest row lost all contributions are
/// recomputed to zero.
///
/// Returns the number of buckets written.
pub fn aggregate_group_day(
    store: &dyn AggregationStore,
    def: &MetricDefinition,
    inputs: &[&MetricDefinition],
    group: &GroupPath,
    range: DateRange,
    pipeline_id: &str,
    execution_id: &str,
) -> Result<usize, AggregationError> {
    let mut buckets: FxHashMap<NaiveDate, (f64, f64)> = FxHashMap::default();

    if !def.input_pipelines.is_empty() {
        let totals = store.aggregate_activities_by_day(
            group,
            &def.input_pipelines,
            def.aggregation_type,
            range,
        )?;
        for t in totals {
            buckets.entry(t.date).or_insert((0.0, 0.0)).0 += t.value;
        }
    }

    // Input metrics contribute their own-group value only; their subtree
    // contribution is already captured by this metric's child rows.
    for input in inputs {
        let series = store.list_group_series(
            &input.id,
            group,
            TimeUnit::Day,
            range,
            VersionSelector::Latest,
        )?;
        for row in series {
            buckets.entry(row.date).or_insert((0.0, 0.0)).0 += row.group_value;
        }
    }

    let children = store.list_child_series(&def.id, group, TimeUnit::Day, range)?;
    for row in children {
        buckets.entry(row.date).or_insert((0.0, 0.0)).1 += row.total();
    }

    // A superseded activity can move off a day that was materialized by an
    // earlier run. Such days get no fresh contribution above, so recompute
    // their still-latest nonzero rows down to zero; otherwise the stale row
    // keeps counting in the day series and every roll-up.
    let existing = store.list_group_series(
        &def.id,
        group,
        TimeUnit::Day,
        range,
        VersionSelector::Latest,
    )?;
    for row in existing {
        if row.group_value != 0.0 || row.sub_groups_value != 0.0 {
            buckets.entry(row.date).or_insert((0.0, 0.0));
        }
    }

    if buckets.is_empty() {
        debug!(metric = %def.name, group = %group.as_str(), "no day contributions in window");
        return Ok(0);
    }

    let mut upserts: Vec<MetricValueUpsert> = buckets
        .into_iter()
        .map(|(date, (group_value, sub_groups_value))| MetricValueUpsert {
            group_id: group.clone(),
            date,
            time_unit: TimeUnit::Day,
            group_value,
            sub_groups_value,
        })
        .collect();
    upserts.sort_by_key(|u| u.date);

    let written = upserts.len();
    store.save_values(&def.id, &def.name, pipeline_id, execution_id, &upserts)?;
    debug!(
        metric = %def.name,
        group = %group.as_str(),
        buckets = written,
        "materialized day values"
    );
    Ok(written)
}
