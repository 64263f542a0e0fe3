//! Cross-granularity roll-up: day series into one coarser unit.

use chrono::NaiveDate;
use tracing::{debug, warn};

use strata_core::errors::AggregationError;
use strata_core::traits::storage::MetricValueUpsert;
use strata_core::types::metric::{MetricDefinition, VersionSelector};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::{FxHashMap, GroupPath};

use crate::AggregationStore;

/// Roll this group's day series up into `unit` buckets.
///
/// Each coarser unit is derived directly from day granularity, never by
/// chaining through an intermediate unit, so rounding and double-counting
/// cannot compound. The window is widened to whole `unit` periods first so
/// every touched bucket is recomputed from its complete day coverage. The
/// day rows already carry the input-metric and child contributions, so the
/// roll-up is a plain per-field sum.
///
/// Returns the number of buckets written.
pub fn roll_up_unit(
    store: &dyn AggregationStore,
    def: &MetricDefinition,
    group: &GroupPath,
    unit: TimeUnit,
    day_range: DateRange,
    pipeline_id: &str,
    execution_id: &str,
) -> Result<usize, AggregationError> {
    debug_assert!(unit != TimeUnit::Day);

    let widened = day_range.widen(unit);
    let days = store.list_group_series(
        &def.id,
        group,
        TimeUnit::Day,
        widened,
        VersionSelector::Latest,
    )?;

    if days.is_empty() {
        // Day data hasn't landed (or was sparse) for the whole window; the
        // coarser series just stays stale until the next run.
        warn!(
            metric = %def.name,
            group = %group.as_str(),
            unit = unit.abbrev(),
            from = %widened.from,
            to = %widened.to,
            "no day data under roll-up window"
        );
        return Ok(0);
    }

    let mut buckets: FxHashMap<NaiveDate, (f64, f64)> = FxHashMap::default();
    for row in days {
        let bucket = buckets.entry(unit.truncate(row.date)).or_insert((0.0, 0.0));
        bucket.0 += row.group_value;
        bucket.1 += row.sub_groups_value;
    }

    let mut upserts: Vec<MetricValueUpsert> = buckets
        .into_iter()
        .map(|(date, (group_value, sub_groups_value))| MetricValueUpsert {
            group_id: group.clone(),
            date,
            time_unit: unit,
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
        unit = unit.abbrev(),
        buckets = written,
        "rolled up"
    );
    Ok(written)
}
