//! Property tests: roll-up consistency over random day series.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use strata_core::traits::storage::{MetricValueStore, MetricValueUpsert};
use strata_core::types::metric::{AggregationType, MetricDefinition, PipelineInput};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::{GroupPath, VersionSelector};
use strata_engine::aggregator::roll_up_unit;
use strata_storage::MetricStorageEngine;

fn metric() -> MetricDefinition {
    MetricDefinition {
        id: "m-prop".to_string(),
        name: "prop:metric".to_string(),
        aggregation_type: AggregationType::Sum,
        input_metrics: Vec::new(),
        input_pipelines: vec![PipelineInput {
            pipeline_id: "pipe".to_string(),
            output_column: "v".to_string(),
        }],
        groups: vec![GroupPath::root()],
        version: 1,
    }
}

/// Random sparse day series: (day offset from 2024-01-01, group value,
/// sub-groups value).
fn day_series() -> impl Strategy<Value = Vec<(u64, f64, f64)>> {
    prop::collection::btree_map(0u64..120, (0.0f64..1000.0, 0.0f64..1000.0), 1..60)
        .prop_map(|m| m.into_iter().map(|(d, (gv, sv))| (d, gv, sv)).collect())
}

fn seed_days(
    engine: &MetricStorageEngine,
    series: &[(u64, f64, f64)],
) -> (NaiveDate, NaiveDate) {
    let origin = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let group = GroupPath::new("/usa").unwrap();
    let upserts: Vec<MetricValueUpsert> = series
        .iter()
        .map(|&(offset, gv, sv)| MetricValueUpsert {
            group_id: group.clone(),
            date: origin.checked_add_days(Days::new(offset)).unwrap(),
            time_unit: TimeUnit::Day,
            group_value: gv,
            sub_groups_value: sv,
        })
        .collect();
    engine
        .save_values("m-prop", "prop:metric", "pipe", "exec", &upserts)
        .unwrap();

    let first = upserts.iter().map(|u| u.date).min().unwrap();
    let last = upserts.iter().map(|u| u.date).max().unwrap();
    (first, last)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every coarser bucket equals the sum of the day buckets truncating
    /// into it, for each roll-up unit independently.
    #[test]
    fn coarser_bucket_equals_sum_of_days(series in day_series()) {
        let engine = Arc::new(MetricStorageEngine::open_in_memory().unwrap());
        let def = metric();
        let group = GroupPath::new("/usa").unwrap();
        let (first, last) = seed_days(&engine, &series);
        let window = DateRange::new(first, last);
        let origin = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        for unit in [TimeUnit::Week, TimeUnit::Month, TimeUnit::Quarter, TimeUnit::Year] {
            roll_up_unit(engine.as_ref(), &def, &group, unit, window, "pipe", "exec").unwrap();

            let rolled = engine
                .list_group_series(
                    "m-prop",
                    &group,
                    unit,
                    window.widen(unit),
                    VersionSelector::Latest,
                )
                .unwrap();
            prop_assert!(!rolled.is_empty());

            for bucket in &rolled {
                let (mut gv, mut sv) = (0.0, 0.0);
                for &(offset, day_gv, day_sv) in &series {
                    let day = origin.checked_add_days(Days::new(offset)).unwrap();
                    if unit.truncate(day) == bucket.date {
                        gv += day_gv;
                        sv += day_sv;
                    }
                }
                prop_assert!(approx(bucket.group_value, gv),
                    "{} bucket {}: {} != {}", unit.abbrev(), bucket.date, bucket.group_value, gv);
                prop_assert!(approx(bucket.sub_groups_value, sv));
            }
        }
    }

    /// Rolling up twice leaves the latest values unchanged.
    #[test]
    fn rollup_is_idempotent(series in day_series()) {
        let engine = Arc::new(MetricStorageEngine::open_in_memory().unwrap());
        let def = metric();
        let group = GroupPath::new("/usa").unwrap();
        let (first, last) = seed_days(&engine, &series);
        let window = DateRange::new(first, last);

        roll_up_unit(engine.as_ref(), &def, &group, TimeUnit::Month, window, "pipe", "exec").unwrap();
        let before = engine
            .list_group_series("m-prop", &group, TimeUnit::Month, window.widen(TimeUnit::Month), VersionSelector::Latest)
            .unwrap();

        roll_up_unit(engine.as_ref(), &def, &group, TimeUnit::Month, window, "pipe", "exec").unwrap();
        let after = engine
            .list_group_series("m-prop", &group, TimeUnit::Month, window.widen(TimeUnit::Month), VersionSelector::Latest)
            .unwrap();

        prop_assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            prop_assert_eq!(b.date, a.date);
            prop_assert!(approx(b.group_value, a.group_value));
            prop_assert!(approx(b.sub_groups_value, a.sub_groups_value));
            prop_assert!(a.version > b.version);
        }
    }
}
