//! End-to-end aggregation runs against the real SQLite engine.

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use strata_core::traits::storage::{ActivityRow, ActivityStore, MetricValueStore};
use strata_core::types::metric::{AggregationType, MetricDefinition, PipelineInput};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::{AggregationConfig, GroupPath, VersionSelector};
use strata_engine::{ExecutionEvent, MetricCatalog, MetricReader, Orchestrator, OrchestratorState};
use strata_storage::MetricStorageEngine;

const PIPELINE: &str = "pipe-ghg";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn group(path: &str) -> GroupPath {
    GroupPath::new(path).unwrap()
}

fn base_metric() -> MetricDefinition {
    MetricDefinition {
        id: "m-co2e".to_string(),
        name: "ghg:co2e".to_string(),
        aggregation_type: AggregationType::Sum,
        input_metrics: Vec::new(),
        input_pipelines: vec![PipelineInput {
            pipeline_id: PIPELINE.to_string(),
            output_column: "co2e".to_string(),
        }],
        groups: vec![GroupPath::root()],
        version: 1,
    }
}

fn derived_metric() -> MetricDefinition {
    MetricDefinition {
        id: "m-scope-total".to_string(),
        name: "ghg:scope-total".to_string(),
        aggregation_type: AggregationType::Sum,
        input_metrics: vec!["ghg:co2e".to_string()],
        input_pipelines: Vec::new(),
        groups: vec![GroupPath::root()],
        version: 1,
    }
}

struct Harness {
    engine: Arc<MetricStorageEngine>,
    orchestrator: Orchestrator,
    _dir: TempDir,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(definitions: Vec<MetricDefinition>) -> Harness {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MetricStorageEngine::open(&dir.path().join("strata.db")).unwrap());
    let catalog = Arc::new(MetricCatalog::build(definitions).unwrap());
    let config = AggregationConfig {
        worker_threads: Some(2),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(engine.clone(), catalog, config).unwrap();
    Harness {
        engine,
        orchestrator,
        _dir: dir,
    }
}

fn activity(key: &str, path: &str, d: NaiveDate, value: f64) -> ActivityRow {
    ActivityRow {
        activity_key: key.to_string(),
        group_id: group(path),
        pipeline_id: PIPELINE.to_string(),
        execution_id: "exec-1".to_string(),
        output_column: "co2e".to_string(),
        date: d,
        value,
        created_at: 1,
    }
}

fn event(path: &str) -> ExecutionEvent {
    ExecutionEvent {
        pipeline_id: PIPELINE.to_string(),
        execution_id: "exec-1".to_string(),
        group_id: group(path),
    }
}

/// Latest (group_value, sub_groups_value) for one bucket.
fn bucket(
    engine: &MetricStorageEngine,
    metric_id: &str,
    path: &str,
    unit: TimeUnit,
    d: NaiveDate,
) -> Option<(f64, f64)> {
    let series = engine
        .list_group_series(
            metric_id,
            &group(path),
            unit,
            DateRange::new(d, d),
            VersionSelector::Latest,
        )
        .unwrap();
    series
        .first()
        .map(|v| (v.group_value, v.sub_groups_value))
}

#[test]
fn denver_colorado_decomposition() {
    let h = harness(vec![base_metric()]);
    let d = date(2024, 3, 5);

    h.engine
        .insert_activities(&[
            activity("a-denver", "/usa/colorado/denver", d, 100.0),
            activity("a-colorado", "/usa/colorado", d, 50.0),
        ])
        .unwrap();

    let report = h.orchestrator.process_execution(&event("/usa/colorado/denver"));
    assert_eq!(report.state, OrchestratorState::Complete);
    assert!(report.failed_tasks.is_empty());

    // Denver: own 100, no children.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado/denver", TimeUnit::Day, d),
        Some((100.0, 0.0))
    );
    // Colorado: own 50, denver's total below it.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado", TimeUnit::Day, d),
        Some((50.0, 100.0))
    );
    // USA: nothing of its own, colorado's total below it.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa", TimeUnit::Day, d),
        Some((0.0, 150.0))
    );
    // Root sees the whole tree.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/", TimeUnit::Day, d),
        Some((0.0, 150.0))
    );
}

#[test]
fn month_rollup_preserves_decomposition() {
    let h = harness(vec![base_metric()]);

    h.engine
        .insert_activities(&[
            activity("a1", "/usa/colorado/denver", date(2024, 3, 5), 100.0),
            activity("a2", "/usa/colorado", date(2024, 3, 5), 50.0),
            activity("a3", "/usa/colorado/denver", date(2024, 3, 20), 30.0),
        ])
        .unwrap();

    let report = h.orchestrator.process_execution(&event("/usa/colorado/denver"));
    assert_eq!(report.state, OrchestratorState::Complete);

    let march = date(2024, 3, 1);
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado/denver", TimeUnit::Month, march),
        Some((130.0, 0.0))
    );
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado", TimeUnit::Month, march),
        Some((50.0, 130.0))
    );

    // Quarter and year come straight from day data too.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado", TimeUnit::Quarter, date(2024, 1, 1)),
        Some((50.0, 130.0))
    );
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado", TimeUnit::Year, date(2024, 1, 1)),
        Some((50.0, 130.0))
    );
}

#[test]
fn rerun_is_idempotent() {
    let h = harness(vec![base_metric()]);
    let d = date(2024, 3, 5);

    h.engine
        .insert_activities(&[
            activity("a-denver", "/usa/colorado/denver", d, 100.0),
            activity("a-colorado", "/usa/colorado", d, 50.0),
        ])
        .unwrap();

    let first = h.orchestrator.process_execution(&event("/usa/colorado/denver"));
    assert_eq!(first.state, OrchestratorState::Complete);
    let second = h.orchestrator.process_execution(&event("/usa/colorado/denver"));
    assert_eq!(second.state, OrchestratorState::Complete);

    // Same values, no double counting; the re-run just minted new versions.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa/colorado", TimeUnit::Day, d),
        Some((50.0, 100.0))
    );
    let series = h
        .engine
        .list_group_series(
            "m-co2e",
            &group("/usa/colorado"),
            TimeUnit::Day,
            DateRange::new(d, d),
            VersionSelector::Latest,
        )
        .unwrap();
    assert_eq!(series.len(), 1);
    assert!(series[0].version >= 2);
}

#[test]
fn derived_metric_sees_fresh_inputs() {
    let h = harness(vec![base_metric(), derived_metric()]);
    let d = date(2024, 3, 5);

    h.engine
        .insert_activities(&[
            activity("a-denver", "/usa/colorado/denver", d, 100.0),
            activity("a-colorado", "/usa/colorado", d, 50.0),
        ])
        .unwrap();

    let report = h.orchestrator.process_execution(&event("/usa/colorado/denver"));
    assert_eq!(report.state, OrchestratorState::Complete);

    // The derived metric mirrors its input's own-group values, with its own
    // child rows carrying the subtree.
    assert_eq!(
        bucket(&h.engine, "m-scope-total", "/usa/colorado/denver", TimeUnit::Day, d),
        Some((100.0, 0.0))
    );
    assert_eq!(
        bucket(&h.engine, "m-scope-total", "/usa/colorado", TimeUnit::Day, d),
        Some((50.0, 100.0))
    );
}

#[test]
fn superseded_activity_drops_out_of_its_old_date() {
    let h = harness(vec![base_metric()]);

    // First execution lands the activity on March 5.
    h.engine
        .insert_activities(&[activity("a1", "/usa", date(2024, 3, 5), 10.0)])
        .unwrap();
    let first = h.orchestrator.process_execution(&event("/usa"));
    assert_eq!(first.state, OrchestratorState::Complete);
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa", TimeUnit::Day, date(2024, 3, 5)),
        Some((10.0, 0.0))
    );

    // The same activity key is re-emitted on March 20. After the re-run the
    // old date must come down to zero instead of staying live alongside the
    // new one.
    let mut moved = activity("a1", "/usa", date(2024, 3, 20), 10.0);
    moved.execution_id = "exec-2".to_string();
    moved.created_at = 2;
    h.engine.insert_activities(&[moved]).unwrap();

    let second = h.orchestrator.process_execution(&ExecutionEvent {
        pipeline_id: PIPELINE.to_string(),
        execution_id: "exec-2".to_string(),
        group_id: group("/usa"),
    });
    assert_eq!(second.state, OrchestratorState::Complete);

    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa", TimeUnit::Day, date(2024, 3, 5)),
        Some((0.0, 0.0))
    );
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa", TimeUnit::Day, date(2024, 3, 20)),
        Some((10.0, 0.0))
    );
    // The month carries the value exactly once.
    assert_eq!(
        bucket(&h.engine, "m-co2e", "/usa", TimeUnit::Month, date(2024, 3, 1)),
        Some((10.0, 0.0))
    );
}

#[test]
fn execution_without_activities_completes_empty() {
    let h = harness(vec![base_metric()]);

    let report = h.orchestrator.process_execution(&event("/usa"));
    assert_eq!(report.state, OrchestratorState::Complete);
    assert!(report.window.is_none());
    assert_eq!(report.day_buckets, 0);
}

#[test]
fn unrelated_pipeline_is_ignored() {
    let h = harness(vec![base_metric()]);
    let d = date(2024, 3, 5);

    let mut row = activity("a1", "/usa", d, 9.0);
    row.pipeline_id = "pipe-other".to_string();
    h.engine.insert_activities(&[row]).unwrap();

    let report = h.orchestrator.process_execution(&ExecutionEvent {
        pipeline_id: "pipe-other".to_string(),
        execution_id: "exec-1".to_string(),
        group_id: group("/usa"),
    });
    assert_eq!(report.state, OrchestratorState::Complete);
    assert_eq!(report.day_buckets, 0);
    assert_eq!(bucket(&h.engine, "m-co2e", "/usa", TimeUnit::Day, d), None);
}

#[test]
fn reader_assembles_subtree_across_pages() {
    let h = harness(vec![base_metric()]);
    let d = date(2024, 3, 5);

    h.engine
        .insert_activities(&[
            activity("a1", "/usa/colorado/denver", d, 100.0),
            activity("a2", "/usa/colorado", d, 50.0),
            activity("a3", "/usa/texas", d, 25.0),
        ])
        .unwrap();
    // Two separate triggering groups; same execution data.
    h.orchestrator.process_execution(&event("/usa/colorado/denver"));
    h.orchestrator.process_execution(&event("/usa/texas"));

    let store: Arc<dyn MetricValueStore> = h.engine.clone();
    let config = AggregationConfig {
        page_size: Some(2), // force the reader through several pages
        ..Default::default()
    };
    let reader = MetricReader::new(store, &config);

    let series = reader
        .list_subtree_series(
            "m-co2e",
            &group("/usa"),
            TimeUnit::Day,
            DateRange::new(d, d),
            VersionSelector::Latest,
        )
        .unwrap();

    let groups: Vec<&str> = series.iter().map(|v| v.group_id.as_str()).collect();
    assert_eq!(
        groups,
        vec!["/usa", "/usa/colorado", "/usa/colorado/denver", "/usa/texas"]
    );

    // Decomposition holds across the whole materialized tree.
    for value in &series {
        let children = h
            .engine
            .list_child_series("m-co2e", &value.group_id, TimeUnit::Day, DateRange::new(d, d))
            .unwrap();
        let child_total: f64 = children.iter().map(|c| c.total()).sum();
        assert_eq!(value.sub_groups_value, child_total);
    }
}
