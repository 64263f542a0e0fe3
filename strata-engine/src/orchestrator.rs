//! Execution-triggered orchestration.
//!
//! Drives aggregation after a pipeline execution reports success:
//! discover the affected day window from the activity rows the execution
//! wrote, run raw-to-day bottom-up along the group path for every affected
//! metric in dependency order, then roll each coarser unit up in parallel.
//!
//! Failures are retried with backoff and, once the budget is exhausted,
//! recorded on the report — they never propagate back to the triggering
//! execution, which has already succeeded by the time any of this runs.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, warn};

use strata_core::errors::AggregationError;
use strata_core::types::metric::MetricDefinition;
use strata_core::types::time::{DateRange, TimeUnit, ROLLUP_UNITS};
use strata_core::{AggregationConfig, GroupPath};

use crate::aggregator::{aggregate_group_day, roll_up_unit};
use crate::catalog::MetricCatalog;
use crate::worker::WorkerPool;
use crate::AggregationStore;

/// States of one execution's aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    RawToDayRequested,
    RawToDayComplete,
    RollUpRequested,
    Complete,
    Failed,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RawToDayRequested => "raw-to-day-requested",
            Self::RawToDayComplete => "raw-to-day-complete",
            Self::RollUpRequested => "roll-up-requested",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A successful pipeline execution, as reported by the pipeline processor.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub pipeline_id: String,
    pub execution_id: String,
    /// The group the execution ran under; aggregation walks from here to
    /// the root.
    pub group_id: GroupPath,
}

/// Outcome of one aggregation run.
#[derive(Debug)]
pub struct ExecutionReport {
    pub state: OrchestratorState,
    /// The day window aggregated, widened to whole months. `None` when the
    /// execution wrote no activity rows.
    pub window: Option<DateRange>,
    pub day_buckets: usize,
    pub rollup_buckets: usize,
    /// Task names that exhausted their retry budget.
    pub failed_tasks: Vec<String>,
}

impl ExecutionReport {
    fn empty(state: OrchestratorState) -> Self {
        Self {
            state,
            window: None,
            day_buckets: 0,
            rollup_buckets: 0,
            failed_tasks: Vec::new(),
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn AggregationStore>,
    catalog: Arc<MetricCatalog>,
    config: AggregationConfig,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn AggregationStore>,
        catalog: Arc<MetricCatalog>,
        config: AggregationConfig,
    ) -> std::io::Result<Self> {
        let pool = WorkerPool::new(
            config.effective_worker_threads(),
            config.effective_task_channel_bound(),
        )?;
        Ok(Self {
            store,
            catalog,
            config,
            pool,
        })
    }

    /// Run the full aggregation state machine for one finished execution.
    pub fn process_execution(&self, event: &ExecutionEvent) -> ExecutionReport {
        let mut state = OrchestratorState::Idle;

        let window = match self.discover_window(event) {
            Ok(Some(range)) => range.widen(TimeUnit::Month),
            Ok(None) => {
                debug!(
                    execution = %event.execution_id,
                    "execution wrote no activity rows, nothing to aggregate"
                );
                return ExecutionReport::empty(OrchestratorState::Complete);
            }
            Err(e) => {
                warn!(execution = %event.execution_id, error = %e, "window discovery failed");
                let mut report = ExecutionReport::empty(OrchestratorState::Failed);
                report.failed_tasks.push("affected-window".to_string());
                return report;
            }
        };

        let affected = self.catalog.affected_by_pipeline(&event.pipeline_id);
        if affected.is_empty() {
            debug!(pipeline = %event.pipeline_id, "no metrics consume this pipeline");
            return ExecutionReport::empty(OrchestratorState::Complete);
        }
        let seeds: Vec<&str> = affected.iter().map(|d| d.name.as_str()).collect();
        let order = self.catalog.aggregation_order(&seeds);

        // Leaf to root; each level reads the committed results of the one
        // below it.
        let path = event.group_id.ancestry();

        let mut report = ExecutionReport {
            state,
            window: Some(window),
            day_buckets: 0,
            rollup_buckets: 0,
            failed_tasks: Vec::new(),
        };

        self.transition(&mut state, OrchestratorState::RawToDayRequested, event);
        self.run_raw_to_day(event, &order, &path, window, &mut report);
        self.transition(&mut state, OrchestratorState::RawToDayComplete, event);

        self.transition(&mut state, OrchestratorState::RollUpRequested, event);
        self.run_rollups(event, &order, &path, window, &mut report);

        let terminal = if report.failed_tasks.is_empty() {
            OrchestratorState::Complete
        } else {
            OrchestratorState::Failed
        };
        self.transition(&mut state, terminal, event);
        report.state = state;

        info!(
            execution = %event.execution_id,
            state = %report.state,
            day_buckets = report.day_buckets,
            rollup_buckets = report.rollup_buckets,
            failed = report.failed_tasks.len(),
            "aggregation run finished"
        );
        report
    }

    /// Stop the worker pool, waiting for in-flight tasks.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    fn transition(&self, state: &mut OrchestratorState, to: OrchestratorState, event: &ExecutionEvent) {
        debug!(execution = %event.execution_id, from = %state, to = %to, "state transition");
        *state = to;
    }

    fn discover_window(&self, event: &ExecutionEvent) -> Result<Option<DateRange>, AggregationError> {
        let attempts = self.config.effective_max_retry_attempts();
        let mut last = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(self.backoff(attempt));
            }
            match self
                .store
                .affected_date_range(&event.pipeline_id, &event.execution_id)
            {
                Ok(range) => return Ok(range),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %e, "transient error discovering window");
                    last = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        // Unreachable: the loop always returns on its last attempt.
        Err(last
            .map(AggregationError::from)
            .unwrap_or(AggregationError::WorkerPoolShutDown))
    }

    /// Strictly sequenced: metric tiers in dependency order, groups bottom-up.
    fn run_raw_to_day(
        &self,
        event: &ExecutionEvent,
        order: &[&MetricDefinition],
        path: &[GroupPath],
        window: DateRange,
        report: &mut ExecutionReport,
    ) {
        for def in order {
            let inputs: Vec<MetricDefinition> =
                self.catalog.inputs_of(def).into_iter().cloned().collect();
            for group in path {
                let task_name = format!("raw-to-day {} {}", def.name, group.as_str());
                let job = self.day_job(event, def, &inputs, group, window);
                match self.run_with_retries(&task_name, job) {
                    Ok(buckets) => report.day_buckets += buckets,
                    Err(e) => {
                        warn!(task = %task_name, error = %e, "task abandoned");
                        report.failed_tasks.push(task_name);
                    }
                }
            }
        }
    }

    /// Roll-up units fan out to the pool in parallel per (metric, group);
    /// stragglers and transient failures are retried sequentially after the
    /// first round.
    fn run_rollups(
        &self,
        event: &ExecutionEvent,
        order: &[&MetricDefinition],
        path: &[GroupPath],
        window: DateRange,
        report: &mut ExecutionReport,
    ) {
        let timeout = self.task_timeout();
        for def in order {
            for group in path {
                let mut in_flight = Vec::with_capacity(ROLLUP_UNITS.len());
                for unit in ROLLUP_UNITS {
                    let task_name =
                        format!("roll-up {} {} {}", def.name, group.as_str(), unit.abbrev());
                    let job = self.rollup_job(event, def, group, unit, window);
                    match self.pool.submit(job.clone()) {
                        Ok(rx) => in_flight.push((task_name, job, rx)),
                        Err(_) => {
                            warn!(task = %task_name, "worker pool unavailable");
                            report.failed_tasks.push(task_name);
                        }
                    }
                }
                for (task_name, job, rx) in in_flight {
                    match rx.recv_timeout(timeout) {
                        Ok(Ok(buckets)) => report.rollup_buckets += buckets,
                        Ok(Err(e)) if !e.is_transient() => {
                            warn!(task = %task_name, error = %e, "task abandoned");
                            report.failed_tasks.push(task_name);
                        }
                        // Transient failure or timeout: give it the full
                        // sequential retry budget.
                        _ => match self.run_with_retries(&task_name, job) {
                            Ok(buckets) => report.rollup_buckets += buckets,
                            Err(e) => {
                                warn!(task = %task_name, error = %e, "task abandoned");
                                report.failed_tasks.push(task_name);
                            }
                        },
                    }
                }
            }
        }
    }

    fn day_job(
        &self,
        event: &ExecutionEvent,
        def: &MetricDefinition,
        inputs: &[MetricDefinition],
        group: &GroupPath,
        window: DateRange,
    ) -> impl Fn() -> Result<usize, AggregationError> + Send + Clone + 'static {
        let store = Arc::clone(&self.store);
        let def = def.clone();
        let inputs = inputs.to_vec();
        let group = group.clone();
        let pipeline_id = event.pipeline_id.clone();
        let execution_id = event.execution_id.clone();
        move || {
            let input_refs: Vec<&MetricDefinition> = inputs.iter().collect();
            aggregate_group_day(
                store.as_ref(),
                &def,
                &input_refs,
                &group,
                window,
                &pipeline_id,
                &execution_id,
            )
        }
    }

    fn rollup_job(
        &self,
        event: &ExecutionEvent,
        def: &MetricDefinition,
        group: &GroupPath,
        unit: TimeUnit,
        window: DateRange,
    ) -> impl Fn() -> Result<usize, AggregationError> + Send + Clone + 'static {
        let store = Arc::clone(&self.store);
        let def = def.clone();
        let group = group.clone();
        let pipeline_id = event.pipeline_id.clone();
        let execution_id = event.execution_id.clone();
        move || {
            roll_up_unit(
                store.as_ref(),
                &def,
                &group,
                unit,
                window,
                &pipeline_id,
                &execution_id,
            )
        }
    }

    /// Dispatch a task to the pool and wait, retrying transient failures
    /// and timeouts with doubling backoff up to the attempt budget.
    fn run_with_retries<F>(&self, task_name: &str, job: F) -> Result<usize, AggregationError>
    where
        F: Fn() -> Result<usize, AggregationError> + Send + Clone + 'static,
    {
        let attempts = self.config.effective_max_retry_attempts();
        let timeout = self.task_timeout();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(self.backoff(attempt));
                debug!(task = %task_name, attempt, "retrying");
            }
            let rx = match self.pool.submit(job.clone()) {
                Ok(rx) => rx,
                Err(_) => return Err(AggregationError::WorkerPoolShutDown),
            };
            match rx.recv_timeout(timeout) {
                Ok(Ok(buckets)) => return Ok(buckets),
                Ok(Err(e)) if e.is_transient() => {
                    warn!(task = %task_name, attempt, error = %e, "transient task failure");
                    last_error = e.to_string();
                }
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(task = %task_name, attempt, "task timed out");
                    last_error = "timed out".to_string();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AggregationError::WorkerPoolShutDown)
                }
            }
        }

        Err(AggregationError::RetriesExhausted {
            task: task_name.to_string(),
            attempts,
            last_error,
        })
    }

    fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.config.effective_task_timeout_ms())
    }

    /// Base backoff doubled per retry: attempt 2 waits the base, attempt 3
    /// twice that, and so on.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.effective_retry_backoff_ms();
        Duration::from_millis(base.saturating_mul(1 << (attempt.saturating_sub(2)).min(16)))
    }
}
