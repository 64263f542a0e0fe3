//! # strata-engine
//!
//! The aggregation engine: validated metric catalog, raw-to-day and
//! cross-granularity roll-up aggregators, the execution-triggered
//! orchestrator, and the read/query layer.
//!
//! Storage is only reached through the `strata-core` trait seams, so any
//! backend implementing them plugs in.

pub mod aggregator;
pub mod catalog;
pub mod orchestrator;
pub mod reader;
pub mod worker;

pub use catalog::MetricCatalog;
pub use orchestrator::{ExecutionEvent, ExecutionReport, Orchestrator, OrchestratorState};
pub use reader::MetricReader;
pub use worker::WorkerPool;

use strata_core::traits::storage::{ActivityStore, MetricValueStore};

/// Everything an aggregation task needs from storage.
pub trait AggregationStore: MetricValueStore + ActivityStore {}

impl<T: MetricValueStore + ActivityStore + ?Sized> AggregationStore for T {}
