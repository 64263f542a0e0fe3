//! Storage trait seams.
//!
//! The aggregation engine only ever talks to storage through these traits,
//! so the SQLite engine can be swapped for another backend without touching
//! aggregation code.

pub mod activities;
pub mod catalog;
pub mod metric_values;

pub use activities::{ActivityRow, ActivityStore, DailyTotal};
pub use catalog::MetricCatalogStore;
pub use metric_values::{MetricValuePage, MetricValueStore, MetricValueUpsert};
