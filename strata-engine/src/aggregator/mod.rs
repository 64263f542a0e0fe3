//! Aggregation kernels.
//!
//! `raw_to_day` materializes day-granularity buckets from raw activity
//! data, input metrics, and already-aggregated child groups; `rollup`
//! derives each coarser unit directly from the day series. Both write
//! through the idempotent versioned upsert, so re-running a window is safe.

pub mod raw_to_day;
pub mod rollup;

pub use raw_to_day::aggregate_group_day;
pub use rollup::roll_up_unit;
