//! # strata-core
//!
//! Foundation crate for the Strata metric aggregation engine.
//! Defines all types, traits, errors, and config. Every other crate in the
//! workspace depends on this.

pub mod config;
pub mod errors;
pub mod traits;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use config::AggregationConfig;
pub use errors::{AggregationError, ConfigurationError, StorageError};
pub use types::collections::{FxHashMap, FxHashSet};
pub use types::group::GroupPath;
pub use types::metric::{
    AggregationType, MetricDefinition, MetricValue, PipelineInput, VersionSelector,
};
pub use types::time::{DateRange, TimeUnit};
