pub mod activities;
pub mod metric_values;
pub mod metrics;
