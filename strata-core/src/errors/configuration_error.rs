//! Metric-definition validation errors.
//!
//! All of these are rejected synchronously when a definition is created or
//! edited — a bad catalog never reaches the aggregator.

/// Errors detected while validating metric definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("cyclic input-metric dependency: {}", members.join(" -> "))]
    CyclicInputMetrics { members: Vec<String> },

    #[error("metric '{metric}' references unknown input metric '{input}'")]
    UnknownInputMetric { metric: String, input: String },

    #[error("metric '{name}' is defined more than once")]
    DuplicateMetricName { name: String },

    #[error("metric '{metric}' has no inputs (needs at least one pipeline or metric)")]
    NoInputs { metric: String },

    #[error("invalid group path '{path}': {reason}")]
    InvalidGroupPath { path: String, reason: String },
}
