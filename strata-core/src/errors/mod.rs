mod aggregation_error;
mod configuration_error;
mod storage_error;

pub use aggregation_error::AggregationError;
pub use configuration_error::ConfigurationError;
pub use storage_error::StorageError;
