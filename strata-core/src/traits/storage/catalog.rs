//! `MetricCatalogStore` trait — metric definition persistence.

use crate::errors::StorageError;
use crate::types::metric::MetricDefinition;

/// Persistence seam for metric definitions.
///
/// Definitions are versioned: the latest row is updated in place with a
/// bumped version while the previous state is snapshotted, so point-in-time
/// reads stay possible. Semantic validation (cycles, unknown references)
/// happens in the engine's catalog before anything reaches this trait.
pub trait MetricCatalogStore: Send + Sync {
    fn insert_definition(&self, def: &MetricDefinition) -> Result<(), StorageError>;

    /// Update an existing definition. Increments the stored version by one
    /// atomically and snapshots the replaced state. Returns the new version.
    fn update_definition(&self, def: &MetricDefinition) -> Result<u32, StorageError>;

    fn get_definition(&self, name: &str) -> Result<Option<MetricDefinition>, StorageError>;

    /// A historical snapshot of a definition.
    fn get_definition_version(
        &self,
        name: &str,
        version: u32,
    ) -> Result<Option<MetricDefinition>, StorageError>;

    fn list_definitions(&self) -> Result<Vec<MetricDefinition>, StorageError>;

    /// Delete a definition, its snapshots, and (via the value-store cascade)
    /// all materialized values. Returns the deleted definition's id.
    fn delete_definition(&self, name: &str) -> Result<Option<String>, StorageError>;
}
