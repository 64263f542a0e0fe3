//! `MetricStorageEngine` — the storage facade.
//!
//! Implements the core storage traits by routing each call to the right
//! connection (writes through the serialized writer, reads through the
//! pool) and delegating the SQL to the `queries` modules.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use strata_core::errors::StorageError;
use strata_core::traits::storage::activities::{ActivityRow, ActivityStore, DailyTotal};
use strata_core::traits::storage::catalog::MetricCatalogStore;
use strata_core::traits::storage::metric_values::{
    MetricValuePage, MetricValueStore, MetricValueUpsert,
};
use strata_core::types::metric::{
    AggregationType, MetricDefinition, MetricValue, PipelineInput, VersionSelector,
};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::GroupPath;

use crate::connection::DatabaseManager;
use crate::queries;

#[derive(Clone)]
pub struct MetricStorageEngine {
    db: Arc<DatabaseManager>,
}

impl MetricStorageEngine {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            db: Arc::new(DatabaseManager::open(path)?),
        })
    }

    /// In-memory engine for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            db: Arc::new(DatabaseManager::open_in_memory()?),
        })
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.db.checkpoint()
    }
}

impl MetricCatalogStore for MetricStorageEngine {
    fn insert_definition(&self, def: &MetricDefinition) -> Result<(), StorageError> {
        self.db.with_writer(|conn| queries::metrics::insert(conn, def))
    }

    fn update_definition(&self, def: &MetricDefinition) -> Result<u32, StorageError> {
        self.db.with_writer(|conn| queries::metrics::update(conn, def))
    }

    fn get_definition(&self, name: &str) -> Result<Option<MetricDefinition>, StorageError> {
        self.db
            .with_reader(|conn| queries::metrics::get_by_name(conn, name))
    }

    fn get_definition_version(
        &self,
        name: &str,
        version: u32,
    ) -> Result<Option<MetricDefinition>, StorageError> {
        self.db
            .with_reader(|conn| queries::metrics::get_version(conn, name, version))
    }

    fn list_definitions(&self) -> Result<Vec<MetricDefinition>, StorageError> {
        self.db.with_reader(queries::metrics::list_all)
    }

    fn delete_definition(&self, name: &str) -> Result<Option<String>, StorageError> {
        self.db.with_writer(|conn| {
            let tx = conn.unchecked_transaction().map_err(crate::sqe)?;
            let deleted = queries::metrics::delete(&tx, name)?;
            if let Some(ref id) = deleted {
                let removed = queries::metric_values::delete_for_metric(&tx, id)?;
                debug!(metric = name, removed, "deleted definition and its values");
            }
            tx.commit().map_err(crate::sqe)?;
            Ok(deleted)
        })
    }
}

impl MetricValueStore for MetricStorageEngine {
    fn save_values(
        &self,
        metric_id: &str,
        metric_name: &str,
        pipeline_id: &str,
        execution_id: &str,
        values: &[MetricValueUpsert],
    ) -> Result<(), StorageError> {
        if values.is_empty() {
            return Ok(());
        }
        self.db.with_writer(|conn| {
            queries::metric_values::insert_batch(
                conn,
                metric_id,
                metric_name,
                pipeline_id,
                execution_id,
                values,
            )
        })
    }

    fn list_group_series(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
        version: VersionSelector,
    ) -> Result<Vec<MetricValue>, StorageError> {
        self.db.with_reader(|conn| {
            queries::metric_values::list_group_series(conn, metric_id, group, unit, range, version)
        })
    }

    fn list_subtree_page(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
        version: VersionSelector,
        after: Option<&str>,
        limit: usize,
    ) -> Result<MetricValuePage, StorageError> {
        self.db.with_reader(|conn| {
            queries::metric_values::list_subtree_page(
                conn, metric_id, group, unit, range, version, after, limit,
            )
        })
    }

    fn list_child_series(
        &self,
        metric_id: &str,
        group: &GroupPath,
        unit: TimeUnit,
        range: DateRange,
    ) -> Result<Vec<MetricValue>, StorageError> {
        self.db.with_reader(|conn| {
            queries::metric_values::list_child_series(conn, metric_id, group, unit, range)
        })
    }

    fn delete_values(&self, metric_id: &str) -> Result<usize, StorageError> {
        self.db
            .with_writer(|conn| queries::metric_values::delete_for_metric(conn, metric_id))
    }
}

impl ActivityStore for MetricStorageEngine {
    fn insert_activities(&self, rows: &[ActivityRow]) -> Result<usize, StorageError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.db
            .with_writer(|conn| queries::activities::insert_batch(conn, rows))
    }

    fn aggregate_activities_by_day(
        &self,
        group: &GroupPath,
        inputs: &[PipelineInput],
        agg: AggregationType,
        range: DateRange,
    ) -> Result<Vec<DailyTotal>, StorageError> {
        self.db.with_reader(|conn| {
            queries::activities::aggregate_by_day(conn, group, inputs, agg, range)
        })
    }

    fn affected_date_range(
        &self,
        pipeline_id: &str,
        execution_id: &str,
    ) -> Result<Option<DateRange>, StorageError> {
        self.db.with_reader(|conn| {
            queries::activities::affected_date_range(conn, pipeline_id, execution_id)
        })
    }
}
