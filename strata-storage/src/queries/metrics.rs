//! metrics / metric_versions table queries.
//!
//! The list-shaped definition fields (input metrics, input pipelines,
//! groups) are stored as JSON text columns; the scalar fields get real
//! columns so they stay queryable.

use rusqlite::{params, Connection, OptionalExtension};

use strata_core::errors::StorageError;
use strata_core::types::metric::{AggregationType, MetricDefinition, PipelineInput};
use strata_core::GroupPath;

use crate::sqe;

pub fn insert(conn: &Connection, def: &MetricDefinition) -> Result<(), StorageError> {
    let (input_metrics, input_pipelines, groups) = encode_lists(def)?;
    let tx = conn.unchecked_transaction().map_err(sqe)?;
    tx.execute(
        "INSERT INTO metrics
         (id, name, aggregation_type, input_metrics, input_pipelines, groups_json, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
        params![def.id, def.name, agg_to_str(def.aggregation_type), input_metrics, input_pipelines, groups],
    )
    .map_err(sqe)?;
    snapshot(&tx, &def.name)?;
    tx.commit().map_err(sqe)?;
    Ok(())
}

/// Replace a definition's fields and bump its version atomically in the
/// UPDATE itself (never read-then-write), then snapshot the new state.
/// Returns the new version.
pub fn update(conn: &Connection, def: &MetricDefinition) -> Result<u32, StorageError> {
    let (input_metrics, input_pipelines, groups) = encode_lists(def)?;
    let tx = conn.unchecked_transaction().map_err(sqe)?;
    let new_version: u32 = tx
        .query_row(
            "UPDATE metrics
             SET aggregation_type = ?2, input_metrics = ?3, input_pipelines = ?4,
                 groups_json = ?5, version = version + 1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE name = ?1
             RETURNING version",
            params![def.name, agg_to_str(def.aggregation_type), input_metrics, input_pipelines, groups],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqe)?
        .ok_or_else(|| StorageError::NotFound {
            entity: "metric",
            id: def.name.clone(),
        })?;
    snapshot(&tx, &def.name)?;
    tx.commit().map_err(sqe)?;
    Ok(new_version)
}

/// Copy the current latest row into metric_versions.
fn snapshot(conn: &Connection, name: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO metric_versions
         (id, name, aggregation_type, input_metrics, input_pipelines, groups_json, version)
         SELECT id, name, aggregation_type, input_metrics, input_pipelines, groups_json, version
         FROM metrics WHERE name = ?1",
        params![name],
    )
    .map_err(sqe)?;
    Ok(())
}

pub fn get_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<MetricDefinition>, StorageError> {
    conn.prepare_cached(
        "SELECT id, name, aggregation_type, input_metrics, input_pipelines, groups_json, version
         FROM metrics WHERE name = ?1",
    )
    .map_err(sqe)?
    .query_row(params![name], map_definition_row)
    .optional()
    .map_err(sqe)?
    .transpose()
}

pub fn get_version(
    conn: &Connection,
    name: &str,
    version: u32,
) -> Result<Option<MetricDefinition>, StorageError> {
    conn.prepare_cached(
        "SELECT id, name, aggregation_type, input_metrics, input_pipelines, groups_json, version
         FROM metric_versions WHERE name = ?1 AND version = ?2",
    )
    .map_err(sqe)?
    .query_row(params![name, version], map_definition_row)
    .optional()
    .map_err(sqe)?
    .transpose()
}

pub fn list_all(conn: &Connection) -> Result<Vec<MetricDefinition>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, name, aggregation_type, input_metrics, input_pipelines, groups_json, version
             FROM metrics ORDER BY name",
        )
        .map_err(sqe)?;
    let rows = stmt.query_map([], map_definition_row).map_err(sqe)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(sqe)??);
    }
    Ok(result)
}

/// Delete the latest row and every snapshot. Returns the metric id so the
/// caller can cascade to metric_values.
pub fn delete(conn: &Connection, name: &str) -> Result<Option<String>, StorageError> {
    let id: Option<String> = conn
        .query_row("SELECT id FROM metrics WHERE name = ?1", params![name], |row| row.get(0))
        .optional()
        .map_err(sqe)?;
    if id.is_some() {
        conn.execute("DELETE FROM metrics WHERE name = ?1", params![name])
            .map_err(sqe)?;
        conn.execute("DELETE FROM metric_versions WHERE name = ?1", params![name])
            .map_err(sqe)?;
    }
    Ok(id)
}

// ─── row mapping ────────────────────────────────────────────────────

type DefinitionResult = Result<MetricDefinition, StorageError>;

fn map_definition_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DefinitionResult> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let agg: String = row.get(2)?;
    let input_metrics: String = row.get(3)?;
    let input_pipelines: String = row.get(4)?;
    let groups: String = row.get(5)?;
    let version: u32 = row.get(6)?;

    Ok(decode_definition(id, name, agg, input_metrics, input_pipelines, groups, version))
}

fn decode_definition(
    id: String,
    name: String,
    agg: String,
    input_metrics: String,
    input_pipelines: String,
    groups: String,
    version: u32,
) -> DefinitionResult {
    let aggregation_type = agg_from_str(&agg).ok_or_else(|| StorageError::SqliteError {
        message: format!("metric '{name}': unknown aggregation type '{agg}'"),
    })?;
    let input_metrics: Vec<String> = decode_json(&name, "input_metrics", &input_metrics)?;
    let input_pipelines: Vec<PipelineInput> = decode_json(&name, "input_pipelines", &input_pipelines)?;
    let groups: Vec<GroupPath> = decode_json(&name, "groups_json", &groups)?;

    Ok(MetricDefinition {
        id,
        name,
        aggregation_type,
        input_metrics,
        input_pipelines,
        groups,
        version,
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(
    metric: &str,
    column: &str,
    raw: &str,
) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::SqliteError {
        message: format!("metric '{metric}': corrupt {column} column: {e}"),
    })
}

fn encode_lists(def: &MetricDefinition) -> Result<(String, String, String), StorageError> {
    let input_metrics = serde_json::to_string(&def.input_metrics).map_err(json_err)?;
    let input_pipelines = serde_json::to_string(&def.input_pipelines).map_err(json_err)?;
    let groups = serde_json::to_string(&def.groups).map_err(json_err)?;
    Ok((input_metrics, input_pipelines, groups))
}

fn json_err(e: serde_json::Error) -> StorageError {
    StorageError::SqliteError { message: format!("encode definition: {e}") }
}

pub(crate) fn agg_to_str(agg: AggregationType) -> &'static str {
    match agg {
        AggregationType::GroupBy => "groupBy",
        AggregationType::Sum => "sum",
        AggregationType::Mean => "mean",
        AggregationType::Max => "max",
        AggregationType::Min => "min",
        AggregationType::Count => "count",
    }
}

pub(crate) fn agg_from_str(s: &str) -> Option<AggregationType> {
    match s {
        "groupBy" => Some(AggregationType::GroupBy),
        "sum" => Some(AggregationType::Sum),
        "mean" => Some(AggregationType::Mean),
        "max" => Some(AggregationType::Max),
        "min" => Some(AggregationType::Min),
        "count" => Some(AggregationType::Count),
        _ => None,
    }
}
