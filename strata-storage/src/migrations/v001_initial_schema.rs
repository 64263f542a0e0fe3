//! v001: metric definitions, definition snapshots, materialized values,
//! raw activity values.

use rusqlite::Connection;

use strata_core::errors::StorageError;

use crate::sqe;

pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metrics (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL UNIQUE,
            aggregation_type TEXT NOT NULL,
            input_metrics    TEXT NOT NULL,
            input_pipelines  TEXT NOT NULL,
            groups_json      TEXT NOT NULL,
            version          INTEGER NOT NULL,
            updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS metric_versions (
            id               TEXT NOT NULL,
            name             TEXT NOT NULL,
            aggregation_type TEXT NOT NULL,
            input_metrics    TEXT NOT NULL,
            input_pipelines  TEXT NOT NULL,
            groups_json      TEXT NOT NULL,
            version          INTEGER NOT NULL,
            snapshotted_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (name, version)
        );

        CREATE TABLE IF NOT EXISTS metric_values (
            metric_id        TEXT NOT NULL,
            group_id         TEXT NOT NULL,
            time_unit        TEXT NOT NULL,
            date             TEXT NOT NULL,
            version          INTEGER NOT NULL,
            name             TEXT NOT NULL,
            group_value      REAL NOT NULL,
            sub_groups_value REAL NOT NULL,
            pipeline_id      TEXT NOT NULL,
            execution_id     TEXT NOT NULL,
            created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (metric_id, group_id, time_unit, date, version)
        );

        -- Subtree scans: prefix range over group_id within (metric, unit).
        CREATE INDEX IF NOT EXISTS idx_metric_values_subtree
            ON metric_values(metric_id, time_unit, group_id, date);

        CREATE TABLE IF NOT EXISTS activities (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_key  TEXT NOT NULL,
            group_id      TEXT NOT NULL,
            pipeline_id   TEXT NOT NULL,
            execution_id  TEXT NOT NULL,
            output_column TEXT NOT NULL,
            date          TEXT NOT NULL,
            value         REAL NOT NULL,
            created_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_activities_group_date
            ON activities(group_id, pipeline_id, output_column, date);
        CREATE INDEX IF NOT EXISTS idx_activities_execution
            ON activities(pipeline_id, execution_id);
        CREATE INDEX IF NOT EXISTS idx_activities_latest
            ON activities(activity_key, output_column, created_at);
        ",
    )
    .map_err(sqe)?;
    Ok(())
}
