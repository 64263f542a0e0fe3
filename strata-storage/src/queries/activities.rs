//! activities table queries.
//!
//! Re-emitting an activity key supersedes the previous value: only the row
//! with the greatest `created_at` per (key, output column) participates in
//! aggregation. Superseded rows are kept, never updated in place.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};

use strata_core::errors::StorageError;
use strata_core::types::metric::{AggregationType, PipelineInput};
use strata_core::types::time::DateRange;
use strata_core::GroupPath;

use strata_core::traits::storage::activities::{ActivityRow, DailyTotal};

use crate::sqe;

use super::metric_values::date_to_sql;

pub fn insert_batch(conn: &Connection, rows: &[ActivityRow]) -> Result<usize, StorageError> {
    let tx = conn.unchecked_transaction().map_err(sqe)?;
    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO activities
                 (activity_key, group_id, pipeline_id, execution_id,
                  output_column, date, value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(sqe)?;
        for row in rows {
            stmt.execute(params![
                row.activity_key,
                row.group_id.as_str(),
                row.pipeline_id,
                row.execution_id,
                row.output_column,
                date_to_sql(row.date),
                row.value,
                row.created_at,
            ])
            .map_err(sqe)?;
        }
    }
    tx.commit().map_err(sqe)?;
    Ok(rows.len())
}

/// One total per day for exactly this group over the given pipeline inputs.
///
/// The inner subquery resolves latest-wins across the *whole* table for the
/// matching inputs, not just the window: a superseded activity whose newest
/// revision moved to another date must drop out of the old date entirely.
pub fn aggregate_by_day(
    conn: &Connection,
    group: &GroupPath,
    inputs: &[PipelineInput],
    agg: AggregationType,
    range: DateRange,
) -> Result<Vec<DailyTotal>, StorageError> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    // The same numbered parameters feed both the subquery and the outer
    // query; the outer clauses must qualify their columns since the join
    // exposes output_column on both sides.
    let mut inner_pairs = Vec::with_capacity(inputs.len());
    let mut outer_pairs = Vec::with_capacity(inputs.len());
    let mut param_no = 4;
    for _ in inputs {
        inner_pairs.push(format!(
            "(pipeline_id = ?{} AND output_column = ?{})",
            param_no,
            param_no + 1
        ));
        outer_pairs.push(format!(
            "(a.pipeline_id = ?{} AND a.output_column = ?{})",
            param_no,
            param_no + 1
        ));
        param_no += 2;
    }
    let inner_pairs = inner_pairs.join(" OR ");
    let outer_pairs = outer_pairs.join(" OR ");

    let sql = format!(
        "SELECT a.date, {agg_fn}
         FROM activities a
         JOIN (SELECT activity_key, output_column, MAX(created_at) AS newest
               FROM activities
               WHERE {inner_pairs}
               GROUP BY activity_key, output_column) latest
           ON a.activity_key = latest.activity_key
          AND a.output_column = latest.output_column
          AND a.created_at = latest.newest
         WHERE a.group_id = ?1 AND a.date >= ?2 AND a.date <= ?3 AND ({outer_pairs})
         GROUP BY a.date
         ORDER BY a.date",
        agg_fn = aggregate_sql(agg),
    );

    let group_s = group.as_str().to_string();
    let (from_s, to_s) = (date_to_sql(range.from), date_to_sql(range.to));
    let mut bind: Vec<&dyn ToSql> = vec![&group_s, &from_s, &to_s];
    for input in inputs {
        bind.push(&input.pipeline_id);
        bind.push(&input.output_column);
    }

    let mut stmt = conn.prepare_cached(&sql).map_err(sqe)?;
    let rows = stmt
        .query_map(params_from_iter(bind.iter()), |row| {
            let date: String = row.get(0)?;
            let value: f64 = row.get(1)?;
            Ok((date, value))
        })
        .map_err(sqe)?;

    let mut totals = Vec::new();
    for row in rows {
        let (date, value) = row.map_err(sqe)?;
        let date = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
            StorageError::SqliteError {
                message: format!("activity row: corrupt date '{date}'"),
            }
        })?;
        totals.push(DailyTotal { date, value });
    }
    Ok(totals)
}

pub fn affected_date_range(
    conn: &Connection,
    pipeline_id: &str,
    execution_id: &str,
) -> Result<Option<DateRange>, StorageError> {
    let row: Option<(Option<String>, Option<String>)> = conn
        .prepare_cached(
            "SELECT MIN(date), MAX(date) FROM activities
             WHERE pipeline_id = ?1 AND execution_id = ?2",
        )
        .map_err(sqe)?
        .query_row(params![pipeline_id, execution_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()
        .map_err(sqe)?;

    let (Some(min), Some(max)) = (match row {
        Some((min, max)) => (min, max),
        None => (None, None),
    }) else {
        return Ok(None);
    };

    let parse = |raw: &str| {
        chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            StorageError::SqliteError {
                message: format!("activity row: corrupt date '{raw}'"),
            }
        })
    };
    Ok(Some(DateRange::new(parse(&min)?, parse(&max)?)))
}

/// `GroupBy` collapses raw rows the same way `Sum` does; the distinction
/// only matters upstream of this store.
fn aggregate_sql(agg: AggregationType) -> &'static str {
    match agg {
        AggregationType::GroupBy | AggregationType::Sum => "SUM(a.value)",
        AggregationType::Mean => "AVG(a.value)",
        AggregationType::Max => "MAX(a.value)",
        AggregationType::Min => "MIN(a.value)",
        AggregationType::Count => "COUNT(a.value)",
    }
}
