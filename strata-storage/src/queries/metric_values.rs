//! metric_values table queries.
//!
//! Bucket identity is the composite key `(metric_id, group_id, time_unit,
//! date, version)`. Every write inserts a fresh row whose version is minted
//! inside the INSERT itself (`COALESCE(MAX(version), 0) + 1` over the
//! bucket), so concurrent writers cannot collide and history stays intact.

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, ToSql};

use strata_core::errors::StorageError;
use strata_core::types::metric::{MetricValue, VersionSelector};
use strata_core::types::time::{DateRange, TimeUnit};
use strata_core::GroupPath;

use crate::pagination;
use crate::sqe;
use strata_core::traits::storage::metric_values::{MetricValuePage, MetricValueUpsert};

const VALUE_COLUMNS: &str = "group_id, date, time_unit, name, version, \
     group_value, sub_groups_value, pipeline_id, execution_id";

/// `version = MAX(version)` over the row's own bucket.
const LATEST_FILTER: &str = "version = (SELECT MAX(version) FROM metric_values \
     WHERE metric_id = mv.metric_id AND group_id = mv.group_id \
       AND time_unit = mv.time_unit AND date = mv.date)";

pub fn insert_batch(
    conn: &Connection,
    metric_id: &str,
    metric_name: &str,
    pipeline_id: &str,
    execution_id: &str,
    values: &[MetricValueUpsert],
) -> Result<(), StorageError> {
    let tx = conn.unchecked_transaction().map_err(sqe)?;
    {
        // The aggregate over an empty bucket yields a single NULL row, so
        // this inserts exactly one row whether or not the bucket exists.
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO metric_values
                 (metric_id, group_id, time_unit, date, version,
                  name, group_value, sub_groups_value, pipeline_id, execution_id)
                 SELECT ?1, ?2, ?3, ?4, COALESCE(MAX(version), 0) + 1,
                        ?5, ?6, ?7, ?8, ?9
                 FROM metric_values
                 WHERE metric_id = ?1 AND group_id = ?2 AND time_unit = ?3 AND date = ?4",
            )
            .map_err(sqe)?;
        for v in values {
            stmt.execute(params![
                metric_id,
                v.group_id.as_str(),
                v.time_unit.abbrev(),
                date_to_sql(v.date),
                metric_name,
                v.group_value,
                v.sub_groups_value,
                pipeline_id,
                execution_id,
            ])
            .map_err(sqe)?;
        }
    }
    tx.commit().map_err(sqe)?;
    Ok(())
}

pub fn list_group_series(
    conn: &Connection,
    metric_id: &str,
    group: &GroupPath,
    unit: TimeUnit,
    range: DateRange,
    version: VersionSelector,
) -> Result<Vec<MetricValue>, StorageError> {
    let base = format!(
        "SELECT {VALUE_COLUMNS} FROM metric_values mv
         WHERE metric_id = ?1 AND group_id = ?2 AND time_unit = ?3
           AND date >= ?4 AND date <= ?5"
    );
    let (sql, at): (String, Option<i64>) = match version {
        VersionSelector::Latest => (format!("{base} AND {LATEST_FILTER} ORDER BY date"), None),
        VersionSelector::At(v) => (format!("{base} AND version = ?6 ORDER BY date"), Some(v)),
    };

    let mut stmt = conn.prepare_cached(&sql).map_err(sqe)?;
    let mut bind: Vec<&dyn ToSql> = Vec::with_capacity(6);
    let (group_s, from_s, to_s) = (
        group.as_str().to_string(),
        date_to_sql(range.from),
        date_to_sql(range.to),
    );
    let unit_s = unit.abbrev();
    bind.push(&metric_id);
    bind.push(&group_s);
    bind.push(&unit_s);
    bind.push(&from_s);
    bind.push(&to_s);
    if let Some(ref v) = at {
        bind.push(v);
    }

    collect_values(&mut stmt, &bind)
}

#[allow(clippy::too_many_arguments)]
pub fn list_subtree_page(
    conn: &Connection,
    metric_id: &str,
    group: &GroupPath,
    unit: TimeUnit,
    range: DateRange,
    version: VersionSelector,
    after: Option<&str>,
    limit: usize,
) -> Result<MetricValuePage, StorageError> {
    let mut sql = format!(
        "SELECT {VALUE_COLUMNS} FROM metric_values mv
         WHERE metric_id = ?1 AND time_unit = ?2
           AND (group_id = ?3 OR group_id LIKE ?4)
           AND date >= ?5 AND date <= ?6"
    );

    let group_s = group.as_str().to_string();
    let like = format!("{}%", group.scan_prefix());
    let unit_s = unit.abbrev();
    let (from_s, to_s) = (date_to_sql(range.from), date_to_sql(range.to));

    let mut bind: Vec<&dyn ToSql> = vec![&metric_id, &unit_s, &group_s, &like, &from_s, &to_s];
    let mut next_param = 7;

    let at_version = match version {
        VersionSelector::Latest => {
            sql.push_str(&format!(" AND {LATEST_FILTER}"));
            None
        }
        VersionSelector::At(v) => {
            sql.push_str(&format!(" AND version = ?{next_param}"));
            next_param += 1;
            Some(v)
        }
    };
    if let Some(ref v) = at_version {
        bind.push(v);
    }

    let cursor = after.map(pagination::decode_token).transpose()?;
    let cursor_sql = cursor
        .as_ref()
        .map(|(g, d)| (g.clone(), date_to_sql(*d)));
    if let Some((ref g, ref d)) = cursor_sql {
        sql.push_str(&format!(
            " AND (group_id, date) > (?{}, ?{})",
            next_param,
            next_param + 1
        ));
        bind.push(g);
        bind.push(d);
    }

    sql.push_str(" ORDER BY group_id, date LIMIT ?");
    sql.push_str(&(bind.len() + 1).to_string());
    let limit_i = limit as i64;
    bind.push(&limit_i);

    let mut stmt = conn.prepare_cached(&sql).map_err(sqe)?;
    let items = collect_values(&mut stmt, &bind)?;

    let next_token = if items.len() == limit {
        items
            .last()
            .map(|v| pagination::encode_token(v.group_id.as_str(), v.date))
    } else {
        None
    };

    Ok(MetricValuePage { items, next_token })
}

pub fn list_child_series(
    conn: &Connection,
    metric_id: &str,
    group: &GroupPath,
    unit: TimeUnit,
    range: DateRange,
) -> Result<Vec<MetricValue>, StorageError> {
    // Immediate children only: after stripping the parent prefix the
    // remainder must contain no further '/'.
    let sql = format!(
        "SELECT {VALUE_COLUMNS} FROM metric_values mv
         WHERE metric_id = ?1 AND time_unit = ?2
           AND group_id LIKE ?3 AND group_id <> ?4
           AND instr(substr(group_id, length(?4) + 1), '/') = 0
           AND date >= ?5 AND date <= ?6
           AND {LATEST_FILTER}
         ORDER BY group_id, date"
    );

    let prefix = group.scan_prefix();
    let like = format!("{prefix}%");
    let unit_s = unit.abbrev();
    let (from_s, to_s) = (date_to_sql(range.from), date_to_sql(range.to));

    let mut stmt = conn.prepare_cached(&sql).map_err(sqe)?;
    let bind: Vec<&dyn ToSql> = vec![&metric_id, &unit_s, &like, &prefix, &from_s, &to_s];
    collect_values(&mut stmt, &bind)
}

pub fn delete_for_metric(conn: &Connection, metric_id: &str) -> Result<usize, StorageError> {
    conn.execute(
        "DELETE FROM metric_values WHERE metric_id = ?1",
        params![metric_id],
    )
    .map_err(sqe)
}

// ─── row mapping ────────────────────────────────────────────────────

fn collect_values(
    stmt: &mut rusqlite::CachedStatement<'_>,
    bind: &[&dyn ToSql],
) -> Result<Vec<MetricValue>, StorageError> {
    let rows = stmt
        .query_map(params_from_iter(bind.iter()), map_value_row)
        .map_err(sqe)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqe)??);
    }
    Ok(out)
}

fn map_value_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<MetricValue, StorageError>> {
    let group_id: String = row.get(0)?;
    let date: String = row.get(1)?;
    let unit: String = row.get(2)?;
    let name: String = row.get(3)?;
    let version: i64 = row.get(4)?;
    let group_value: f64 = row.get(5)?;
    let sub_groups_value: f64 = row.get(6)?;
    let pipeline_id: String = row.get(7)?;
    let execution_id: String = row.get(8)?;

    Ok(decode_value(
        group_id,
        date,
        unit,
        name,
        version,
        group_value,
        sub_groups_value,
        pipeline_id,
        execution_id,
    ))
}

#[allow(clippy::too_many_arguments)]
fn decode_value(
    group_id: String,
    date: String,
    unit: String,
    name: String,
    version: i64,
    group_value: f64,
    sub_groups_value: f64,
    pipeline_id: String,
    execution_id: String,
) -> Result<MetricValue, StorageError> {
    let corrupt = |what: &str, raw: &str| StorageError::SqliteError {
        message: format!("metric value row: corrupt {what} '{raw}'"),
    };
    let time_unit = TimeUnit::from_abbrev(&unit).ok_or_else(|| corrupt("time unit", &unit))?;
    let parsed_date =
        NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| corrupt("date", &date))?;
    // Paths were validated on the way in; a failure here means the column
    // was tampered with.
    let group_id = GroupPath::new(&group_id).map_err(|_| corrupt("group path", &group_id))?;

    Ok(MetricValue {
        group_id,
        date: parsed_date,
        time_unit,
        name,
        version,
        group_value,
        sub_groups_value,
        pipeline_id,
        execution_id,
    })
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
