//! MySQL / MariaDB driver.
//!
//! Both engines speak the MySQL wire protocol, so they share this module;
//! the engine tag is threaded through for error reporting only.

use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::debug;

use crate::engine::drivers::{self, first_non_null, rows_per_batch};
use crate::engine::error::{ConnectionError, Result};
use crate::engine::types::{
    ColumnInfo, DataFrame, EngineType, ExecutionResult, Row as QRow, RowSet, Value,
};

/// Bind parameters per INSERT batch, kept well under the protocol's
/// 16-bit limit.
const BIND_BUDGET: usize = 10_000;

pub(crate) async fn connect(engine: EngineType, dsn: &str) -> Result<MySqlConnection> {
    MySqlConnection::connect(dsn)
        .await
        .map_err(|e| ConnectionError::failed(engine, e.to_string()).into())
}

pub(crate) async fn execute(conn: &mut MySqlConnection, sql: &str) -> Result<ExecutionResult> {
    if drivers::is_select_shaped(sql) {
        let mysql_rows: Vec<MySqlRow> = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(drivers::map_sqlx_error)?;
        Ok(ExecutionResult::Rows(row_set(&mysql_rows)))
    } else {
        let result = sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(drivers::map_sqlx_error)?;
        Ok(ExecutionResult::Affected(result.rows_affected()))
    }
}

/// Drops, recreates and loads the target table. Statements are issued
/// separately (MySQL DDL auto-commits anyway), so a failure partway leaves
/// the table in whatever state the last completed statement produced.
pub(crate) async fn write_dataframe(
    conn: &mut MySqlConnection,
    table: &str,
    frame: &DataFrame,
) -> Result<u64> {
    let quoted = quote_ident(table);

    sqlx::query(&format!("DROP TABLE IF EXISTS {quoted}"))
        .execute(&mut *conn)
        .await
        .map_err(drivers::map_sqlx_error)?;

    let column_defs: Vec<String> = frame
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), column_type(&c.values)))
        .collect();
    sqlx::query(&format!("CREATE TABLE {quoted} ({})", column_defs.join(", ")))
        .execute(&mut *conn)
        .await
        .map_err(drivers::map_sqlx_error)?;

    let row_count = frame.row_count();
    if row_count == 0 {
        return Ok(0);
    }

    let column_names: Vec<String> = frame.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let width = frame.columns.len();
    let batch_rows = rows_per_batch(BIND_BUDGET, width);

    let mut inserted = 0u64;
    let mut start = 0usize;
    while start < row_count {
        let end = usize::min(start + batch_rows, row_count);
        let sql = insert_sql(&quoted, &column_names, width, end - start);

        let mut query = sqlx::query(&sql);
        for row in start..end {
            for column in &frame.columns {
                query = bind_value(query, &column.values[row]);
            }
        }
        let result = query
            .execute(&mut *conn)
            .await
            .map_err(drivers::map_sqlx_error)?;
        inserted += result.rows_affected();
        start = end;
    }

    debug!(table, rows = inserted, "dataframe written");
    Ok(inserted)
}

/// Multi-row INSERT with positional placeholders: `(?, ?), (?, ?)`.
fn insert_sql(quoted_table: &str, column_names: &[String], width: usize, rows: usize) -> String {
    let group = format!("({})", vec!["?"; width].join(", "));
    let groups = vec![group; rows];
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quoted_table,
        column_names.join(", "),
        groups.join(", ")
    )
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Column type for CREATE TABLE, inferred from the first non-null value.
/// All-null columns land as TEXT.
fn column_type(values: &[Value]) -> &'static str {
    match first_non_null(values) {
        Some(Value::Bool(_)) => "BOOLEAN",
        Some(Value::Int(_)) => "BIGINT",
        Some(Value::Float(_)) => "DOUBLE",
        Some(Value::Bytes(_)) => "BLOB",
        Some(Value::Json(_)) => "JSON",
        _ => "TEXT",
    }
}

/// Helper to bind a Value to a MySQL query
fn bind_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Json(j) => query.bind(j),
    }
}

fn row_set(rows: &[MySqlRow]) -> RowSet {
    let Some(first) = rows.first() else {
        return RowSet::empty();
    };
    RowSet {
        columns: column_info(first),
        rows: rows.iter().map(convert_row).collect(),
    }
}

/// Converts a SQLx row to our universal Row type
fn convert_row(mysql_row: &MySqlRow) -> QRow {
    let values: Vec<Value> = mysql_row
        .columns()
        .iter()
        .map(|col| extract_value(mysql_row, col.ordinal()))
        .collect();

    QRow { values }
}

/// Extracts a value from a MySqlRow at the given index
fn extract_value(row: &MySqlRow, idx: usize) -> Value {
    // Try u64 first for BIGINT UNSIGNED columns
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
        return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
        return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
        return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
        return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| Value::Float(f as f64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return v.map(decimal_value).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return v.map(|dt| Value::Text(dt.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return v
            .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return v
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
        return v
            .map(|t| Value::Text(t.format("%H:%M:%S").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return v.map(Value::Json).unwrap_or(Value::Null);
    }

    Value::Null
}

/// DECIMAL maps to text with all its digits; f64 cannot hold them all.
fn decimal_value(d: Decimal) -> Value {
    Value::Text(d.to_string())
}

fn column_info(row: &MySqlRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            data_type: col.type_info().name().to_string(),
            nullable: true,
        })
        .collect()
}
