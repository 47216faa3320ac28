//! SQLite driver.
//!
//! Connects straight to the database file and creates it when missing, so
//! a fresh path works without any setup step. A missing or unwritable
//! parent directory surfaces as a connection failure.

use std::str::FromStr;

use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::engine::drivers::{self, first_non_null, rows_per_batch};
use crate::engine::error::{ConnectionError, Result};
use crate::engine::types::{
    ColumnInfo, DataFrame, EngineType, ExecutionResult, Row as QRow, RowSet, Value,
};

/// Bind parameters per INSERT batch. SQLite's historical default variable
/// limit is 999, so stay under it.
const BIND_BUDGET: usize = 999;

pub(crate) async fn connect(dsn: &str) -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::from_str(dsn)
        .map_err(|e| ConnectionError::failed(EngineType::Sqlite, e.to_string()))?
        .create_if_missing(true);
    options
        .connect()
        .await
        .map_err(|e| ConnectionError::failed(EngineType::Sqlite, e.to_string()).into())
}

pub(crate) async fn execute(conn: &mut SqliteConnection, sql: &str) -> Result<ExecutionResult> {
    if drivers::is_select_shaped(sql) {
        let sqlite_rows: Vec<SqliteRow> = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(drivers::map_sqlx_error)?;
        Ok(ExecutionResult::Rows(row_set(&sqlite_rows)))
    } else {
        let result = sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(drivers::map_sqlx_error)?;
        Ok(ExecutionResult::Affected(result.rows_affected()))
    }
}

/// Drops, recreates and loads the target table. Statements are issued
/// separately, so a failure partway leaves the table in whatever state the
/// last completed statement produced.
pub(crate) async fn write_dataframe(
    conn: &mut SqliteConnection,
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
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column type for CREATE TABLE, inferred from the first non-null value.
/// All-null columns land as TEXT.
fn column_type(values: &[Value]) -> &'static str {
    match first_non_null(values) {
        Some(Value::Bool(_)) => "BOOLEAN",
        Some(Value::Int(_)) => "INTEGER",
        Some(Value::Float(_)) => "REAL",
        Some(Value::Bytes(_)) => "BLOB",
        _ => "TEXT",
    }
}

/// Helper to bind a Value to a SQLite query
fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
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

fn row_set(rows: &[SqliteRow]) -> RowSet {
    let Some(first) = rows.first() else {
        return RowSet::empty();
    };
    RowSet {
        columns: column_info(first),
        rows: rows.iter().map(convert_row).collect(),
    }
}

/// Converts a SQLx row to our universal Row type
fn convert_row(sqlite_row: &SqliteRow) -> QRow {
    let values: Vec<Value> = sqlite_row
        .columns()
        .iter()
        .map(|col| extract_value(sqlite_row, col.ordinal()))
        .collect();

    QRow { values }
}

/// Extracts a value from a SqliteRow at the given index.
///
/// SQLite coerces across storage classes on demand, so instead of a decode
/// cascade this dispatches on the value's runtime storage class; a TEXT
/// value can never come back as a number.
fn extract_value(row: &SqliteRow, idx: usize) -> Value {
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let info = raw.type_info();
    match info.name() {
        "INTEGER" => match row.try_get::<Option<i64>, _>(idx) {
            Ok(v) => v.map(Value::Int).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "REAL" => match row.try_get::<Option<f64>, _>(idx) {
            Ok(v) => v.map(Value::Float).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "BLOB" => match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(v) => v.map(Value::Bytes).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        _ => match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => v.map(Value::Text).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
    }
}

fn column_info(row: &SqliteRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            data_type: col.type_info().name().to_string(),
            nullable: true,
        })
        .collect()
}
