//! PostgreSQL driver.
//!
//! Statements run on the session's one dedicated connection, so execution
//! order is exactly the call order and session-scoped state (temp tables,
//! SET parameters) behaves predictably.

use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnection, PgRow, Postgres};
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

pub(crate) async fn connect(dsn: &str) -> Result<PgConnection> {
    PgConnection::connect(dsn)
        .await
        .map_err(|e| ConnectionError::failed(EngineType::Postgres, e.to_string()).into())
}

pub(crate) async fn execute(conn: &mut PgConnection, sql: &str) -> Result<ExecutionResult> {
    if drivers::is_select_shaped(sql) {
        let pg_rows: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(drivers::map_sqlx_error)?;
        Ok(ExecutionResult::Rows(row_set(&pg_rows)))
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
    conn: &mut PgConnection,
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

/// Multi-row INSERT with numbered placeholders: `($1, $2), ($3, $4)`.
fn insert_sql(quoted_table: &str, column_names: &[String], width: usize, rows: usize) -> String {
    let mut groups = Vec::with_capacity(rows);
    for row in 0..rows {
        let cells: Vec<String> = (0..width)
            .map(|col| format!("${}", row * width + col + 1))
            .collect();
        groups.push(format!("({})", cells.join(", ")));
    }
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
        Some(Value::Int(_)) => "BIGINT",
        Some(Value::Float(_)) => "DOUBLE PRECISION",
        Some(Value::Bytes(_)) => "BYTEA",
        Some(Value::Json(_)) => "JSONB",
        _ => "TEXT",
    }
}

/// Helper to bind a Value to a Postgres query
fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
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

fn row_set(rows: &[PgRow]) -> RowSet {
    let Some(first) = rows.first() else {
        return RowSet::empty();
    };
    RowSet {
        columns: column_info(first),
        rows: rows.iter().map(convert_row).collect(),
    }
}

/// Converts a SQLx row to our universal Row type
fn convert_row(pg_row: &PgRow) -> QRow {
    let values: Vec<Value> = pg_row
        .columns()
        .iter()
        .map(|col| extract_value(pg_row, col.ordinal()))
        .collect();

    QRow { values }
}

/// Extracts a value from a PgRow at the given index
fn extract_value(row: &PgRow, idx: usize) -> Value {
    // IMPORTANT: Test integers BEFORE bool to avoid misinterpretation
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
    }
    // Bool AFTER integers
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
        return v.map(|d| Value::Text(d.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    // Date/Time types - convert to ISO 8601 string
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

fn column_info(row: &PgRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            data_type: col.type_info().name().to_string(),
            nullable: true, // SQLx doesn't expose nullability at runtime
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted_and_escaped() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn insert_sql_numbers_placeholders_across_rows() {
        let columns = vec!["\"a\"".to_string(), "\"b\"".to_string()];
        let sql = insert_sql("\"t\"", &columns, 2, 2);
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"a\", \"b\") VALUES ($1, $2), ($3, $4)"
        );
    }

    #[test]
    fn column_types_follow_the_first_non_null_value() {
        assert_eq!(column_type(&[Value::Null, Value::Int(1)]), "BIGINT");
        assert_eq!(column_type(&[Value::Float(0.5)]), "DOUBLE PRECISION");
        assert_eq!(column_type(&[Value::Bool(true)]), "BOOLEAN");
        assert_eq!(column_type(&[Value::Text("x".into())]), "TEXT");
        assert_eq!(column_type(&[Value::Null, Value::Null]), "TEXT");
    }
}
