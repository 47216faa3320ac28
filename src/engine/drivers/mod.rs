//! Engine drivers, one module per wire protocol.
//!
//! Drivers share the row and value model from `engine::types`; everything
//! protocol-specific (decode order, placeholder grammar, identifier
//! quoting) stays in the per-engine modules. MariaDB speaks the MySQL
//! protocol and rides the mysql module.

pub(crate) mod mysql;
pub(crate) mod postgres;
pub(crate) mod sqlite;

use crate::engine::error::{ConnectionError, Error, ExecutionError};
use crate::engine::types::Value;

/// Decides fetch-versus-execute from the statement's leading keyword.
/// Statements arrive one at a time and are not rewritten, so a plain
/// prefix test is enough.
pub(crate) fn is_select_shaped(sql: &str) -> bool {
    let trimmed = sql.trim().to_uppercase();
    trimmed.starts_with("SELECT")
        || trimmed.starts_with("WITH")
        || trimmed.starts_with("SHOW")
        || trimmed.starts_with("EXPLAIN")
        || trimmed.starts_with("PRAGMA")
        || trimmed.starts_with("VALUES")
        || trimmed.starts_with("DESCRIBE")
}

/// Maps a sqlx failure during statement execution onto the taxonomy:
/// transport failures mean the link under the session is gone, anything
/// else is a statement failure carrying the engine's own message.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Io(e) => ConnectionError::Dropped(e.to_string()).into(),
        sqlx::Error::Tls(e) => ConnectionError::Dropped(e.to_string()).into(),
        sqlx::Error::Protocol(message) => ConnectionError::Dropped(message).into(),
        e @ sqlx::Error::WorkerCrashed => ConnectionError::Dropped(e.to_string()).into(),
        sqlx::Error::Database(db) => ExecutionError::Statement(db.message().to_string()).into(),
        other => ExecutionError::Statement(other.to_string()).into(),
    }
}

/// Rows per INSERT batch, sized so a batch never exceeds the engine's
/// bind-parameter budget.
pub(crate) fn rows_per_batch(bind_budget: usize, column_count: usize) -> usize {
    std::cmp::max(1, bind_budget / std::cmp::max(1, column_count))
}

/// First non-null value of a column, used to infer its SQL type.
pub(crate) fn first_non_null(values: &[Value]) -> Option<&Value> {
    values.iter().find(|v| !matches!(v, Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_shape_covers_row_returning_prefixes() {
        assert!(is_select_shaped("SELECT 1"));
        assert!(is_select_shaped("  with t as (select 1) select * from t"));
        assert!(is_select_shaped("PRAGMA table_info(users)"));
        assert!(is_select_shaped("VALUES (1), (2)"));
        assert!(is_select_shaped("explain select * from users"));
        assert!(!is_select_shaped("INSERT INTO users VALUES (1)"));
        assert!(!is_select_shaped("CREATE TABLE t (id INTEGER)"));
        assert!(!is_select_shaped("UPDATE t SET id = 2"));
    }

    #[test]
    fn batch_size_never_drops_to_zero() {
        assert_eq!(rows_per_batch(999, 3), 333);
        assert_eq!(rows_per_batch(10, 200), 1);
        assert_eq!(rows_per_batch(999, 0), 999);
    }

    #[test]
    fn type_inference_skips_leading_nulls() {
        let values = vec![Value::Null, Value::Null, Value::Int(7)];
        assert_eq!(first_non_null(&values), Some(&Value::Int(7)));
        assert_eq!(first_non_null(&[Value::Null]), None);
    }
}
