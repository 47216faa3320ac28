//! Universal data types shared across engines.
//!
//! These types give a normalized representation of values, result sets and
//! tabular payloads so callers never touch driver-specific rows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::error::{ConfigError, ExecutionError};

/// Supported database engines.
///
/// The set is closed: dispatch happens by matching this enum, and adding an
/// engine means adding a variant plus its validation, DSN and driver arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Sqlite,
    Postgres,
    MySql,
    MariaDb,
    Snowflake,
    BigQuery,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Sqlite => "sqlite",
            EngineType::Postgres => "postgres",
            EngineType::MySql => "mysql",
            EngineType::MariaDb => "mariadb",
            EngineType::Snowflake => "snowflake",
            EngineType::BigQuery => "bigquery",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(EngineType::Sqlite),
            "postgres" => Ok(EngineType::Postgres),
            "mysql" => Ok(EngineType::MySql),
            "mariadb" => Ok(EngineType::MariaDb),
            "snowflake" => Ok(EngineType::Snowflake),
            "bigquery" => Ok(EngineType::BigQuery),
            other => Err(ConfigError::UnknownEngine(other.to_string())),
        }
    }
}

/// Unique identifier for a database session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Json(serde_json::Value),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// A single row of data (indexed by column order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

/// Tabular result of a row-returning statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome of executing a single statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    /// The statement produced rows.
    Rows(RowSet),
    /// The statement reported a count of affected rows.
    Affected(u64),
}

impl ExecutionResult {
    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            ExecutionResult::Rows(set) => Some(set),
            ExecutionResult::Affected(_) => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            ExecutionResult::Rows(_) => None,
            ExecutionResult::Affected(count) => Some(*count),
        }
    }
}

/// Disposition for a dataframe write when the target table already exists.
///
/// The full vocabulary parses so stored job configs stay readable, but only
/// `Replace` is executable today; the others fail with
/// `ExecutionError::UnsupportedMode` before any statement is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Replace,
    Append,
    Fail,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
            WriteMode::Fail => "fail",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            "fail" => Ok(WriteMode::Fail),
            other => Err(ExecutionError::UnsupportedMode(other.to_string())),
        }
    }
}

/// A named column of values inside a dataframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataColumn {
    pub name: String,
    pub values: Vec<Value>,
}

/// Column-oriented tabular payload for bulk writes.
///
/// Columns are ordered and every column must hold the same number of
/// values. The shape is checked when the frame is written, not on
/// insertion, so a frame can be assembled column by column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    pub columns: Vec<DataColumn>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.columns.push(DataColumn {
            name: name.into(),
            values,
        });
        self
    }

    /// Number of rows, taken from the first column.
    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Checks that the frame has at least one column and that every column
    /// holds the same number of values.
    pub fn validate_shape(&self) -> Result<(), ExecutionError> {
        let Some(first) = self.columns.first() else {
            return Err(ExecutionError::EmptyDataFrame);
        };
        let expected = first.values.len();
        for column in &self.columns {
            if column.values.len() != expected {
                return Err(ExecutionError::ColumnLengthMismatch {
                    column: column.name.clone(),
                    expected,
                    actual: column.values.len(),
                });
            }
        }
        Ok(())
    }
}
