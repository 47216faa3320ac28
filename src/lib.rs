//! dbfactory - unified connection and execution facade for SQL engines.
//!
//! Turns an engine type plus named parameters into a validated
//! [`ConnectionDescriptor`] (optionally pulling credentials from AWS or
//! GCP Secret Manager), opens a [`Session`] holding one dedicated
//! connection, and executes SQL or bulk dataframe writes through it.
//! Supported engines: sqlite, postgres, mysql, mariadb, snowflake and
//! bigquery; the last two stop at descriptor building until a wire driver
//! is added.

pub mod engine;
pub mod secrets;

pub use engine::config::{ConnectionDescriptor, ConnectionParams};
pub use engine::error::{
    ConfigError, ConnectionError, Error, ExecutionError, Result, SecretError,
};
pub use engine::session::Session;
pub use engine::types::{
    ColumnInfo, DataColumn, DataFrame, EngineType, ExecutionResult, Row, RowSet, SessionId, Value,
    WriteMode,
};
pub use secrets::{CloudProvider, ResolvedCredential, SecretStore};

/// Builds a descriptor and opens a session in one call.
pub async fn connect(engine: EngineType, params: ConnectionParams) -> Result<Session> {
    let descriptor = ConnectionDescriptor::build(engine, params).await?;
    Session::open(&descriptor).await
}
