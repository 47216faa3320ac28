//! Session lifecycle and statement execution.
//!
//! A session owns exactly one dedicated driver connection. There is no
//! pooling, no reconnection and no retry; when the link is gone the
//! session is done. Statement methods take `&mut self`, so one session
//! cannot run two statements concurrently by construction.

use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::{debug, info, instrument, warn};

use crate::engine::config::ConnectionDescriptor;
use crate::engine::drivers::{mysql, postgres, sqlite};
use crate::engine::error::{ConnectionError, ExecutionError, Result};
use crate::engine::types::{
    DataFrame, EngineType, ExecutionResult, RowSet, SessionId, Value, WriteMode,
};

/// One live driver connection. The set is closed: adding an engine means
/// adding a variant here plus arms in [`Session::open`] and the dispatch
/// methods below.
#[derive(Debug)]
enum DriverConnection {
    Sqlite(SqliteConnection),
    Postgres(PgConnection),
    /// MariaDB rides this variant too; both speak the MySQL protocol.
    MySql(MySqlConnection),
}

/// A live connection to one engine.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    engine: EngineType,
    conn: Option<DriverConnection>,
    target: String,
}

impl Session {
    /// Opens a session for a built descriptor.
    ///
    /// Engines whose descriptor is supported but that have no compiled-in
    /// wire driver (snowflake, bigquery) fail with
    /// [`ConnectionError::DriverUnavailable`] before any I/O.
    #[instrument(skip(descriptor), fields(engine = %descriptor.engine_type(), target = %descriptor))]
    pub async fn open(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let engine = descriptor.engine_type();
        let conn = match engine {
            EngineType::Sqlite => {
                DriverConnection::Sqlite(sqlite::connect(descriptor.dsn()).await?)
            }
            EngineType::Postgres => {
                DriverConnection::Postgres(postgres::connect(descriptor.dsn()).await?)
            }
            EngineType::MySql | EngineType::MariaDb => {
                DriverConnection::MySql(mysql::connect(engine, descriptor.dsn()).await?)
            }
            EngineType::Snowflake | EngineType::BigQuery => {
                return Err(ConnectionError::DriverUnavailable(engine).into());
            }
        };

        let session = Self {
            id: SessionId::new(),
            engine,
            conn: Some(conn),
            target: descriptor.redacted_dsn(),
        };
        info!(session = %session.id, "session opened");
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine
    }

    /// Redacted DSN this session was opened against.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn conn_mut(&mut self) -> Result<&mut DriverConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ConnectionError::SessionClosed.into())
    }

    /// Executes one SQL statement as given, no rewriting.
    ///
    /// Statements with a row-returning shape (SELECT, WITH, SHOW, EXPLAIN,
    /// PRAGMA, VALUES, DESCRIBE) come back as rows; everything else comes
    /// back as an affected-row count.
    #[instrument(skip(self, sql), fields(session = %self.id, engine = %self.engine))]
    pub async fn execute(&mut self, sql: &str) -> Result<ExecutionResult> {
        match self.conn_mut()? {
            DriverConnection::Sqlite(conn) => sqlite::execute(conn, sql).await,
            DriverConnection::Postgres(conn) => postgres::execute(conn, sql).await,
            DriverConnection::MySql(conn) => mysql::execute(conn, sql).await,
        }
    }

    /// Runs a row-returning statement and pivots the result into the
    /// column-oriented dataframe shape. Statements that report an
    /// affected-row count yield an empty frame.
    pub async fn query_dataframe(&mut self, sql: &str) -> Result<DataFrame> {
        let result = self.execute(sql).await?;
        let row_set = match result {
            ExecutionResult::Rows(set) => set,
            ExecutionResult::Affected(_) => RowSet::empty(),
        };
        Ok(pivot(row_set))
    }

    /// Writes a dataframe into `table` with create-or-replace semantics:
    /// drop the table if it exists, recreate it from the frame's inferred
    /// column types, then bulk-insert the rows. The loaded row count comes
    /// back as an affected-rows result.
    ///
    /// The mode gate runs first, so an unsupported mode never touches the
    /// engine. The drop/create/load sequence is not transactional; a
    /// failure partway leaves the table in whatever state the last
    /// completed statement produced.
    #[instrument(skip(self, frame), fields(session = %self.id, engine = %self.engine, table))]
    pub async fn write_dataframe(
        &mut self,
        table: &str,
        frame: &DataFrame,
        mode: WriteMode,
    ) -> Result<ExecutionResult> {
        if mode != WriteMode::Replace {
            return Err(ExecutionError::UnsupportedMode(mode.as_str().to_string()).into());
        }
        frame.validate_shape()?;
        let written = match self.conn_mut()? {
            DriverConnection::Sqlite(conn) => sqlite::write_dataframe(conn, table, frame).await?,
            DriverConnection::Postgres(conn) => {
                postgres::write_dataframe(conn, table, frame).await?
            }
            DriverConnection::MySql(conn) => mysql::write_dataframe(conn, table, frame).await?,
        };
        Ok(ExecutionResult::Affected(written))
    }

    /// Round-trips the connection to check it is still alive.
    pub async fn ping(&mut self) -> Result<()> {
        match self.conn_mut()? {
            DriverConnection::Sqlite(conn) => conn.ping().await,
            DriverConnection::Postgres(conn) => conn.ping().await,
            DriverConnection::MySql(conn) => conn.ping().await,
        }
        .map_err(|e| ConnectionError::Dropped(e.to_string()).into())
    }

    /// Closes the session and releases the connection. Closing an
    /// already-closed session is a no-op. Driver errors during the close
    /// handshake are logged, not returned; the session counts as closed
    /// either way.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            debug!("session already closed");
            return Ok(());
        };
        let result = match conn {
            DriverConnection::Sqlite(conn) => conn.close().await,
            DriverConnection::Postgres(conn) => conn.close().await,
            DriverConnection::MySql(conn) => conn.close().await,
        };
        if let Err(e) = result {
            warn!(error = %e, "connection did not close cleanly");
        }
        info!("session closed");
        Ok(())
    }
}

/// Pivots a row-oriented result into the column-oriented dataframe shape.
fn pivot(set: RowSet) -> DataFrame {
    let mut frame = DataFrame::new();
    for (idx, column) in set.columns.iter().enumerate() {
        let values: Vec<Value> = set
            .rows
            .iter()
            .map(|row| row.values.get(idx).cloned().unwrap_or(Value::Null))
            .collect();
        frame = frame.with_column(column.name.clone(), values);
    }
    frame
}
