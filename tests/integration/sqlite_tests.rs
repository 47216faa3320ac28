//! End-to-end tests against live sqlite database files.
//!
//! Each test gets its own scratch directory, so tests are independent and
//! can run in parallel.

use std::path::{Path, PathBuf};

use dbfactory::{
    connect, ConnectionError, ConnectionParams, EngineType, Error, ExecutionError, Session, Value,
    WriteMode,
};
use dbfactory::DataFrame;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Fresh scratch directory for one test.
fn scratch_dir() -> PathBuf {
    init_tracing();
    let base = std::env::var("TEST_SQLITE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir());
    let dir = base.join(format!("dbfactory-it-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

async fn sqlite_session(dir: &Path) -> Session {
    let params = ConnectionParams::new()
        .with_database("it_db")
        .with_sqlite_db_path(dir.to_string_lossy());
    connect(EngineType::Sqlite, params)
        .await
        .expect("sqlite session should open")
}

fn sample_frame() -> DataFrame {
    DataFrame::new()
        .with_column("id", vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        .with_column(
            "name",
            vec![
                Value::Text("alpha".into()),
                Value::Text("beta".into()),
                Value::Text("gamma".into()),
            ],
        )
        .with_column(
            "score",
            vec![Value::Float(1.5), Value::Float(2.5), Value::Float(3.5)],
        )
        .with_column(
            "note",
            vec![Value::Null, Value::Text("kept".into()), Value::Null],
        )
}

#[tokio::test]
async fn test_select_one_returns_a_single_int_row() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    let result = session.execute("select 1").await.expect("should execute");
    let rows = result.rows().expect("select should produce rows");
    assert_eq!(rows.row_count(), 1);
    assert_eq!(rows.rows[0].values, vec![Value::Int(1)]);

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_ddl_and_dml_round_trip() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    let created = session
        .execute("CREATE TABLE items (id INTEGER, label TEXT)")
        .await
        .expect("create should succeed");
    assert_eq!(created.affected(), Some(0));

    let inserted = session
        .execute("INSERT INTO items (id, label) VALUES (1, 'one'), (2, 'two')")
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.affected(), Some(2));

    let updated = session
        .execute("UPDATE items SET label = 'uno' WHERE id = 1")
        .await
        .expect("update should succeed");
    assert_eq!(updated.affected(), Some(1));

    let result = session
        .execute("SELECT id, label FROM items ORDER BY id")
        .await
        .expect("select should succeed");
    let rows = result.rows().expect("select should produce rows");
    assert_eq!(rows.columns[0].name, "id");
    assert_eq!(rows.columns[1].name, "label");
    assert_eq!(rows.rows[0].values, vec![Value::Int(1), Value::Text("uno".into())]);
    assert_eq!(rows.rows[1].values, vec![Value::Int(2), Value::Text("two".into())]);

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_pragma_is_classified_as_row_returning() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    let result = session
        .execute("PRAGMA user_version")
        .await
        .expect("pragma should execute");
    let rows = result.rows().expect("pragma should produce rows");
    assert_eq!(rows.rows[0].values, vec![Value::Int(0)]);

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_write_dataframe_replace_creates_and_loads_the_table() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    let written = session
        .write_dataframe("measurements", &sample_frame(), WriteMode::Replace)
        .await
        .expect("write should succeed");
    assert_eq!(written.affected(), Some(3));

    let result = session
        .execute("SELECT id, name, score, note FROM measurements ORDER BY id")
        .await
        .expect("select should succeed");
    let rows = result.rows().expect("select should produce rows");
    assert_eq!(rows.row_count(), 3);
    assert_eq!(
        rows.rows[0].values,
        vec![
            Value::Int(1),
            Value::Text("alpha".into()),
            Value::Float(1.5),
            Value::Null,
        ]
    );
    assert_eq!(rows.rows[1].values[3], Value::Text("kept".into()));

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_replace_twice_keeps_only_the_second_payload() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    session
        .write_dataframe("reloads", &sample_frame(), WriteMode::Replace)
        .await
        .expect("first write should succeed");

    let second = DataFrame::new()
        .with_column("id", vec![Value::Int(10), Value::Int(20)])
        .with_column(
            "name",
            vec![Value::Text("ten".into()), Value::Text("twenty".into())],
        );
    let written = session
        .write_dataframe("reloads", &second, WriteMode::Replace)
        .await
        .expect("second write should succeed");
    assert_eq!(written.affected(), Some(2));

    let result = session
        .execute("SELECT id FROM reloads ORDER BY id")
        .await
        .expect("select should succeed");
    let rows = result.rows().expect("select should produce rows");
    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.rows[0].values, vec![Value::Int(10)]);
    assert_eq!(rows.rows[1].values, vec![Value::Int(20)]);

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_append_mode_is_rejected_before_touching_the_table() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    session
        .write_dataframe("guarded", &sample_frame(), WriteMode::Replace)
        .await
        .expect("initial write should succeed");

    let err = session
        .write_dataframe("guarded", &sample_frame(), WriteMode::Append)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::UnsupportedMode(mode)) if mode == "append"
    ));

    // The rejected write must not have mutated the table.
    let result = session
        .execute("SELECT count(*) FROM guarded")
        .await
        .expect("count should succeed");
    let rows = result.rows().expect("count should produce rows");
    assert_eq!(rows.rows[0].values, vec![Value::Int(3)]);

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_query_dataframe_pivots_into_columns() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    session
        .write_dataframe("pivoted", &sample_frame(), WriteMode::Replace)
        .await
        .expect("write should succeed");

    let frame = session
        .query_dataframe("SELECT id, name FROM pivoted ORDER BY id")
        .await
        .expect("query should succeed");
    assert_eq!(frame.columns.len(), 2);
    assert_eq!(frame.columns[0].name, "id");
    assert_eq!(
        frame.columns[0].values,
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    assert_eq!(frame.columns[1].values[2], Value::Text("gamma".into()));

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_double_close_is_a_no_op() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;
    assert!(session.is_open());

    session.close().await.expect("first close should succeed");
    assert!(!session.is_open());
    session.close().await.expect("second close should also succeed");
    assert!(!session.is_open());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_execute_after_close_is_a_connection_error() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;
    session.close().await.expect("should close");

    let err = session.execute("select 1").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::SessionClosed)
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_ping_round_trips_while_open_and_fails_closed() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    session.ping().await.expect("ping should succeed while open");

    session.close().await.expect("should close");
    let err = session.ping().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::SessionClosed)
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_statement_errors_carry_the_engine_message() {
    let dir = scratch_dir();
    let mut session = sqlite_session(&dir).await;

    let err = session
        .execute("SELECT * FROM missing_table")
        .await
        .unwrap_err();
    match err {
        Error::Execution(ExecutionError::Statement(message)) => {
            assert!(message.contains("missing_table"), "got: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_unreachable_database_path_is_a_connection_error() {
    let dir = scratch_dir();
    // A regular file where the directory should be makes the database
    // file impossible to create.
    let blocker = dir.join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("blocker file should be writable");

    let params = ConnectionParams::new()
        .with_database("it_db")
        .with_sqlite_db_path(blocker.to_string_lossy());
    let err = connect(EngineType::Sqlite, params).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::Failed {
            engine: EngineType::Sqlite,
            ..
        })
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_session_reports_engine_and_redacted_target() {
    let dir = scratch_dir();
    let session = sqlite_session(&dir).await;

    assert_eq!(session.engine_type(), EngineType::Sqlite);
    assert!(session.target().starts_with("sqlite://"));
    assert!(session.target().ends_with("it_db.db"));

    // Sessions show up in assertion failures, so Debug must render.
    let rendered = format!("{session:?}");
    assert!(rendered.contains("Sqlite"), "got: {rendered}");

    let mut session = session;
    session.close().await.expect("should close");
    let _ = std::fs::remove_dir_all(&dir);
}
