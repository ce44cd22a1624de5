//! Connection and cursor tests against the embedded SQLite driver.
//!
//! Each test gets its own database file so that separate connections see the
//! same data.

#![cfg(feature = "sqlite")]

use async_odbc_core::driver::{Driver, ResultSet, Session};
use async_odbc_core::{
    ConnectOptions, Connection, ConnectionFactory, ConnectionString, DatabaseError, Error,
    Overrides, Value,
};
use futures_util::TryStreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// A fresh on-disk database; the directory lives as long as the returned guard.
fn database() -> (TempDir, ConnectOptions) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("sqlite.db");
    let options = ConnectOptions::new("Driver=SQLite3").database(&path.to_string_lossy());
    (dir, options)
}

async fn connect(options: &ConnectOptions, autocommit: bool) -> Connection {
    Connection::open(&options.clone().autocommit(autocommit))
        .await
        .expect("Failed to connect to database")
}

async fn create_t1(options: &ConnectOptions) {
    let conn = connect(options, true).await;
    conn.execute("CREATE TABLE t1(n INTEGER, v TEXT)", &[])
        .await
        .expect("Failed to create table");
    conn.close().await.unwrap();
}

async fn count_t1(options: &ConnectOptions) -> i64 {
    let conn = connect(options, true).await;
    let rows = conn.execute("SELECT COUNT(*) FROM t1", &[]).await.unwrap();
    conn.close().await.unwrap();
    rows[0].try_get(0).unwrap()
}

#[tokio::test]
async fn test_last_insert_rowid_after_first_insert() {
    let (_dir, options) = database();
    let conn = connect(&options, true).await;

    let cur = conn.cursor().unwrap();
    cur.execute("CREATE TABLE t1(n INTEGER, v TEXT)", &[])
        .await
        .unwrap();
    let inserted = cur
        .execute(
            "INSERT INTO t1(n, v) VALUES(?, ?)",
            &[Value::from(2), Value::from("test 2")],
        )
        .await
        .unwrap();
    assert_eq!(inserted.rows_affected(), 1);

    cur.execute("SELECT last_insert_rowid()", &[]).await.unwrap();
    let rows = cur.fetch_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 1);
    assert_eq!(rows[0].try_get::<i64, _>(0).unwrap(), 1);

    cur.close().await;
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_uncommitted_insert_lost_on_close() {
    let (_dir, options) = database();
    create_t1(&options).await;

    let conn = connect(&options, false).await;
    let cur = conn.cursor().unwrap();
    cur.execute(
        "INSERT INTO t1(n, v) VALUES(?, ?)",
        &[Value::from(2), Value::from("test 2")],
    )
    .await
    .unwrap();
    cur.close().await;
    conn.close().await.unwrap();

    let conn = connect(&options, false).await;
    let cur = conn.cursor().unwrap();
    cur.execute("SELECT * FROM t1", &[]).await.unwrap();
    assert!(cur.fetch_all().await.unwrap().is_empty());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_insert_select_round_trip() {
    let (_dir, options) = database();
    create_t1(&options).await;

    let conn = connect(&options, true).await;
    let cur = conn.cursor().unwrap();
    cur.execute(
        "INSERT INTO t1(n, v) VALUES(?, ?)",
        &[Value::from(7), Value::from("seven")],
    )
    .await
    .unwrap();

    let result = cur
        .execute("SELECT n, v FROM t1 WHERE n = ?", &[Value::from(7)])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 0);
    assert_eq!(result.columns().len(), 2);
    assert_eq!(result.columns()[0].name(), "n");

    let row: Option<(i64, String)> = cur.fetch_one_as().await.unwrap();
    assert_eq!(row, Some((7, "seven".to_string())));
    assert_eq!(
        cur.last_statement().await.unwrap().as_deref(),
        Some("SELECT n, v FROM t1 WHERE n = ?")
    );
}

#[tokio::test]
async fn test_null_parameter_round_trip() {
    let (_dir, options) = database();
    create_t1(&options).await;

    let conn = connect(&options, true).await;
    conn.execute(
        "INSERT INTO t1(n, v) VALUES(?, ?)",
        &[Value::from(1), Value::Null],
    )
    .await
    .unwrap();

    let rows = conn.execute("SELECT v FROM t1", &[]).await.unwrap();
    assert!(rows[0].get(0).is_null());
    assert_eq!(rows[0].try_get::<Option<String>, _>("v").unwrap(), None);
}

#[tokio::test]
async fn test_autocommit_visibility() {
    let (_dir, options) = database();
    create_t1(&options).await;

    // manual commit: invisible to other connections until commit
    let writer = connect(&options, false).await;
    writer
        .execute("INSERT INTO t1(n, v) VALUES(1, 'one')", &[])
        .await
        .unwrap();
    assert_eq!(count_t1(&options).await, 0);
    writer.commit().await.unwrap();
    assert_eq!(count_t1(&options).await, 1);
    writer.close().await.unwrap();

    // autocommit: visible immediately
    let writer = connect(&options, true).await;
    writer
        .execute("INSERT INTO t1(n, v) VALUES(2, 'two')", &[])
        .await
        .unwrap();
    assert_eq!(count_t1(&options).await, 2);
    writer.close().await.unwrap();
}

#[tokio::test]
async fn test_rollback_discards_changes() {
    let (_dir, options) = database();
    create_t1(&options).await;

    let conn = connect(&options, false).await;
    let cur = conn.cursor().unwrap();
    cur.execute("INSERT INTO t1(n, v) VALUES(1, 'one')", &[])
        .await
        .unwrap();
    cur.rollback().await.unwrap();
    cur.execute("SELECT COUNT(*) FROM t1", &[]).await.unwrap();
    let count: Option<(i64,)> = cur.fetch_one_as().await.unwrap();
    assert_eq!(count, Some((0,)));
}

#[tokio::test]
async fn test_enabling_autocommit_commits_pending_work() {
    let (_dir, options) = database();
    create_t1(&options).await;

    let conn = connect(&options, false).await;
    conn.execute("INSERT INTO t1(n, v) VALUES(1, 'one')", &[])
        .await
        .unwrap();
    assert!(!conn.autocommit());
    conn.set_autocommit(true).await.unwrap();
    assert!(conn.autocommit());
    assert_eq!(count_t1(&options).await, 1);
}

#[tokio::test]
async fn test_commit_and_rollback_noop_in_autocommit_mode() {
    let (_dir, options) = database();
    let conn = connect(&options, true).await;
    conn.commit().await.unwrap();
    conn.rollback().await.unwrap();
    conn.ping().await.unwrap();
}

#[tokio::test]
async fn test_closing_connection_closes_all_cursors() {
    let (_dir, options) = database();
    let conn = connect(&options, true).await;

    let cursors: Vec<_> = (0..5).map(|_| conn.cursor().unwrap()).collect();
    cursors[0].execute("SELECT 1", &[]).await.unwrap();
    assert!(cursors.iter().all(|c| !c.is_closed()));

    conn.close().await.unwrap();
    assert!(conn.is_closed());
    for cursor in &cursors {
        assert!(cursor.is_closed());
        assert!(matches!(
            cursor.fetch_one().await,
            Err(Error::ClosedResource(_))
        ));
    }
}

#[tokio::test]
async fn test_closed_resources_fail_every_time() {
    let (_dir, options) = database();
    let conn = connect(&options, false).await;
    let cur = conn.cursor().unwrap();

    cur.close().await;
    cur.close().await;
    for _ in 0..3 {
        assert!(matches!(
            cur.execute("SELECT 1", &[]).await,
            Err(Error::ClosedResource("cursor"))
        ));
        assert!(matches!(
            cur.fetch_all().await,
            Err(Error::ClosedResource("cursor"))
        ));
    }

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    for _ in 0..3 {
        assert!(matches!(conn.cursor(), Err(Error::ClosedResource("connection"))));
        assert!(matches!(conn.commit().await, Err(Error::ClosedResource(_))));
        assert!(matches!(conn.rollback().await, Err(Error::ClosedResource(_))));
        assert!(matches!(
            conn.execute("SELECT 1", &[]).await,
            Err(Error::ClosedResource(_))
        ));
    }
}

#[tokio::test]
async fn test_fetch_before_execute_and_after_exhaustion() {
    let (_dir, options) = database();
    let conn = connect(&options, true).await;
    let cur = conn.cursor().unwrap();

    assert!(matches!(cur.fetch_one().await, Err(Error::CursorState(_))));
    assert!(matches!(cur.fetch_all().await, Err(Error::CursorState(_))));

    cur.execute("SELECT 1 UNION ALL SELECT 2", &[])
        .await
        .unwrap();
    assert_eq!(cur.fetch_many(5).await.unwrap().len(), 2);
    assert!(cur.fetch_one().await.unwrap().is_none());
    assert!(cur.fetch_one().await.unwrap().is_none());
    assert!(cur.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_parameter_arity_mismatch() {
    let (_dir, options) = database();
    create_t1(&options).await;
    let conn = connect(&options, true).await;
    let cur = conn.cursor().unwrap();

    let err = cur
        .execute("INSERT INTO t1(n, v) VALUES(?, ?)", &[Value::from(1)])
        .await
        .unwrap_err();
    assert!(err.is_parameter_binding(), "{err}");
    assert!(matches!(cur.fetch_one().await, Err(Error::CursorState(_))));

    // the cursor is still usable
    cur.execute(
        "INSERT INTO t1(n, v) VALUES(?, ?)",
        &[Value::from(1), Value::from("one")],
    )
    .await
    .unwrap();

    let err = cur
        .execute("SELECT * FROM t1 WHERE n = :n", &[Value::from(1)])
        .await
        .unwrap_err();
    assert!(err.is_parameter_binding(), "{err}");
}

#[tokio::test]
async fn test_malformed_sql_reports_driver_message() {
    let (_dir, options) = database();
    let conn = connect(&options, true).await;
    let cur = conn.cursor().unwrap();

    match cur.execute("SELECT 42 AS;", &[]).await {
        Err(Error::Query(e)) => assert!(e.message().contains("syntax error"), "{e}"),
        other => panic!("expected a query error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_many_sums_rows_affected() {
    let (_dir, options) = database();
    create_t1(&options).await;
    let conn = connect(&options, true).await;
    let cur = conn.cursor().unwrap();

    let sets = (1..=3).map(|n| vec![Value::from(n), Value::from(format!("test {n}"))]);
    let result = cur
        .execute_many("INSERT INTO t1(n, v) VALUES(?, ?)", sets)
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 3);
    assert_eq!(cur.rows_affected().await.unwrap(), 3);

    cur.execute("SELECT n, v FROM t1 ORDER BY n", &[])
        .await
        .unwrap();
    let columns = cur.columns().await.unwrap();
    assert_eq!(columns[1].name(), "v");

    let rows: Vec<_> = cur.rows().try_collect().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].try_get::<String, _>("v").unwrap(), "test 3");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cursor_shared_between_tasks() {
    let (_dir, options) = database();
    let conn = connect(&options, true).await;
    let cur = Arc::new(conn.cursor().unwrap());

    let mut handles = Vec::new();
    for k in 0..16i64 {
        let cur = Arc::clone(&cur);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                cur.execute(
                    "SELECT ? UNION ALL SELECT ? UNION ALL SELECT ?",
                    &[Value::from(k), Value::from(k), Value::from(k)],
                )
                .await
                .unwrap();
                let rows = cur.fetch_all().await.unwrap();
                // another task may have drained or replaced the result, but a
                // fetch never mixes rows of two executions
                let values: Vec<i64> = rows.iter().map(|r| r.try_get(0).unwrap()).collect();
                assert!(values.is_empty() || values.len() == 3, "{values:?}");
                assert!(values.windows(2).all(|w| w[0] == w[1]), "{values:?}");
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_factory_overrides_do_not_leak() {
    let (_dir, options) = database();
    let factory = ConnectionFactory::new(options.clone().autocommit(false));

    let conn = factory
        .connect_with(Overrides::default().autocommit(true))
        .await
        .unwrap();
    assert!(conn.autocommit());
    conn.close().await.unwrap();

    let conn = factory.connect().await.unwrap();
    assert!(!conn.autocommit());
    assert!(!factory.options().get_autocommit());

    let other = factory.connect().await.unwrap();
    other.set_autocommit(true).await.unwrap();
    assert!(!conn.autocommit());
}

#[tokio::test]
async fn test_missing_driver_manager_is_a_connection_error() {
    if cfg!(feature = "odbc") {
        return;
    }
    let err = Connection::connect("DSN=Warehouse", true).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[tokio::test]
async fn test_malformed_connection_string() {
    let err = Connection::connect("Driver={SQLite3", true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

/// A driver whose sessions count their releases and can misbehave on demand.
#[derive(Default)]
struct ScriptedDriver {
    closed: Arc<AtomicUsize>,
    connect_delay: Option<Duration>,
    execute_delay: Option<Duration>,
    close_delay: Option<Duration>,
    reject_commit: bool,
}

struct ScriptedSession {
    closed: Arc<AtomicUsize>,
    execute_delay: Option<Duration>,
    close_delay: Option<Duration>,
    reject_commit: bool,
}

impl Driver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(
        &self,
        _: &ConnectionString,
        _: &ConnectOptions,
    ) -> Result<Box<dyn Session>, Error> {
        if let Some(delay) = self.connect_delay {
            std::thread::sleep(delay);
        }
        Ok(Box::new(ScriptedSession {
            closed: Arc::clone(&self.closed),
            execute_delay: self.execute_delay,
            close_delay: self.close_delay,
            reject_commit: self.reject_commit,
        }))
    }
}

impl Session for ScriptedSession {
    fn execute(&mut self, _: &str, _: &[Value]) -> Result<ResultSet, Error> {
        if let Some(delay) = self.execute_delay {
            std::thread::sleep(delay);
        }
        Ok(ResultSet::affected(1))
    }

    fn commit(&mut self) -> Result<(), Error> {
        if self.reject_commit {
            Err(Error::Transaction(DatabaseError::new(
                "[40001] serialization failure",
            )))
        } else {
            Ok(())
        }
    }

    fn rollback(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn set_autocommit(&mut self, _: bool) -> Result<(), Error> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), Error> {
        if let Some(delay) = self.close_delay {
            std::thread::sleep(delay);
        }
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn scripted(driver: ScriptedDriver) -> ConnectOptions {
    ConnectOptions::new("DSN=scripted").driver(Arc::new(driver))
}

/// Wait up to two seconds for `closed` to reach `expected`, then check it
/// stays there.
async fn assert_closed_count(closed: &AtomicUsize, expected: usize) {
    for _ in 0..100 {
        if closed.load(Ordering::SeqCst) >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(closed.load(Ordering::SeqCst), expected);
}

#[tokio::test]
async fn test_rejected_commit_is_a_transaction_error() {
    let options = scripted(ScriptedDriver {
        reject_commit: true,
        ..Default::default()
    });
    let conn = Connection::open(&options).await.unwrap();
    conn.execute("UPDATE t SET n = 1", &[]).await.unwrap();

    match conn.commit().await {
        Err(Error::Transaction(e)) => assert_eq!(e.sqlstate(), Some("40001")),
        other => panic!("expected a transaction error, got {other:?}"),
    }
    // the connection remains usable
    conn.rollback().await.unwrap();
}

#[tokio::test]
async fn test_drop_releases_session_once() {
    let closed = Arc::new(AtomicUsize::new(0));
    let options = scripted(ScriptedDriver {
        closed: Arc::clone(&closed),
        ..Default::default()
    });

    let conn = Connection::open(&options).await.unwrap();
    let cur = conn.cursor().unwrap();
    drop(conn);
    assert!(cur.is_closed());
    assert_closed_count(&closed, 1).await;

    let conn = Connection::open(&options).await.unwrap();
    conn.close().await.unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 2);
    drop(conn);
    assert_closed_count(&closed, 2).await;
}

#[tokio::test]
async fn test_drop_releases_session_off_the_scheduler() {
    let closed = Arc::new(AtomicUsize::new(0));
    let options = scripted(ScriptedDriver {
        closed: Arc::clone(&closed),
        close_delay: Some(Duration::from_millis(300)),
        ..Default::default()
    });

    let conn = Connection::open(&options).await.unwrap();
    let started = std::time::Instant::now();
    drop(conn);
    assert!(
        started.elapsed() < Duration::from_millis(150),
        "drop blocked for {:?}",
        started.elapsed()
    );

    // timers keep firing while the session is released
    let ticked = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(ticked.elapsed() < Duration::from_millis(150));

    assert_closed_count(&closed, 1).await;
}

#[tokio::test]
async fn test_cancelled_task_releases_session() {
    let closed = Arc::new(AtomicUsize::new(0));
    let options = scripted(ScriptedDriver {
        closed: Arc::clone(&closed),
        execute_delay: Some(Duration::from_millis(300)),
        ..Default::default()
    });

    let outcome = tokio::time::timeout(Duration::from_millis(50), async {
        let conn = Connection::open(&options).await?;
        let cur = conn.cursor()?;
        cur.execute("slow statement", &[]).await
    })
    .await;
    assert!(outcome.is_err(), "the statement should have been cancelled");

    // the in-flight call releases the session once it returns
    assert_closed_count(&closed, 1).await;
}

#[tokio::test]
async fn test_connect_timeout() {
    let options = scripted(ScriptedDriver {
        connect_delay: Some(Duration::from_millis(500)),
        ..Default::default()
    })
    .connect_timeout(Duration::from_millis(50));

    let err = Connection::open(&options).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[tokio::test]
async fn test_timed_out_connect_releases_late_session() {
    let closed = Arc::new(AtomicUsize::new(0));
    let options = scripted(ScriptedDriver {
        closed: Arc::clone(&closed),
        connect_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    })
    .connect_timeout(Duration::from_millis(20));

    let err = Connection::open(&options).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
    assert_closed_count(&closed, 1).await;
}

#[tokio::test]
async fn test_abandoned_open_releases_session() {
    let closed = Arc::new(AtomicUsize::new(0));
    let options = scripted(ScriptedDriver {
        closed: Arc::clone(&closed),
        connect_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    })
    .no_connect_timeout();

    let outcome = tokio::time::timeout(Duration::from_millis(20), Connection::open(&options)).await;
    assert!(outcome.is_err(), "open should have been abandoned");
    assert_closed_count(&closed, 1).await;
}

#[tokio::test]
async fn test_multiple_statements_rejected() {
    let (_dir, options) = database();
    create_t1(&options).await;
    let conn = connect(&options, true).await;

    let err = conn
        .execute("INSERT INTO t1(n, v) VALUES(1, 'one'); DROP TABLE t1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Query(_)), "{err}");
    assert_eq!(count_t1(&options).await, 0);
}
