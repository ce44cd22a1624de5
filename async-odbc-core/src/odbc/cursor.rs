//! Cursor implementation.

use crate::odbc::connection::{ConnectionShared, StatementLogger};
use crate::odbc::driver::ResultSet;
use crate::odbc::{Column, Error, FromRow, QueryResult, Row, Value};
use futures_core::stream::BoxStream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, MutexGuard};

static NEXT_CURSOR_ID: AtomicU64 = AtomicU64::new(1);

/// A statement execution context bound to one [`Connection`](crate::Connection).
///
/// The rows of the last executed statement are buffered in the cursor and
/// handed out by the fetch methods until exhausted. Operations on a cursor
/// are serialized, so a cursor can be shared between tasks through an `Arc`;
/// an execute and a fetch issued concurrently never interleave.
///
/// ```rust,no_run
/// use async_odbc_core::{Connection, Value};
///
/// # async fn example(conn: Connection) -> async_odbc_core::Result<()> {
/// let cur = conn.cursor()?;
/// cur.execute("SELECT n, v FROM t1 WHERE n > ?", &[Value::from(1)]).await?;
/// while let Some(row) = cur.fetch_one().await? {
///     let n: i64 = row.try_get(0)?;
///     let v: String = row.try_get("v")?;
///     println!("{n}: {v}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Cursor {
    conn: Arc<ConnectionShared>,
    shared: Arc<CursorShared>,
}

/// The part of a cursor its connection can reach to close it.
pub(crate) struct CursorShared {
    id: u64,
    closed: AtomicBool,
    state: Mutex<CursorState>,
}

struct CursorState {
    executed: bool,
    last_statement: Option<String>,
    columns: Arc<[Column]>,
    rows: VecDeque<Vec<Value>>,
    rows_affected: u64,
}

impl CursorState {
    fn new() -> Self {
        Self {
            executed: false,
            last_statement: None,
            columns: Arc::from(Vec::new()),
            rows: VecDeque::new(),
            rows_affected: 0,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn load(&mut self, sql: &str, result: ResultSet, rows_affected: u64) -> QueryResult {
        self.executed = true;
        self.last_statement = Some(sql.to_string());
        self.columns = Arc::from(result.columns);
        self.rows = VecDeque::from(result.rows);
        self.rows_affected = rows_affected;
        QueryResult::new(rows_affected, Arc::clone(&self.columns))
    }

    fn ensure_executed(&self) -> Result<(), Error> {
        if self.executed {
            Ok(())
        } else {
            Err(Error::CursorState("no statement has been executed"))
        }
    }

    fn next_row(&mut self) -> Option<Row> {
        let values = self.rows.pop_front()?;
        Some(Row::new(Arc::clone(&self.columns), values))
    }
}

impl CursorShared {
    /// Close without waiting. Used when the owning connection closes.
    ///
    /// If an operation currently holds the state it finds the cursor closed
    /// when it next checks, and the buffer is dropped with the cursor.
    pub(crate) fn close_now(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut state) = self.state.try_lock() {
            state.clear();
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.shared.id)
            .field("connection", &self.conn.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Cursor {
    pub(crate) fn new(conn: Arc<ConnectionShared>) -> Self {
        Self {
            conn,
            shared: Arc::new(CursorShared {
                id: NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed),
                closed: AtomicBool::new(false),
                state: Mutex::new(CursorState::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<CursorShared> {
        Arc::downgrade(&self.shared)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedResource("cursor"));
        }
        self.conn.ensure_open()
    }

    /// Acquire the cursor for one operation.
    async fn lock(&self) -> Result<MutexGuard<'_, CursorState>, Error> {
        self.ensure_open()?;
        let state = self.shared.state.lock().await;
        // the cursor may have been closed while waiting
        self.ensure_open()?;
        Ok(state)
    }

    async fn run_statement(&self, sql: &str, params: &[Value]) -> Result<ResultSet, Error> {
        let logger = StatementLogger::new(sql, &self.conn.options, self.conn.id);
        let statement = sql.to_string();
        let params = params.to_vec();
        let result = self
            .conn
            .run(move |session| session.execute(&statement, &params))
            .await;

        match &result {
            Ok(rs) => logger.finish(rs.rows_affected, rs.rows.len()),
            Err(e) => logger.fail(e),
        }
        result
    }

    /// Execute a statement, binding `params` to its `?` placeholders from
    /// left to right.
    ///
    /// Any result set of a previous statement is discarded first, also when
    /// this statement fails.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, Error> {
        let mut state = self.lock().await?;
        state.clear();

        let result = self.run_statement(sql, params).await?;
        self.ensure_open()?;
        let rows_affected = result.rows_affected;
        Ok(state.load(sql, result, rows_affected))
    }

    /// Execute a statement once per parameter set.
    ///
    /// The returned row count is the sum over all executions. The cursor keeps
    /// the result set of the last execution. Stops at the first failure.
    pub async fn execute_many<I, P>(&self, sql: &str, param_sets: I) -> Result<QueryResult, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[Value]>,
    {
        let mut state = self.lock().await?;
        state.clear();

        let mut total = 0;
        let mut last = None;
        for params in param_sets {
            let result = self.run_statement(sql, params.as_ref()).await?;
            total += result.rows_affected;
            last = Some(result);
        }
        self.ensure_open()?;
        Ok(state.load(sql, last.unwrap_or_default(), total))
    }

    /// The next unread row, or `None` once the result set is exhausted.
    pub async fn fetch_one(&self) -> Result<Option<Row>, Error> {
        let mut state = self.lock().await?;
        state.ensure_executed()?;
        Ok(state.next_row())
    }

    /// Up to `n` of the remaining rows.
    pub async fn fetch_many(&self, n: usize) -> Result<Vec<Row>, Error> {
        let mut state = self.lock().await?;
        state.ensure_executed()?;
        Ok(std::iter::from_fn(|| state.next_row()).take(n).collect())
    }

    /// All remaining rows.
    pub async fn fetch_all(&self) -> Result<Vec<Row>, Error> {
        let mut state = self.lock().await?;
        state.ensure_executed()?;
        Ok(std::iter::from_fn(|| state.next_row()).collect())
    }

    pub async fn fetch_one_as<T: FromRow>(&self) -> Result<Option<T>, Error> {
        self.fetch_one().await?.as_ref().map(T::from_row).transpose()
    }

    pub async fn fetch_all_as<T: FromRow>(&self) -> Result<Vec<T>, Error> {
        self.fetch_all().await?.iter().map(T::from_row).collect()
    }

    /// Stream the remaining rows one at a time.
    pub fn rows(&self) -> BoxStream<'_, Result<Row, Error>> {
        Box::pin(async_stream::try_stream! {
            while let Some(row) = self.fetch_one().await? {
                yield row;
            }
        })
    }

    /// Columns of the last executed statement; empty for statements without
    /// a result set.
    pub async fn columns(&self) -> Result<Vec<Column>, Error> {
        let state = self.lock().await?;
        Ok(state.columns.to_vec())
    }

    /// Rows changed by the last executed statement.
    pub async fn rows_affected(&self) -> Result<u64, Error> {
        let state = self.lock().await?;
        Ok(state.rows_affected)
    }

    pub async fn last_statement(&self) -> Result<Option<String>, Error> {
        let state = self.lock().await?;
        Ok(state.last_statement.clone())
    }

    /// Commit on the owning connection.
    pub async fn commit(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.conn.commit().await
    }

    /// Roll back on the owning connection.
    pub async fn rollback(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.conn.rollback().await
    }

    /// Release the buffered result set. The cursor can not be used afterwards.
    ///
    /// Closing an already closed cursor does nothing.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.state.lock().await.clear();
        log::trace!("closed cursor {} of connection {}", self.shared.id, self.conn.id);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire) || self.conn.is_closed()
    }
}
