//! Connection implementation.

use crate::odbc::driver::{self, Session};
use crate::odbc::{ConnectOptions, ConnectionString, Cursor, Error, Row, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

mod logger;

pub(crate) use logger::StatementLogger;

use crate::odbc::cursor::CursorShared;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A connection to a data source.
///
/// A connection exclusively owns one driver session. Dropping it, or calling
/// [`close`](Connection::close), closes every cursor created from it and then
/// releases the session. Uncommitted work is discarded unless autocommit is on.
///
/// ```rust,no_run
/// use async_odbc_core::{ConnectOptions, Connection};
///
/// # async fn example() -> async_odbc_core::Result<()> {
/// let options = ConnectOptions::new("Driver=SQLite3;Database=sqlite.db").autocommit(true);
/// let conn = Connection::open(&options).await?;
/// let cur = conn.cursor()?;
/// cur.execute("CREATE TABLE IF NOT EXISTS t1(n INTEGER, v TEXT)", &[]).await?;
/// cur.close().await;
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    pub(crate) shared: Arc<ConnectionShared>,
}

/// State shared between a connection and its cursors.
pub(crate) struct ConnectionShared {
    pub(crate) id: u64,
    session: Mutex<Option<Box<dyn Session>>>,
    closed: AtomicBool,
    autocommit: AtomicBool,
    cursors: Mutex<Vec<Weak<CursorShared>>>,
    pub(crate) options: ConnectOptions,
    driver_name: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("driver", &self.shared.driver_name)
            .field("autocommit", &self.autocommit())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Establish a new connection with the given options
    pub async fn open(options: &ConnectOptions) -> Result<Self, Error> {
        let connection_string = ConnectionString::parse(&options.connection_string)?;
        let driver = driver::resolve(options, &connection_string)?;
        let options = options.clone();

        let task_options = options.clone();
        let task_driver = Arc::clone(&driver);
        let mut pending = PendingConnect(Some(tokio::task::spawn_blocking(move || {
            task_driver.connect(&connection_string, &task_options)
        })));
        let session = pending.join(options.connect_timeout).await?;

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "opened connection {id} via {} (autocommit: {})",
            driver.name(),
            options.autocommit
        );

        Ok(Self {
            shared: Arc::new(ConnectionShared {
                id,
                session: Mutex::new(Some(session)),
                closed: AtomicBool::new(false),
                autocommit: AtomicBool::new(options.autocommit),
                cursors: Mutex::new(Vec::new()),
                driver_name: driver.name().to_string(),
                options,
            }),
        })
    }

    /// Open a connection from a connection string and a commit mode.
    pub async fn connect(connection_string: &str, autocommit: bool) -> Result<Self, Error> {
        Self::open(&ConnectOptions::new(connection_string).autocommit(autocommit)).await
    }

    /// Create a cursor bound to this connection.
    pub fn cursor(&self) -> Result<Cursor, Error> {
        self.shared.ensure_open()?;
        let cursor = Cursor::new(Arc::clone(&self.shared));
        let mut cursors = lock(&self.shared.cursors);
        cursors.retain(|c| c.strong_count() > 0);
        cursors.push(cursor.downgrade());
        Ok(cursor)
    }

    /// Make pending changes durable. A no-op in autocommit mode.
    pub async fn commit(&self) -> Result<(), Error> {
        self.shared.commit().await
    }

    /// Discard pending changes. A no-op in autocommit mode.
    pub async fn rollback(&self) -> Result<(), Error> {
        self.shared.rollback().await
    }

    /// Close all cursors, then release the session.
    ///
    /// Calling this more than once is fine; later calls do nothing.
    pub async fn close(&self) -> Result<(), Error> {
        if !self.shared.mark_closed() {
            return Ok(());
        }
        self.shared.close_cursors();

        let shared = Arc::clone(&self.shared);
        let released = tokio::task::spawn_blocking(move || {
            let session = lock(&shared.session).take();
            session.map_or(Ok(()), |s| s.close())
        })
        .await
        .map_err(|_| Error::WorkerCrashed)?;

        log::debug!("closed connection {}", self.shared.id);
        released
    }

    /// Run a statement on a fresh cursor and return all of its rows.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let cursor = self.cursor()?;
        cursor.execute(sql, params).await?;
        let rows = cursor.fetch_all().await;
        cursor.close().await;
        rows
    }

    /// Check the session is still usable.
    pub async fn ping(&self) -> Result<(), Error> {
        self.shared.run(|session| session.ping()).await
    }

    pub fn autocommit(&self) -> bool {
        self.shared.autocommit()
    }

    /// Switch the commit mode. Enabling autocommit commits pending work.
    pub async fn set_autocommit(&self, enabled: bool) -> Result<(), Error> {
        self.shared
            .run(move |session| session.set_autocommit(enabled))
            .await?;
        self.shared.autocommit.store(enabled, Ordering::Release);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Get the connection options
    pub fn options(&self) -> &ConnectOptions {
        &self.shared.options
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.shared.mark_closed() {
            log::debug!("connection {} dropped without close", self.shared.id);
            self.shared.close_cursors();
            // releasing may block on the driver, keep it off the scheduler
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let shared = Arc::clone(&self.shared);
                    runtime.spawn_blocking(move || shared.release_if_closed());
                }
                Err(_) => self.shared.release_if_closed(),
            }
        }
    }
}

type ConnectTask = JoinHandle<Result<Box<dyn Session>, Error>>;

/// A blocking connect in flight.
///
/// If the session is never collected, because the connect timed out or the
/// caller gave up on `open`, it is closed once the driver hands it over.
struct PendingConnect(Option<ConnectTask>);

impl PendingConnect {
    async fn join(&mut self, timeout: Option<Duration>) -> Result<Box<dyn Session>, Error> {
        let Some(task) = self.0.as_mut() else {
            return Err(Error::WorkerCrashed);
        };
        let joined = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, task).await.map_err(|_| {
                Error::Connection(format!("timed out after {timeout:?} waiting for the driver"))
            })?,
            None => task.await,
        };
        self.0 = None;
        joined.map_err(|_| Error::WorkerCrashed)?
    }
}

impl Drop for PendingConnect {
    fn drop(&mut self) {
        let Some(task) = self.0.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            let Ok(Ok(session)) = task.await else {
                return;
            };
            log::debug!("closing session of an abandoned connect");
            match tokio::task::spawn_blocking(move || session.close()).await {
                Ok(Err(e)) => log::debug!("closing abandoned session failed: {e}"),
                Err(_) => log::debug!("closing abandoned session panicked"),
                Ok(Ok(())) => {}
            }
        });
    }
}

impl ConnectionShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::ClosedResource("connection"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn autocommit(&self) -> bool {
        self.autocommit.load(Ordering::Acquire)
    }

    /// Returns `true` for the call that moved the connection to closed.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    fn close_cursors(&self) {
        let cursors = std::mem::take(&mut *lock(&self.cursors));
        for cursor in cursors.iter().filter_map(Weak::upgrade) {
            cursor.close_now();
        }
    }

    /// Drop the session if the connection is closed and no call holds it.
    ///
    /// Every path that gives up the session lock calls this, so a session in
    /// use when the connection closed is released by the call that held it.
    fn release_if_closed(&self) {
        if !self.is_closed() {
            return;
        }
        let mut guard = match self.session.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if let Some(session) = guard.take() {
            drop(guard);
            if let Err(e) = session.close() {
                log::debug!("releasing session of connection {} failed: {e}", self.id);
            }
        }
    }

    /// Run a blocking driver call on the blocking pool.
    ///
    /// Calls from all cursors of a connection are serialized on the session
    /// lock. If the caller's future is dropped the call still runs to
    /// completion, and releases the session if the connection closed meanwhile.
    pub(crate) async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Session) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_open()?;
        let shared = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = {
                let mut guard = lock(&shared.session);
                match guard.as_mut() {
                    Some(session) if !shared.is_closed() => f(&mut **session),
                    _ => Err(Error::ClosedResource("connection")),
                }
            };
            shared.release_if_closed();
            result
        })
        .await
        .map_err(|_| Error::WorkerCrashed)?
    }

    pub(crate) async fn commit(self: &Arc<Self>) -> Result<(), Error> {
        self.ensure_open()?;
        if self.autocommit() {
            return Ok(());
        }
        self.run(|session| session.commit()).await?;
        log::debug!("committed connection {}", self.id);
        Ok(())
    }

    pub(crate) async fn rollback(self: &Arc<Self>) -> Result<(), Error> {
        self.ensure_open()?;
        if self.autocommit() {
            return Ok(());
        }
        self.run(|session| session.rollback()).await?;
        log::debug!("rolled back connection {}", self.id);
        Ok(())
    }
}

/// Lock ignoring poisoning.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
