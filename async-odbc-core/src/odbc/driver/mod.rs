//! Driver backends.
//!
//! A [`Driver`] opens [`Session`]s; a session is one live database handle.
//! Both traits are blocking. Connections and cursors only ever call them from
//! tokio's blocking pool, one call at a time per session.

use crate::odbc::{Backend, Column, ConnectOptions, ConnectionString, Error, Value};
use std::sync::Arc;

#[cfg(feature = "odbc")]
mod manager;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "odbc")]
pub use manager::OdbcDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

/// Opens sessions for a connection string.
pub trait Driver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Establish a session. `options.autocommit` is the commit mode the
    /// session must start in.
    fn connect(
        &self,
        connection_string: &ConnectionString,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Session>, Error>;
}

/// A single driver-level database session.
pub trait Session: Send {
    /// Run one statement, binding `params` to its `?` placeholders in order,
    /// and read back its complete result.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, Error>;

    /// Make pending changes durable.
    fn commit(&mut self) -> Result<(), Error>;

    /// Discard pending changes.
    fn rollback(&mut self) -> Result<(), Error>;

    /// Switch the commit mode. Turning autocommit on commits pending work.
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), Error>;

    /// Check the session is still usable.
    fn ping(&mut self) -> Result<(), Error> {
        self.execute("SELECT 1", &[]).map(|_| ())
    }

    /// Release the session. Uncommitted work is discarded.
    fn close(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}

/// The complete outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a data-modifying statement; 0 for queries.
    pub rows_affected: u64,
}

impl ResultSet {
    /// Outcome of a statement that produced no result set.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Default::default()
        }
    }
}

const SQLITE_DRIVER_NAMES: &[&str] = &[
    "sqlite",
    "sqlite3",
    "sqlite odbc driver",
    "sqlite3 odbc driver",
];

fn is_sqlite_driver_name(name: &str) -> bool {
    SQLITE_DRIVER_NAMES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name.trim()))
}

/// Pick the driver that opens `connection_string`.
pub(crate) fn resolve(
    options: &ConnectOptions,
    connection_string: &ConnectionString,
) -> Result<Arc<dyn Driver>, Error> {
    if let Some(driver) = &options.driver {
        return Ok(Arc::clone(driver));
    }

    match options.backend {
        Backend::Sqlite => sqlite_driver(),
        Backend::Odbc => odbc_driver(),
        Backend::Auto => {
            let names_sqlite = connection_string
                .driver()
                .is_some_and(is_sqlite_driver_name);
            if cfg!(feature = "sqlite") && names_sqlite {
                sqlite_driver()
            } else {
                odbc_driver()
            }
        }
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_driver() -> Result<Arc<dyn Driver>, Error> {
    Ok(Arc::new(SqliteDriver))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_driver() -> Result<Arc<dyn Driver>, Error> {
    Err(Error::Connection(
        "the embedded SQLite driver is not available, enable the `sqlite` feature".into(),
    ))
}

#[cfg(feature = "odbc")]
fn odbc_driver() -> Result<Arc<dyn Driver>, Error> {
    Ok(Arc::new(OdbcDriver))
}

#[cfg(not(feature = "odbc"))]
fn odbc_driver() -> Result<Arc<dyn Driver>, Error> {
    Err(Error::Connection(
        "no driver available for this connection string, enable the `odbc` feature to use the ODBC driver manager".into(),
    ))
}
