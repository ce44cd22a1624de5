//! Connection factory.

use crate::odbc::{ConnectOptions, Connection, Error};
use std::time::Duration;

/// Per-connection changes applied on top of a factory's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub autocommit: Option<bool>,
    pub echo: Option<bool>,
    /// `Some(None)` disables the timeout.
    pub connect_timeout: Option<Option<Duration>>,
}

impl Overrides {
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = Some(enabled);
        self
    }

    pub fn echo(mut self, enabled: bool) -> Self {
        self.echo = Some(enabled);
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn apply(&self, mut options: ConnectOptions) -> ConnectOptions {
        if let Some(autocommit) = self.autocommit {
            options.autocommit = autocommit;
        }
        if let Some(echo) = self.echo {
            options.echo = echo;
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout = timeout;
        }
        options
    }
}

/// Opens independent connections from one set of default options.
///
/// The defaults are fixed when the factory is built. Each connection gets its
/// own copy, so nothing set on one connection reaches the next.
///
/// ```rust,no_run
/// use async_odbc_core::{make_factory, ConnectOptions, Overrides};
///
/// # async fn example() -> async_odbc_core::Result<()> {
/// let factory = make_factory("Driver=SQLite3;Database=sqlite.db", ConnectOptions::default().autocommit(true));
/// let conn = factory.connect().await?;
/// let manual = factory.connect_with(Overrides::default().autocommit(false)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    options: ConnectOptions,
}

impl ConnectionFactory {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }

    /// The defaults every connection starts from.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Open a connection with the default options.
    pub async fn connect(&self) -> Result<Connection, Error> {
        Connection::open(&self.options).await
    }

    /// Open a connection with `overrides` applied to the defaults.
    pub async fn connect_with(&self, overrides: Overrides) -> Result<Connection, Error> {
        let options = overrides.apply(self.options.clone());
        Connection::open(&options).await
    }
}

/// Build a factory for `dsn`, taking every other setting from `defaults`.
pub fn make_factory(dsn: &str, defaults: ConnectOptions) -> ConnectionFactory {
    ConnectionFactory::new(defaults.connection_string(dsn))
}
