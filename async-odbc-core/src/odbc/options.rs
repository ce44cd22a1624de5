//! Connection options.

use crate::odbc::driver::Driver;
use crate::odbc::{Connection, Error};
use std::fmt::{self, Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which driver opens a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Embedded SQLite when the `Driver` attribute names SQLite, otherwise the
    /// ODBC driver manager.
    #[default]
    Auto,
    /// Always use the embedded SQLite driver.
    Sqlite,
    /// Always go through the ODBC driver manager.
    Odbc,
}

/// Options for connecting to a data source.
#[derive(Clone)]
pub struct ConnectOptions {
    /// The ODBC connection string
    pub(crate) connection_string: String,
    /// Persist each statement as soon as it executes
    pub(crate) autocommit: bool,
    /// Log every statement at `Info`
    pub(crate) echo: bool,
    /// Connection timeout
    pub(crate) connect_timeout: Option<Duration>,
    /// Statement logging level
    pub(crate) log_statements: log::LevelFilter,
    /// Slow statement threshold
    pub(crate) log_slow_statements: (log::LevelFilter, Duration),
    pub(crate) backend: Backend,
    pub(crate) driver: Option<Arc<dyn Driver>>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            autocommit: false,
            echo: false,
            connect_timeout: Some(Duration::from_secs(30)),
            log_statements: log::LevelFilter::Debug,
            log_slow_statements: (log::LevelFilter::Warn, Duration::from_secs(1)),
            backend: Backend::Auto,
            driver: None,
        }
    }
}

impl Debug for ConnectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("connection_string", &self.connection_string)
            .field("autocommit", &self.autocommit)
            .field("echo", &self.echo)
            .field("connect_timeout", &self.connect_timeout)
            .field("log_statements", &self.log_statements)
            .field("log_slow_statements", &self.log_slow_statements)
            .field("backend", &self.backend)
            .field("driver", &self.driver.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

impl ConnectOptions {
    /// Create new options with the given connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Create options from a DSN
    pub fn from_dsn(dsn: impl Into<String>) -> Self {
        let dsn = dsn.into();
        Self::new(format!("DSN={}", dsn))
    }

    /// Set the connection string
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    /// Get the connection string
    pub fn get_connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Commit every statement as soon as it succeeds.
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    pub fn get_autocommit(&self) -> bool {
        self.autocommit
    }

    /// Log every executed statement at `Info`.
    pub fn echo(mut self, enabled: bool) -> Self {
        self.echo = enabled;
        self
    }

    pub fn get_echo(&self) -> bool {
        self.echo
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Wait for the driver without a bound.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    pub fn get_connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn log_statements(mut self, level: log::LevelFilter) -> Self {
        self.log_statements = level;
        self
    }

    pub fn log_slow_statements(mut self, level: log::LevelFilter, duration: Duration) -> Self {
        self.log_slow_statements = (level, duration);
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn get_backend(&self) -> Backend {
        self.backend
    }

    /// Open sessions through a custom driver instead of the built-in ones.
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Add a username to the connection string
    pub fn username(self, username: &str) -> Self {
        self.attribute("UID", username)
    }

    /// Add a password to the connection string
    pub fn password(self, password: &str) -> Self {
        self.attribute("PWD", password)
    }

    /// Add a driver to the connection string
    pub fn driver_name(mut self, driver: &str) -> Self {
        self.separate();
        self.connection_string.push_str("Driver={");
        self.connection_string.push_str(driver);
        self.connection_string.push('}');
        self
    }

    /// Add a server to the connection string
    pub fn server(self, server: &str) -> Self {
        self.attribute("Server", server)
    }

    /// Add a database to the connection string
    pub fn database(self, database: &str) -> Self {
        self.attribute("Database", database)
    }

    fn attribute(mut self, key: &str, value: &str) -> Self {
        self.separate();
        self.connection_string.push_str(key);
        self.connection_string.push('=');
        if value.contains(';') || value.starts_with('{') {
            self.connection_string.push('{');
            self.connection_string.push_str(&value.replace('}', "}}"));
            self.connection_string.push('}');
        } else {
            self.connection_string.push_str(value);
        }
        self
    }

    fn separate(&mut self) {
        if !self.connection_string.is_empty() && !self.connection_string.ends_with(';') {
            self.connection_string.push(';');
        }
    }

    /// The level ordinary statements are logged at.
    pub(crate) fn statement_level(&self) -> log::LevelFilter {
        if self.echo {
            log::LevelFilter::Info
        } else {
            self.log_statements
        }
    }

    /// Open a connection with these options.
    pub async fn connect(&self) -> Result<Connection, Error> {
        Connection::open(self).await
    }
}

impl FromStr for ConnectOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Handle URL-style connection strings
        let conn_str = s
            .strip_prefix("odbc://")
            .or_else(|| s.strip_prefix("odbc:"))
            .unwrap_or(s);
        crate::odbc::ConnectionString::parse(conn_str)?;
        Ok(Self::new(conn_str))
    }
}
