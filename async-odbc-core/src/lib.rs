//! Async ODBC client core.
//!
//! Connections, cursors and a connection factory over blocking database
//! drivers. Driver calls run on tokio's blocking pool.
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_odbc_core::{ConnectOptions, Connection};
//!
//! # async fn example() -> async_odbc_core::Result<()> {
//! let options = ConnectOptions::new("DSN=MyDSN;UID=user;PWD=pass").autocommit(true);
//! let conn = Connection::open(&options).await?;
//! # Ok(())
//! # }
//! ```

pub mod odbc;

// Re-export main types at crate root for convenience
pub use odbc::{
    Backend, BoxDynError, Column, ColumnIndex, ConnectOptions, Connection, ConnectionFactory,
    ConnectionString, Cursor, DataType, DatabaseError, Decode, Error, ErrorKind, FromRow,
    Overrides, QueryResult, Result, Row, TypeInfo, Value, driver, make_factory,
};
