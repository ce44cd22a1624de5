//! Async database access over ODBC-style connection strings.
//!
//! ## Connection strings
//!
//! Connections are described by standard ODBC connection strings:
//!
//! ```text
//! // DSN-based connection
//! DSN=MyDataSource;UID=myuser;PWD=mypassword
//!
//! // Driver-based connection
//! Driver={ODBC Driver 18 for SQL Server};Server=localhost;Database=test
//!
//! // Embedded SQLite, no driver manager required
//! Driver=SQLite3;Database=sqlite.db
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_odbc_core::{Connection, Value};
//!
//! # async fn example() -> async_odbc_core::Result<()> {
//! let conn = Connection::connect("Driver=SQLite3;Database=sqlite.db", true).await?;
//! let cur = conn.cursor()?;
//! cur.execute("INSERT INTO t1(n, v) VALUES(?, ?)", &[Value::from(2), Value::from("test 2")])
//!     .await?;
//! cur.close().await;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

mod column;
mod connection;
mod connection_string;
mod cursor;
pub mod driver;
mod error;
mod factory;
mod from_row;
mod options;
mod query_result;
mod row;
mod type_info;
pub mod types;
mod value;

pub use column::{Column, ColumnIndex};
pub use connection::Connection;
pub use connection_string::ConnectionString;
pub use cursor::Cursor;
pub use driver::{Driver, ResultSet, Session};
pub use error::{BoxDynError, DatabaseError, Error, ErrorKind, Result};
pub use factory::{ConnectionFactory, Overrides, make_factory};
pub use from_row::FromRow;
pub use options::{Backend, ConnectOptions};
pub use query_result::QueryResult;
pub use row::Row;
pub use type_info::{DataType, TypeInfo};
pub use types::Decode;
pub use value::Value;
