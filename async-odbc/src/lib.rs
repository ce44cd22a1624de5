//! Async ODBC client
//!
//! Connections, cursors and connection factories for ODBC data sources, with
//! an embedded SQLite driver for use without a driver manager.
//!
//! ## Features
//!
//! - **Connection strings** - `DSN=...` or `Driver={...};...`, as any ODBC tool accepts them
//! - **Async operations** - Blocking driver calls run on tokio's blocking pool
//! - **Manual or automatic commit** - Per connection, switchable at runtime
//! - **Scoped cleanup** - Dropping a connection closes its cursors and releases the session
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_odbc::{params, Connection};
//!
//! # async fn example() -> async_odbc::Result<()> {
//! let conn = Connection::connect("Driver=SQLite3;Database=sqlite.db", false).await?;
//! let cur = conn.cursor()?;
//! cur.execute("CREATE TABLE IF NOT EXISTS t1(n INTEGER, v TEXT)", &[]).await?;
//! cur.execute("INSERT INTO t1(n, v) VALUES(?, ?)", &params![2, "test 2"]).await?;
//! conn.commit().await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `macros` - Enable derive macros (includes `derive`)
//! - `derive` - Enable the `FromRow` derive macro
//! - `sqlite` - Embedded SQLite driver (default)
//! - `odbc` - Connect through the system ODBC driver manager
//! - `serde` - Enable serde serialization support

#![cfg_attr(docsrs, feature(doc_cfg))]

mod macros;

// Re-export the FromRow derive macro when the derive feature is enabled
#[cfg(feature = "derive")]
#[cfg_attr(docsrs, doc(cfg(feature = "derive")))]
pub use async_odbc_macros::FromRow;

// Re-export everything from async-odbc-core
pub use async_odbc_core::*;
