//! Embedded SQLite driver.
//!
//! Plays the part of the SQLite ODBC driver without a driver manager. Manual
//! commit mode follows ODBC: with autocommit off a transaction is opened before
//! the first statement and stays open until commit or rollback.

use crate::odbc::driver::{Driver, ResultSet, Session};
use crate::odbc::{
    Column, ConnectOptions, ConnectionString, DatabaseError, Error, ErrorKind, TypeInfo, Value,
};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Batch, ErrorCode, Statement};
use std::time::Duration;

/// Opens SQLite database files named by the `Database` attribute.
///
/// A missing `Database` attribute or `Database=:memory:` opens a private
/// in-memory database. `Timeout` sets the busy timeout in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "SQLite3"
    }

    fn connect(
        &self,
        connection_string: &ConnectionString,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Session>, Error> {
        let conn = match connection_string.database() {
            None | Some("") | Some(":memory:") => rusqlite::Connection::open_in_memory(),
            Some(path) => rusqlite::Connection::open(path),
        }
        .map_err(|e| Error::Connection(e.to_string()))?;

        if let Some(timeout) = connection_string.get("Timeout") {
            let millis: u64 = timeout.parse().map_err(|_| {
                Error::Configuration(format!("`Timeout` must be milliseconds, got `{timeout}`"))
            })?;
            conn.busy_timeout(Duration::from_millis(millis))
                .map_err(|e| Error::Connection(e.to_string()))?;
        }

        Ok(Box::new(SqliteSession {
            conn,
            autocommit: options.autocommit,
        }))
    }
}

struct SqliteSession {
    conn: rusqlite::Connection,
    autocommit: bool,
}

impl SqliteSession {
    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn finish(&mut self, statement: &str) -> Result<(), Error> {
        if self.in_transaction() {
            self.conn
                .execute_batch(statement)
                .map_err(|e| Error::Transaction(database_error(e)))?;
        }
        Ok(())
    }
}

impl Session for SqliteSession {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, Error> {
        let mut batch = Batch::new(&self.conn, sql);
        let Some(mut stmt) = batch.next().map_err(query_error)? else {
            return Ok(ResultSet::default());
        };
        if !matches!(batch.next(), Ok(None)) {
            return Err(Error::Query(DatabaseError::new(
                "only one statement can be executed at a time",
            )));
        }
        check_placeholders(&stmt, params.len())?;

        if !self.autocommit && !self.in_transaction() {
            self.conn.execute_batch("BEGIN").map_err(query_error)?;
        }
        for (i, value) in params.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, value).map_err(query_error)?;
        }

        let column_count = stmt.column_count();
        if column_count == 0 {
            let changed = stmt.raw_execute().map_err(query_error)?;
            return Ok(ResultSet::affected(changed as u64));
        }

        let columns: Vec<Column> = stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let type_info = col
                    .decl_type()
                    .map(TypeInfo::declared)
                    .unwrap_or_else(TypeInfo::unknown);
                Column::new(i, col.name(), type_info)
            })
            .collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.raw_query();
        while let Some(row) = cursor.next().map_err(query_error)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(read_value(row.get_ref(i).map_err(query_error)?));
            }
            rows.push(values);
        }

        Ok(ResultSet {
            columns,
            rows,
            rows_affected: 0,
        })
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.finish("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.finish("ROLLBACK")
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), Error> {
        if enabled && !self.autocommit {
            self.finish("COMMIT")?;
        }
        self.autocommit = enabled;
        Ok(())
    }

    fn ping(&mut self) -> Result<(), Error> {
        self.conn
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(query_error)
    }

    fn close(self: Box<Self>) -> Result<(), Error> {
        let mut this = *self;
        this.finish("ROLLBACK")?;
        this.conn
            .close()
            .map_err(|(_, e)| Error::Connection(e.to_string()))
    }
}

/// Reject named and numbered placeholders, then compare arity.
fn check_placeholders(stmt: &Statement<'_>, supplied: usize) -> Result<(), Error> {
    let expected = stmt.parameter_count();
    for index in 1..=expected {
        if let Some(name) = stmt.parameter_name(index) {
            return Err(Error::UnsupportedPlaceholder(name.to_string()));
        }
    }
    if expected != supplied {
        return Err(Error::ParameterBinding {
            expected,
            actual: supplied,
        });
    }
    Ok(())
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::BigInt(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(text) => Value::Text(text.to_string()),
            // not valid UTF-8, keep the stored bytes
            Err(_) => Value::Binary(t.to_vec()),
        },
        ValueRef::Blob(b) => Value::Binary(b.to_vec()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::from(*b),
            Value::TinyInt(i) => ToSqlOutput::from(*i),
            Value::SmallInt(i) => ToSqlOutput::from(*i),
            Value::Int(i) => ToSqlOutput::from(*i),
            Value::BigInt(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(f64::from(*f)),
            Value::Double(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Binary(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn query_error(error: rusqlite::Error) -> Error {
    Error::Query(database_error(error))
}

fn database_error(error: rusqlite::Error) -> DatabaseError {
    let kind = match &error {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ErrorKind::UniqueViolation
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ErrorKind::ForeignKeyViolation,
                rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => ErrorKind::NotNullViolation,
                rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
        _ => ErrorKind::Other,
    };
    let message = match error {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message,
        other => other.to_string(),
    };
    DatabaseError::new(message).with_kind(kind)
}
