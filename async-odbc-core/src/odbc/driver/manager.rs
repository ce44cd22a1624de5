//! ODBC driver manager backend.

use crate::odbc::driver::{Driver, ResultSet, Session};
use crate::odbc::{
    Column, ConnectOptions, ConnectionString, DataType, DatabaseError, Error, TypeInfo, Value,
};
use odbc_api::parameter::InputParameter;
use odbc_api::{Bit, Cursor, Environment, IntoParameter, ResultSetMetadata};
use std::sync::OnceLock;

// Global ODBC environment (thread-safe singleton)
static ODBC_ENV: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment, Error> {
    if let Some(env) = ODBC_ENV.get() {
        return Ok(env);
    }
    let env = Environment::new()
        .map_err(|e| Error::Connection(format!("failed to create ODBC environment: {e}")))?;
    Ok(ODBC_ENV.get_or_init(|| env))
}

/// Connects through the system ODBC driver manager (unixODBC, iODBC or the
/// Windows driver manager).
#[derive(Debug, Clone, Copy, Default)]
pub struct OdbcDriver;

impl Driver for OdbcDriver {
    fn name(&self) -> &str {
        "ODBC"
    }

    fn connect(
        &self,
        connection_string: &ConnectionString,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Session>, Error> {
        let env = environment()?;
        let connection_options = odbc_api::ConnectionOptions {
            login_timeout_sec: options
                .connect_timeout
                .map(|t| u32::try_from(t.as_secs()).unwrap_or(u32::MAX)),
            ..Default::default()
        };
        let conn = env
            .connect_with_connection_string(&connection_string.to_string(), connection_options)
            .map_err(|e| Error::Connection(e.to_string()))?;
        conn.set_autocommit(options.autocommit)
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Box::new(OdbcSession {
            conn,
            autocommit: options.autocommit,
        }))
    }
}

struct OdbcSession {
    conn: odbc_api::Connection<'static>,
    autocommit: bool,
}

// SAFETY: the session is only ever used by one thread at a time; connections
// and cursors hold it behind a mutex and call into it from the blocking pool.
unsafe impl Send for OdbcSession {}

impl Session for OdbcSession {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, Error> {
        let mut prepared = self.conn.prepare(sql).map_err(query_error)?;

        let expected = usize::from(prepared.num_params().map_err(query_error)?);
        if expected != params.len() {
            return Err(Error::ParameterBinding {
                expected,
                actual: params.len(),
            });
        }

        let bound: Vec<Box<dyn InputParameter>> = params.iter().map(to_parameter).collect();
        let fetched = match prepared.execute(bound.as_slice()).map_err(query_error)? {
            Some(mut cursor) => Some(read_cursor(&mut cursor)?),
            None => None,
        };

        match fetched {
            Some((columns, rows)) => Ok(ResultSet {
                columns,
                rows,
                rows_affected: 0,
            }),
            None => {
                let affected = prepared.row_count().map_err(query_error)?.unwrap_or(0);
                Ok(ResultSet::affected(affected as u64))
            }
        }
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.conn
            .commit()
            .map_err(|e| Error::Transaction(DatabaseError::new(e.to_string())))
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.conn
            .rollback()
            .map_err(|e| Error::Transaction(DatabaseError::new(e.to_string())))
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), Error> {
        self.conn
            .set_autocommit(enabled)
            .map_err(|e| Error::Transaction(DatabaseError::new(e.to_string())))?;
        self.autocommit = enabled;
        Ok(())
    }

    fn ping(&mut self) -> Result<(), Error> {
        match self.conn.is_dead() {
            Ok(false) => Ok(()),
            Ok(true) => Err(Error::Connection("connection is dead".into())),
            Err(e) => Err(Error::Connection(e.to_string())),
        }
    }

    fn close(self: Box<Self>) -> Result<(), Error> {
        if !self.autocommit {
            self.conn
                .rollback()
                .map_err(|e| Error::Transaction(DatabaseError::new(e.to_string())))?;
        }
        drop(self);
        Ok(())
    }
}

fn to_parameter(value: &Value) -> Box<dyn InputParameter> {
    match value {
        Value::Null => Box::new(None::<String>.into_parameter()),
        Value::Bool(b) => Box::new(Bit::from_bool(*b)),
        Value::TinyInt(i) => Box::new(*i),
        Value::SmallInt(i) => Box::new(*i),
        Value::Int(i) => Box::new(*i),
        Value::BigInt(i) => Box::new(*i),
        Value::Float(f) => Box::new(*f),
        Value::Double(f) => Box::new(*f),
        Value::Text(s) => Box::new(s.clone().into_parameter()),
        Value::Binary(b) => Box::new(b.clone().into_parameter()),
    }
}

/// Read the whole result set. Values are fetched as text (or bytes for binary
/// columns) and converted by the reported column type.
fn read_cursor(cursor: &mut impl Cursor) -> Result<(Vec<Column>, Vec<Vec<Value>>), Error> {
    let num_cols = cursor.num_result_cols().map_err(query_error)?;
    let num_cols = u16::try_from(num_cols).unwrap_or(0);

    let mut columns = Vec::with_capacity(usize::from(num_cols));
    for i in 1..=num_cols {
        let name = cursor.col_name(i).map_err(query_error)?;
        let data_type = cursor.col_data_type(i).map_err(query_error)?;
        columns.push(Column::new(
            usize::from(i - 1),
            name,
            TypeInfo::new(map_data_type(data_type)),
        ));
    }

    let mut rows = Vec::new();
    let mut buf = Vec::new();
    while let Some(mut row) = cursor.next_row().map_err(query_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in (1..=num_cols).zip(columns.iter()) {
            buf.clear();
            let binary = column.data_type().accepts_binary_data();
            let present = if binary {
                row.get_binary(i, &mut buf)
            } else {
                row.get_text(i, &mut buf)
            }
            .map_err(query_error)?;

            values.push(if !present {
                Value::Null
            } else if binary {
                Value::Binary(buf.clone())
            } else {
                convert_text(column.data_type(), String::from_utf8_lossy(&buf).into_owned())
            });
        }
        rows.push(values);
    }

    Ok((columns, rows))
}

/// Narrow driver text to the column's type, keeping the text when it does not parse.
fn convert_text(data_type: DataType, text: String) -> Value {
    let parsed = match data_type {
        DataType::Bit => match text.trim() {
            "1" => Some(Value::Bool(true)),
            "0" => Some(Value::Bool(false)),
            _ => None,
        },
        DataType::TinyInt => text.trim().parse().ok().map(Value::TinyInt),
        DataType::SmallInt => text.trim().parse().ok().map(Value::SmallInt),
        DataType::Integer => text.trim().parse().ok().map(Value::Int),
        DataType::BigInt => text.trim().parse().ok().map(Value::BigInt),
        DataType::Real => text.trim().parse().ok().map(Value::Float),
        DataType::Double => text.trim().parse().ok().map(Value::Double),
        _ => None,
    };
    parsed.unwrap_or(Value::Text(text))
}

fn map_data_type(data_type: odbc_api::DataType) -> DataType {
    use odbc_api::DataType as Odbc;
    match data_type {
        Odbc::Unknown => DataType::Unknown,
        Odbc::Bit => DataType::Bit,
        Odbc::TinyInt => DataType::TinyInt,
        Odbc::SmallInt => DataType::SmallInt,
        Odbc::Integer => DataType::Integer,
        Odbc::BigInt => DataType::BigInt,
        Odbc::Real => DataType::Real,
        Odbc::Float { .. } | Odbc::Double => DataType::Double,
        Odbc::Char { .. }
        | Odbc::Varchar { .. }
        | Odbc::LongVarchar { .. }
        | Odbc::WChar { .. }
        | Odbc::WVarchar { .. }
        | Odbc::WLongVarchar { .. } => DataType::Varchar,
        Odbc::Binary { .. } | Odbc::Varbinary { .. } | Odbc::LongVarbinary { .. } => {
            DataType::Binary
        }
        Odbc::Date => DataType::Date,
        Odbc::Time { .. } => DataType::Time,
        Odbc::Timestamp { .. } => DataType::Timestamp,
        _ => DataType::Other,
    }
}

fn query_error(error: odbc_api::Error) -> Error {
    Error::Query(DatabaseError::new(error.to_string()))
}
