//! Error types.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A boxed error usable across threads, returned by [`Decode`](crate::odbc::Decode).
pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias with [`Error`] as the default error.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by connections, cursors and rows.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The driver could not establish a session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An operation was issued on a connection or cursor after it was closed.
    #[error("{0} is closed")]
    ClosedResource(&'static str),

    /// The number of supplied parameters does not match the statement's placeholders.
    #[error("statement expects {expected} parameter(s), {actual} supplied")]
    ParameterBinding { expected: usize, actual: usize },

    /// The statement uses a placeholder other than a bare positional `?`.
    #[error("unsupported placeholder `{0}`, only positional `?` markers are allowed")]
    UnsupportedPlaceholder(String),

    /// The driver rejected a statement.
    #[error("{0}")]
    Query(DatabaseError),

    /// The driver rejected a commit or rollback.
    #[error("transaction failed: {0}")]
    Transaction(DatabaseError),

    /// A fetch was issued on a cursor holding no result set.
    #[error("invalid cursor state: {0}")]
    CursorState(&'static str),

    /// The connection string or options are malformed.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    #[error("no column found for name: {0}")]
    ColumnNotFound(String),

    #[error("error occurred while decoding column {index}: {source}")]
    ColumnDecode {
        index: String,
        #[source]
        source: BoxDynError,
    },

    /// A blocking driver task panicked or was torn down by the runtime.
    #[error("attempted to communicate with a crashed background worker")]
    WorkerCrashed,
}

impl Error {
    /// Whether this error is a placeholder/argument binding failure.
    pub fn is_parameter_binding(&self) -> bool {
        matches!(
            self,
            Error::ParameterBinding { .. } | Error::UnsupportedPlaceholder(_)
        )
    }

    /// The driver diagnostic behind a query or transaction failure.
    pub fn as_database_error(&self) -> Option<&DatabaseError> {
        match self {
            Error::Query(e) | Error::Transaction(e) => Some(e),
            _ => None,
        }
    }
}

/// Broad classification of a driver diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    Other,
}

/// A diagnostic reported by the database driver.
///
/// The message is kept exactly as the driver produced it.
#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub(crate) message: String,
    pub(crate) sqlstate: Option<String>,
    pub(crate) kind: ErrorKind,
}

impl DatabaseError {
    /// Create a diagnostic from a driver message, picking up an embedded
    /// `[SQLSTATE]` marker if there is one.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let sqlstate = extract_sqlstate(&message);
        let kind = kind_from_sqlstate(sqlstate.as_deref());
        Self {
            message,
            sqlstate,
            kind,
        }
    }

    /// Override the classification when the driver reports it out of band.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the SQLSTATE code if available
    pub fn sqlstate(&self) -> Option<&str> {
        self.sqlstate.as_deref()
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the failure happened in a way that may succeed on reconnect.
    pub fn is_transient_in_connect_phase(&self) -> bool {
        match self.sqlstate.as_deref() {
            Some(s) if s.starts_with("08") => true,
            Some("HYT00") | Some("HYT01") => true,
            _ => false,
        }
    }
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.message)
    }
}

impl StdError for DatabaseError {}

fn kind_from_sqlstate(sqlstate: Option<&str>) -> ErrorKind {
    match sqlstate {
        Some("23505") => ErrorKind::UniqueViolation,
        Some("23503") => ErrorKind::ForeignKeyViolation,
        Some("23514") => ErrorKind::CheckViolation,
        Some("23502") => ErrorKind::NotNullViolation,
        _ => ErrorKind::Other,
    }
}

/// Look for a five character state code in brackets, e.g. `[HY000]`.
fn extract_sqlstate(message: &str) -> Option<String> {
    let mut rest = message;
    while let Some(start) = rest.find('[') {
        let tail = &rest[start + 1..];
        let Some(end) = tail.find(']') else {
            break;
        };
        let state = &tail[..end];
        if state.len() == 5 && state.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Some(state.to_string());
        }
        rest = &tail[end..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_extracted_from_driver_message() {
        let err = DatabaseError::new(
            "State: 23505, Native error: 2627, Message: [Microsoft][ODBC Driver 18 for SQL Server][23505] duplicate key",
        );
        assert_eq!(err.sqlstate(), Some("23505"));
        assert_eq!(err.kind(), ErrorKind::UniqueViolation);
    }

    #[test]
    fn test_message_without_sqlstate() {
        let err = DatabaseError::new("near \"AS\": syntax error");
        assert_eq!(err.sqlstate(), None);
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "near \"AS\": syntax error");
    }

    #[test]
    fn test_transient_connect_states() {
        assert!(DatabaseError::new("[08001] unable to connect").is_transient_in_connect_phase());
        assert!(DatabaseError::new("[HYT00] timeout expired").is_transient_in_connect_phase());
        assert!(!DatabaseError::new("[42S02] no such table").is_transient_in_connect_phase());
    }

    #[test]
    fn test_binding_errors_grouped() {
        assert!(Error::ParameterBinding { expected: 2, actual: 1 }.is_parameter_binding());
        assert!(Error::UnsupportedPlaceholder(":name".into()).is_parameter_binding());
        assert!(!Error::CursorState("no result set").is_parameter_binding());
    }

    #[test]
    fn test_query_error_displays_driver_message_verbatim() {
        let err = Error::Query(DatabaseError::new("near \";\": syntax error"));
        assert_eq!(err.to_string(), "near \";\": syntax error");
        assert!(err.as_database_error().is_some());
    }
}
