/// Error types for the store layer
///
/// Two enums cover everything that can go wrong between a handler and the
/// database:
///
/// - [`StoreError`]: a fault reported while talking to the store (connect,
///   query, decode, constraint violation)
/// - [`PoolError`]: the pool could not hand out a connection
///
/// Both carry internal detail in their messages. That detail is meant for
/// logs only; the HTTP layer replaces it with a generic message.

use std::time::Duration;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// A fault reported by the backing store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {}", constraint.as_deref().unwrap_or("unknown"))]
    Conflict {
        /// Name of the violated constraint, when the store reports one
        constraint: Option<String>,
    },

    /// The store could not be reached or the connection died mid-request
    ///
    /// A connection that produced this error is never reused.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The statement failed for any other reason
    #[error("Query failed: {0}")]
    Query(String),

    /// A returned row did not match the expected record shape
    #[error("Row decode failed: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether the connection that produced this error must be discarded
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }

    /// Whether this is a unique constraint violation
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Postgres SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    StoreError::Conflict {
                        constraint: db_err.constraint().map(str::to_string),
                    }
                } else {
                    StoreError::Query(db_err.to_string())
                }
            }
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Tls(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Protocol(msg) => StoreError::Connection(msg),
            sqlx::Error::WorkerCrashed => StoreError::Connection("connection worker crashed".to_string()),
            sqlx::Error::Configuration(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::ColumnNotFound(column) => {
                StoreError::Decode(format!("column not found: {}", column))
            }
            err @ (sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. }) => StoreError::Decode(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Failure to obtain a connection from the pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Every connection is leased and the acquire policy gave up
    #[error("Connection pool exhausted after waiting {waited:?}")]
    Exhausted {
        /// How long the caller waited before giving up
        waited: Duration,
    },

    /// A new connection could not be established
    #[error("Failed to connect to the store: {0}")]
    ConnectionFailed(#[source] StoreError),

    /// The pool has been closed
    #[error("Connection pool is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_errors_are_fatal() {
        assert!(StoreError::Connection("reset by peer".to_string()).is_fatal());
        assert!(!StoreError::Query("syntax error".to_string()).is_fatal());
        assert!(!StoreError::Decode("bad column".to_string()).is_fatal());
        assert!(!StoreError::Conflict { constraint: None }.is_fatal());
    }

    #[test]
    fn test_conflict_display() {
        let err = StoreError::Conflict {
            constraint: Some("users_email_key".to_string()),
        };
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Unique constraint violated: users_email_key");

        let err = StoreError::Conflict { constraint: None };
        assert_eq!(err.to_string(), "Unique constraint violated: unknown");
    }

    #[test]
    fn test_sqlx_io_error_is_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = StoreError::from(sqlx::Error::Io(io));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_sqlx_row_not_found_is_query_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[test]
    fn test_pool_error_display() {
        let err = PoolError::Exhausted {
            waited: Duration::from_millis(0),
        };
        assert!(err.to_string().contains("exhausted"));
        assert_eq!(PoolError::Closed.to_string(), "Connection pool is closed");
    }
}
