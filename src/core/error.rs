//! Error types for the database system
//!
//! This module defines all error types that can occur during database operations.

use super::cursor::CursorState;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failure inside a managed transaction scope.
    ///
    /// The transaction has already been rolled back when this is observed.
    /// The original failure is available through [`DatabaseError::cause`].
    #[error("{message}: {source}")]
    ExecutionFailed {
        message: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// Row data was requested while the cursor has no current row
    #[error("Invalid cursor state: no current row ({state})")]
    InvalidCursorState { state: CursorState },

    /// The cursor was used after it was closed
    #[error("Cursor is closed")]
    CursorClosed,

    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Type conversion error
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Malformed formatted SQL template
    #[error("Invalid SQL template: {0}")]
    InvalidSqlTemplate(String),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] postgres::Error),

    /// MySQL error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MysqlError(#[from] mysql::Error),

    /// Error raised by caller code
    #[error("{0}")]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Wrap a failure raised inside a synchronous transaction scope
    pub fn execution_failed(source: DatabaseError) -> Self {
        DatabaseError::ExecutionFailed {
            message: "SQL execution failed".to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure raised inside an asynchronous transaction scope
    pub fn async_execution_failed(source: DatabaseError) -> Self {
        DatabaseError::ExecutionFailed {
            message: "Asynchronous SQL execution failed".to_string(),
            source: Box::new(source),
        }
    }

    /// The original failure carried by an [`DatabaseError::ExecutionFailed`]
    pub fn cause(&self) -> Option<&DatabaseError> {
        match self {
            DatabaseError::ExecutionFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this error came out of a transaction runner
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, DatabaseError::ExecutionFailed { .. })
    }

    /// Create an invalid cursor state error
    pub fn invalid_cursor_state(state: CursorState) -> Self {
        DatabaseError::InvalidCursorState { state }
    }

    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidSqlTemplate(msg.into())
    }

    /// Wrap an arbitrary caller error
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DatabaseError::Custom(Box::new(err))
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }
}
