//! # scoped_sql
//!
//! A data-access helper that wraps vendor database drivers behind one API for
//! opening connections, running statements inside managed transactions and
//! iterating query results as dynamically-shaped rows.
//!
//! ## Features
//!
//! - **Scoped connections**: every `process*` call opens a connection and
//!   closes it exactly once, on success, error, panic or cancellation
//! - **Managed transactions**: commit on success, roll back on failure, with
//!   the original failure kept as the cause of [`DatabaseError::ExecutionFailed`]
//! - **Lazy cursors**: forward-only row iteration with memoized per-row views
//! - **Formatted SQL**: `sql!("... values({}, {})", a, b)` binds `@0`, `@1`
//!   instead of splicing values into the text
//! - **Async support**: `_async` variants usable from Tokio
//!
//! ## Supported Databases
//!
//! | Database | Feature | Driver |
//! |----------|---------|--------|
//! | SQLite | `sqlite` (default) | `rusqlite`, bundled |
//! | PostgreSQL | `postgres` | `postgres` (blocking client) |
//! | MySQL/MariaDB | `mysql` | `mysql` (blocking client) |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scoped_sql::prelude::*;
//! use scoped_sql::params;
//!
//! fn main() -> Result<()> {
//!     let db = Database::new(SqliteDriver, "app.db");
//!
//!     db.process_transaction(|conn, tx| {
//!         conn.execute_non_query(
//!             "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)",
//!             &[],
//!             Some(&*tx),
//!         )?;
//!         conn.execute_non_query(
//!             "INSERT INTO users (name) VALUES (@name)",
//!             &params![("@name", "Alice")],
//!             Some(&*tx),
//!         )?;
//!         Ok(())
//!     })?;
//!
//!     let names = db.process(|conn| {
//!         conn.query("SELECT name FROM users", &[], None, |cursor| {
//!             cursor.rows_as(|row| row["name"].as_string()).collect::<Result<Vec<_>>>()
//!         })
//!     })?;
//!     println!("{:?}", names);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Async
//!
//! ```rust,no_run
//! use scoped_sql::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = Database::new(SqliteDriver, ":memory:");
//!
//!     let count = db
//!         .process_async(|conn| {
//!             Box::pin(async move { conn.execute_scalar_async("SELECT 42", &[], None).await })
//!         })
//!         .await?;
//!     assert_eq!(count, Some(DatabaseValue::Long(42)));
//!
//!     Ok(())
//! }
//! ```

/// Core types, traits and the database facade
pub mod core;

/// Driver adapters
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use scoped_sql::prelude::*;
///
/// let db = Database::new(SqliteDriver, ":memory:");
/// assert_eq!(db.database_type(), DatabaseType::Sqlite);
/// ```
pub mod prelude {
    pub use crate::core::{
        Connection, ConnectionBuilder, CursorState, Database, DatabaseError, DatabaseResult,
        DatabaseRow, DatabaseType, DatabaseValue, Driver, Executor, FormattedSql, Parameter,
        Result, ResultCursor, Transaction, TransactionState, ValueType,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteDriver;

    #[cfg(feature = "postgres")]
    pub use crate::backends::PostgresDriver;

    #[cfg(feature = "mysql")]
    pub use crate::backends::MySqlDriver;
}

// Re-export at root level for convenience
pub use crate::core::{
    ConnectionBuilder, Database, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
    DatabaseValue, Executor, FormattedSql, Parameter, Result, ResultCursor, Transaction,
};

#[cfg(feature = "sqlite")]
pub use backends::SqliteDriver;

#[cfg(feature = "postgres")]
pub use backends::PostgresDriver;

#[cfg(feature = "mysql")]
pub use backends::MySqlDriver;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let db_type = DatabaseType::Sqlite;
        assert_eq!(db_type.to_str(), "sqlite");
        assert_eq!(db_type.parameter_prefixes(), &['@', ':', '$']);
    }

    #[test]
    fn test_value_conversions() {
        use prelude::*;

        let val: DatabaseValue = 42.into();
        assert_eq!(val.as_int(), Some(42));

        let val: DatabaseValue = "test".into();
        assert_eq!(val.as_string(), "test");

        let val: DatabaseValue = true.into();
        assert_eq!(val.as_bool(), Some(true));
    }

    #[test]
    fn test_macros_from_root() -> Result<()> {
        let params = crate::params![("@a", 1), ("@b", "x")];
        assert_eq!(params.len(), 2);

        let stmt = crate::sql!("select {}", 1)?;
        assert_eq!(stmt.sql(), "select @0");
        Ok(())
    }
}
