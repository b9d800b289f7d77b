//! Core database system types and traits
//!
//! This module provides the fundamental building blocks: the driver capability
//! traits, the value model, parameter binding, the result cursor, the
//! transaction runner and the database facade.

pub mod command;
pub mod cursor;
pub mod database;
pub mod database_types;
pub mod driver;
pub mod error;
pub mod executor;
pub mod formatted;
pub mod parameter;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use command::{bind, Command};
pub use cursor::{CursorState, ResultCursor, RowTuples, Rows};
pub use database::{ConnectionBuilder, Database};
pub use database_types::DatabaseType;
pub use driver::{Connection, Driver, RowReader};
pub use error::{DatabaseError, Result};
pub use executor::Executor;
pub use formatted::FormattedSql;
pub use parameter::Parameter;
pub use transaction::{transaction, transaction_async, BoxFuture, Transaction, TransactionState};
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue, ValueType};
