//! Driver capability traits
//!
//! Every vendor adapter implements this bundle. The facade, the transaction
//! runner and the result cursor are written only against these traits.

use super::command::Command;
use super::database_types::DatabaseType;
use super::error::Result;
use super::value::DatabaseValue;

/// Connection factory supplied by a vendor adapter
pub trait Driver: Send + Sync {
    /// Connection type produced by this driver
    type Connection: Connection;

    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Create an unopened connection for `connection_string`
    fn create_connection(&self, connection_string: &str) -> Result<Self::Connection>;
}

/// A database session
///
/// Implementations keep track of an open transaction so that closing a
/// connection with one still active rolls it back.
pub trait Connection: Send {
    /// Driver-native bound parameter
    type Parameter;

    fn open(&mut self) -> Result<()>;

    /// Close the session. Calling it on a closed connection is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Begin transaction `id`. Fails when one is already active.
    fn begin(&mut self, id: u64) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Id of the transaction currently open on this connection
    fn current_transaction(&self) -> Option<u64>;

    fn in_transaction(&self) -> bool {
        self.current_transaction().is_some()
    }

    /// Convert a value into the driver's parameter representation
    fn create_parameter(&self, name: &str, value: &DatabaseValue) -> Result<Self::Parameter>;

    /// Execute a command and return the affected row count
    fn execute(&mut self, command: &Command<Self::Parameter>) -> Result<u64>;

    /// First column of the first row, `None` when there are no rows
    fn scalar(&mut self, command: &Command<Self::Parameter>) -> Result<Option<DatabaseValue>>;

    /// Execute a command and hand its forward-only reader to `read`.
    ///
    /// The reader and every native statement behind it are released before
    /// this returns.
    fn reader<T, F>(&mut self, command: &Command<Self::Parameter>, read: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowReader) -> Result<T>;
}

/// Forward-only reader over the rows of one executed command
pub trait RowReader {
    /// Move to the next row; `false` once the rows are exhausted
    fn read(&mut self) -> Result<bool>;

    fn field_count(&self) -> usize;

    fn field_name(&self, index: usize) -> Result<String>;

    /// Value of column `index` in the current row
    fn value(&self, index: usize) -> Result<DatabaseValue>;

    /// Release the reader. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}
