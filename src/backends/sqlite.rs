//! SQLite driver adapter
//!
//! Backed by `rusqlite` with the bundled SQLite library. Parameters bind by
//! name (`@name`, `:name` or `$name`); a parameter with an empty name binds
//! by its position in the command.

use crate::core::command::Command;
use crate::core::database_types::DatabaseType;
use crate::core::driver::{Connection, Driver, RowReader};
use crate::core::error::{DatabaseError, Result};
use crate::core::value::DatabaseValue;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Rows, Statement};
use tracing::{debug, warn};

/// Driver for SQLite databases
///
/// Connection strings are either a plain file path (`:memory:` for a private
/// in-memory database) or `key=value` pairs carrying a `Data Source` key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn create_connection(&self, connection_string: &str) -> Result<SqliteConnection> {
        Ok(SqliteConnection::new(database_path(connection_string)?))
    }
}

/// Resolve the database file named by a connection string
fn database_path(connection_string: &str) -> Result<String> {
    let trimmed = connection_string.trim();
    if !trimmed.contains('=') {
        return Ok(trimmed.to_string());
    }

    for pair in trimmed.split(';') {
        if let Some((key, value)) = pair.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if matches!(key.as_str(), "data source" | "datasource" | "filename") {
                return Ok(value.trim().to_string());
            }
        }
    }

    Err(DatabaseError::connection(format!(
        "No data source in SQLite connection string '{}'",
        connection_string
    )))
}

/// Session on one SQLite database
pub struct SqliteConnection {
    path: String,
    connection: Option<rusqlite::Connection>,
    transaction: Option<u64>,
}

impl SqliteConnection {
    /// Create an unopened connection to `path`
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            connection: None,
            transaction: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn handle(&self) -> Result<&rusqlite::Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("open", &self.connection.is_some())
            .field("transaction", &self.transaction)
            .finish()
    }
}

impl Connection for SqliteConnection {
    type Parameter = Value;

    fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Err(DatabaseError::connection("Connection is already open"));
        }

        let conn = rusqlite::Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        self.connection = Some(conn);
        self.transaction = None;
        debug!(path = %self.path, "SQLite connection opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.connection.take() else {
            return Ok(());
        };

        if self.transaction.take().is_some() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!(path = %self.path, error = %e, "Rollback of open transaction failed on close");
            }
        }

        conn.close().map_err(|(_, e)| DatabaseError::from(e))
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn begin(&mut self, id: u64) -> Result<()> {
        let conn = self.handle()?;
        if self.transaction.is_some() {
            return Err(DatabaseError::transaction("Already in a transaction"));
        }

        // Only set the flag once the statement succeeded
        conn.execute_batch("BEGIN TRANSACTION")?;
        self.transaction = Some(id);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let conn = self.handle()?;
        if self.transaction.is_none() {
            return Err(DatabaseError::transaction("Not in a transaction"));
        }

        conn.execute_batch("COMMIT")?;
        self.transaction = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let conn = self.handle()?;
        if self.transaction.is_none() {
            return Err(DatabaseError::transaction("Not in a transaction"));
        }

        conn.execute_batch("ROLLBACK")?;
        self.transaction = None;
        Ok(())
    }

    fn current_transaction(&self) -> Option<u64> {
        self.transaction
    }

    fn create_parameter(&self, _name: &str, value: &DatabaseValue) -> Result<Value> {
        Ok(match value {
            DatabaseValue::Null => Value::Null,
            DatabaseValue::Bool(v) => Value::Integer(i64::from(*v)),
            DatabaseValue::Int(v) => Value::Integer(i64::from(*v)),
            DatabaseValue::Long(v) => Value::Integer(*v),
            DatabaseValue::Float(v) => Value::Real(f64::from(*v)),
            DatabaseValue::Double(v) => Value::Real(*v),
            DatabaseValue::String(v) => Value::Text(v.clone()),
            DatabaseValue::Bytes(v) => Value::Blob(v.clone()),
            DatabaseValue::Timestamp(v) => Value::Integer(*v),
        })
    }

    /// Statements that return rows are stepped to completion and their rows
    /// discarded. A read-only statement reports zero affected rows.
    fn execute(&mut self, command: &Command<Value>) -> Result<u64> {
        let conn = self.handle()?;
        let mut stmt = prepare(conn, command)?;
        if stmt.column_count() == 0 {
            let affected = stmt.raw_execute()?;
            return Ok(affected as u64);
        }

        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
        drop(rows);

        if stmt.readonly() {
            Ok(0)
        } else {
            Ok(conn.changes() as u64)
        }
    }

    fn scalar(&mut self, command: &Command<Value>) -> Result<Option<DatabaseValue>> {
        let mut stmt = prepare(self.handle()?, command)?;
        if stmt.column_count() == 0 {
            stmt.raw_execute()?;
            return Ok(None);
        }

        let mut rows = stmt.raw_query();
        let value = match rows.next()? {
            Some(row) => Some(value_from_ref(row.get_ref(0)?)),
            None => None,
        };
        Ok(value)
    }

    fn reader<T, F>(&mut self, command: &Command<Value>, read: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowReader) -> Result<T>,
    {
        let mut stmt = prepare(self.handle()?, command)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut reader = SqliteRowReader {
            rows: Some(stmt.raw_query()),
            columns,
            current: None,
        };
        let outcome = read(&mut reader);
        reader.close()?;
        outcome
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Err(e) = Connection::close(self) {
            warn!(path = %self.path, error = %e, "Failed to close SQLite connection");
        }
    }
}

/// Prepare `command` and bind its parameters
fn prepare<'c>(conn: &'c rusqlite::Connection, command: &Command<Value>) -> Result<Statement<'c>> {
    let mut stmt = conn.prepare(command.sql())?;
    for (position, (name, value)) in command.parameters().iter().enumerate() {
        let index = parameter_index(&stmt, name, position)?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(stmt)
}

/// One-based index of the placeholder a parameter binds to.
///
/// A bare name is tried with each prefix SQLite understands.
fn parameter_index(stmt: &Statement<'_>, name: &str, position: usize) -> Result<usize> {
    if name.is_empty() {
        return Ok(position + 1);
    }
    if let Some(index) = stmt.parameter_index(name)? {
        return Ok(index);
    }

    let prefixes = DatabaseType::Sqlite.parameter_prefixes();
    if !name.starts_with(prefixes) {
        for prefix in prefixes {
            if let Some(index) = stmt.parameter_index(&format!("{}{}", prefix, name))? {
                return Ok(index);
            }
        }
    }

    Err(DatabaseError::query(format!(
        "Statement has no parameter named '{}'",
        name
    )))
}

fn value_from_ref(value: ValueRef<'_>) -> DatabaseValue {
    match value {
        ValueRef::Null => DatabaseValue::Null,
        ValueRef::Integer(v) => DatabaseValue::Long(v),
        ValueRef::Real(v) => DatabaseValue::Double(v),
        ValueRef::Text(v) => DatabaseValue::String(String::from_utf8_lossy(v).to_string()),
        ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
    }
}

/// Forward-only reader over a running SQLite statement
struct SqliteRowReader<'s> {
    rows: Option<Rows<'s>>,
    columns: Vec<String>,
    current: Option<Vec<DatabaseValue>>,
}

impl RowReader for SqliteRowReader<'_> {
    fn read(&mut self) -> Result<bool> {
        let rows = self.rows.as_mut().ok_or(DatabaseError::CursorClosed)?;
        self.current = None;

        let Some(row) = rows.next()? else {
            return Ok(false);
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for index in 0..self.columns.len() {
            values.push(value_from_ref(row.get_ref(index)?));
        }
        self.current = Some(values);
        Ok(true)
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, index: usize) -> Result<String> {
        self.columns
            .get(index)
            .cloned()
            .ok_or_else(|| DatabaseError::ColumnNotFound(format!("#{}", index)))
    }

    fn value(&self, index: usize) -> Result<DatabaseValue> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DatabaseError::query("Reader is not positioned on a row"))?;
        row.get(index)
            .cloned()
            .ok_or_else(|| DatabaseError::ColumnNotFound(format!("#{}", index)))
    }

    fn close(&mut self) -> Result<()> {
        self.rows = None;
        self.current = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.rows.is_none()
    }
}
