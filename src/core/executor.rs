//! Statement execution on an open connection
//!
//! [`Executor`] is implemented for every [`Connection`]. Each call binds the
//! parameters into a fresh command, runs it once and releases it.
//!
//! `tx = None` runs under the connection's default transaction (autocommit or
//! whatever the environment supplies). `Some(tx)` must be a transaction that
//! is still active and was begun on the same connection.

use super::command::{bind, Command};
use super::cursor::ResultCursor;
use super::driver::Connection;
use super::error::{DatabaseError, Result};
use super::formatted::FormattedSql;
use super::parameter::Parameter;
use super::transaction::Transaction;
use super::value::{DatabaseResult, DatabaseValue};
use async_trait::async_trait;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

/// Run a blocking driver call from async code.
///
/// On a multi-threaded runtime the worker is handed off with
/// `block_in_place`; elsewhere the call runs inline.
pub(crate) fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Bind a command, rejecting a transaction that is finished or belongs to
/// another connection before the driver sees it.
fn prepare<C: Connection>(
    connection: &C,
    sql: &str,
    params: &[Parameter],
    tx: Option<&Transaction>,
) -> Result<Command<C::Parameter>> {
    if let Some(tx) = tx {
        tx.ensure_active("execute on")?;
    }
    let command = bind(connection, sql, params, tx)?;

    match command.transaction_id() {
        Some(id) if connection.current_transaction() != Some(id) => Err(
            DatabaseError::transaction(format!("Transaction {} is not open on this connection", id)),
        ),
        _ => Ok(command),
    }
}

/// Execute, query and scalar operations for any connection
#[async_trait]
pub trait Executor: Connection {
    /// Execute a statement and return the affected row count
    fn execute_non_query(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
    ) -> Result<u64>
    where
        Self: Sized,
    {
        let command = prepare(self, sql, params, tx)?;
        debug!(sql, params = params.len(), "Executing statement");
        self.execute(&command)
    }

    /// First column of the first row, or `None` when the query yields no rows
    fn execute_scalar(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
    ) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        let command = prepare(self, sql, params, tx)?;
        debug!(sql, params = params.len(), "Executing scalar query");
        self.scalar(&command)
    }

    /// Open a cursor over the query's rows and pass it to `handler`.
    ///
    /// The cursor, its reader and the command are released when this returns,
    /// whatever the handler's outcome.
    fn query<T, F>(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
        handler: F,
    ) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut ResultCursor<'_>) -> Result<T>,
    {
        let command = prepare(self, sql, params, tx)?;
        debug!(sql, params = params.len(), "Executing query");

        self.reader(&command, |reader| {
            let mut cursor = ResultCursor::new(sql, reader);
            let outcome = handler(&mut cursor);
            let closed = cursor.close();

            match (outcome, closed) {
                (Ok(value), Ok(())) => Ok(value),
                (Ok(_), Err(e)) => Err(e),
                (Err(e), Err(close_err)) => {
                    warn!(sql, error = %close_err, "Failed to close cursor after handler error");
                    Err(e)
                }
                (Err(e), Ok(())) => Err(e),
            }
        })
    }

    /// Read every row into memory.
    ///
    /// Only suitable for result sets known to be small.
    fn load_all(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
    ) -> Result<DatabaseResult>
    where
        Self: Sized,
    {
        self.query(sql, params, tx, |cursor| cursor.rows().collect())
    }

    fn execute_formatted_non_query(
        &mut self,
        stmt: &FormattedSql,
        tx: Option<&Transaction>,
    ) -> Result<u64>
    where
        Self: Sized,
    {
        self.execute_non_query(stmt.sql(), stmt.parameters(), tx)
    }

    fn execute_formatted_scalar(
        &mut self,
        stmt: &FormattedSql,
        tx: Option<&Transaction>,
    ) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        self.execute_scalar(stmt.sql(), stmt.parameters(), tx)
    }

    fn query_formatted<T, F>(
        &mut self,
        stmt: &FormattedSql,
        tx: Option<&Transaction>,
        handler: F,
    ) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut ResultCursor<'_>) -> Result<T>,
    {
        self.query(stmt.sql(), stmt.parameters(), tx, handler)
    }

    async fn execute_non_query_async(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
    ) -> Result<u64>
    where
        Self: Sized,
    {
        run_blocking(|| self.execute_non_query(sql, params, tx))
    }

    async fn execute_scalar_async(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
    ) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        run_blocking(|| self.execute_scalar(sql, params, tx))
    }

    async fn query_async<T, F>(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
        handler: F,
    ) -> Result<T>
    where
        Self: Sized,
        T: Send,
        F: FnOnce(&mut ResultCursor<'_>) -> Result<T> + Send,
    {
        run_blocking(|| self.query(sql, params, tx, handler))
    }

    async fn load_all_async(
        &mut self,
        sql: &str,
        params: &[Parameter],
        tx: Option<&Transaction>,
    ) -> Result<DatabaseResult>
    where
        Self: Sized,
    {
        run_blocking(|| self.load_all(sql, params, tx))
    }

    async fn execute_formatted_non_query_async(
        &mut self,
        stmt: &FormattedSql,
        tx: Option<&Transaction>,
    ) -> Result<u64>
    where
        Self: Sized,
    {
        run_blocking(|| self.execute_formatted_non_query(stmt, tx))
    }

    async fn execute_formatted_scalar_async(
        &mut self,
        stmt: &FormattedSql,
        tx: Option<&Transaction>,
    ) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        run_blocking(|| self.execute_formatted_scalar(stmt, tx))
    }

    async fn query_formatted_async<T, F>(
        &mut self,
        stmt: &FormattedSql,
        tx: Option<&Transaction>,
        handler: F,
    ) -> Result<T>
    where
        Self: Sized,
        T: Send,
        F: FnOnce(&mut ResultCursor<'_>) -> Result<T> + Send,
    {
        run_blocking(|| self.query_formatted(stmt, tx, handler))
    }
}

impl<C: Connection> Executor for C {}
