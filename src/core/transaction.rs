//! Transaction runner
//!
//! [`transaction`] and [`transaction_async`] begin a transaction, run caller
//! logic, then commit on success or roll back on failure. A failure is always
//! reported as [`DatabaseError::ExecutionFailed`] carrying the original error.

use super::driver::Connection;
use super::error::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Boxed future returned by asynchronous bodies
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Transaction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Began,
    Committed,
    RolledBack,
}

/// Handle to a transaction begun on a connection
///
/// The handle does not borrow the connection; `commit` and `rollback` take it
/// explicitly. Once committed or rolled back the handle is terminal.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    state: TransactionState,
}

impl Transaction {
    /// Begin a transaction on `connection`
    pub fn begin<C: Connection + ?Sized>(connection: &mut C) -> Result<Self> {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        connection.begin(id)?;
        debug!(transaction = id, "Transaction began");
        Ok(Self {
            id,
            state: TransactionState::Began,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Neither committed nor rolled back yet
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Began
    }

    pub fn commit<C: Connection + ?Sized>(&mut self, connection: &mut C) -> Result<()> {
        self.ensure_active("commit")?;
        connection.commit()?;
        self.state = TransactionState::Committed;
        debug!(transaction = self.id, "Transaction committed");
        Ok(())
    }

    pub fn rollback<C: Connection + ?Sized>(&mut self, connection: &mut C) -> Result<()> {
        self.ensure_active("roll back")?;
        connection.rollback()?;
        self.state = TransactionState::RolledBack;
        debug!(transaction = self.id, "Transaction rolled back");
        Ok(())
    }

    pub(crate) fn ensure_active(&self, action: &str) -> Result<()> {
        match self.state {
            TransactionState::Began => Ok(()),
            TransactionState::Committed => Err(DatabaseError::transaction(format!(
                "Cannot {} a committed transaction",
                action
            ))),
            TransactionState::RolledBack => Err(DatabaseError::transaction(format!(
                "Cannot {} a rolled back transaction",
                action
            ))),
        }
    }

    /// Commit if still active
    fn finish<C: Connection + ?Sized>(&mut self, connection: &mut C) -> Result<()> {
        if self.is_active() {
            self.commit(connection)?;
        }
        Ok(())
    }

    /// Roll back if still active, keeping `cause` as the reported failure
    fn abort<C: Connection + ?Sized>(&mut self, connection: &mut C, cause: &DatabaseError) {
        if !self.is_active() {
            return;
        }
        if let Err(e) = self.rollback(connection) {
            warn!(
                transaction = self.id,
                error = %e,
                cause = %cause,
                "Rollback failed after execution error"
            );
        }
    }
}

/// Run `body` inside a transaction on `connection`.
///
/// Commits when `body` succeeds and the transaction is still active. When
/// `body` or the commit fails, the transaction is rolled back and the error is
/// returned wrapped in [`DatabaseError::ExecutionFailed`]. A body may commit or
/// roll back the handle itself; the runner then does neither.
///
/// A failure to begin is returned as-is.
pub fn transaction<C, T, F>(connection: &mut C, body: F) -> Result<T>
where
    C: Connection + ?Sized,
    F: FnOnce(&mut C, &mut Transaction) -> Result<T>,
{
    let mut tx = Transaction::begin(connection)?;

    let outcome = body(connection, &mut tx).and_then(|value| {
        tx.finish(connection)?;
        Ok(value)
    });

    outcome.map_err(|e| {
        tx.abort(connection, &e);
        DatabaseError::execution_failed(e)
    })
}

/// Asynchronous [`transaction`].
///
/// Commit or rollback happens after the body's future settles. If the future
/// is dropped before that, the transaction stays open on the connection and is
/// rolled back when the connection closes.
pub async fn transaction_async<C, T, F>(connection: &mut C, body: F) -> Result<T>
where
    C: Connection + ?Sized,
    F: for<'a> FnOnce(&'a mut C, &'a mut Transaction) -> BoxFuture<'a, Result<T>>,
{
    let mut tx = Transaction::begin(connection)?;

    let outcome = match body(connection, &mut tx).await {
        Ok(value) => tx.finish(connection).map(|_| value),
        Err(e) => Err(e),
    };

    outcome.map_err(|e| {
        tx.abort(connection, &e);
        DatabaseError::async_execution_failed(e)
    })
}
