//! Commands and parameter binding
//!
//! A [`Command`] is the driver-facing form of one statement: SQL text, the
//! transaction it runs under, and driver-native parameters in bind order.

use super::driver::Connection;
use super::error::Result;
use super::parameter::Parameter;
use super::transaction::Transaction;

/// One statement execution, generic over the driver's native parameter type
#[derive(Debug)]
pub struct Command<P> {
    sql: String,
    transaction: Option<u64>,
    parameters: Vec<(String, P)>,
}

impl<P> Command<P> {
    pub fn new() -> Self {
        Self {
            sql: String::new(),
            transaction: None,
            parameters: Vec::new(),
        }
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = sql.into();
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Attach an explicit transaction; `None` runs under the connection's default
    pub fn set_transaction(&mut self, transaction: Option<&Transaction>) {
        self.transaction = transaction.map(Transaction::id);
    }

    pub fn transaction_id(&self) -> Option<u64> {
        self.transaction
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: P) {
        self.parameters.push((name.into(), parameter));
    }

    pub fn parameters(&self) -> &[(String, P)] {
        &self.parameters
    }
}

impl<P> Default for Command<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a command for `sql` with `params` bound in input order.
///
/// Type hints are applied before the connection converts each value into its
/// native parameter. Duplicate names are passed through untouched.
pub fn bind<C: Connection + ?Sized>(
    connection: &C,
    sql: &str,
    params: &[Parameter],
    transaction: Option<&Transaction>,
) -> Result<Command<C::Parameter>> {
    let mut command = Command::new();
    command.set_sql(sql);
    command.set_transaction(transaction);

    for param in params {
        let value = match param.type_hint() {
            Some(hint) => param.value().clone().coerce(hint)?,
            None => param.value().clone(),
        };
        let native = connection.create_parameter(param.name(), &value)?;
        command.add_parameter(param.name(), native);
    }

    Ok(command)
}
