//! PostgreSQL driver adapter
//!
//! Backed by the blocking `postgres` client. Statements use `@name`
//! placeholders like every other adapter; they are rewritten to PostgreSQL's
//! `$n` ordinals before preparing. Parameters with an empty name take the
//! next ordinal and are referenced as `$n` in the SQL directly.

use super::placeholders::{self, Placeholder, POSTGRES};
use crate::core::command::Command;
use crate::core::database_types::DatabaseType;
use crate::core::driver::{Connection, Driver, RowReader};
use crate::core::error::{DatabaseError, Result};
use crate::core::value::DatabaseValue;
use bytes::BytesMut;
use postgres::fallible_iterator::FallibleIterator;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, Config, NoTls, Row, RowIter};
use std::collections::HashMap;
use std::error::Error;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Driver for PostgreSQL servers
///
/// Connection strings use libpq key/value or URL syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for PostgresDriver {
    type Connection = PostgresConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn create_connection(&self, connection_string: &str) -> Result<PostgresConnection> {
        let config = connection_string.parse::<Config>()?;
        Ok(PostgresConnection::new(config))
    }
}

/// Session on one PostgreSQL database
pub struct PostgresConnection {
    config: Config,
    client: Option<Client>,
    transaction: Option<u64>,
}

impl PostgresConnection {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: None,
            transaction: None,
        }
    }

    fn client(&mut self) -> Result<&mut Client> {
        self.client
            .as_mut()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))
    }

    /// Run `sql` and move to transaction state `next`
    fn transaction_statement(&mut self, sql: &str, next: Option<u64>) -> Result<()> {
        match (self.transaction, next) {
            (Some(_), Some(_)) => {
                return Err(DatabaseError::transaction("Already in a transaction"))
            }
            (None, None) => return Err(DatabaseError::transaction("Not in a transaction")),
            _ => {}
        }
        self.client()?.batch_execute(sql)?;
        self.transaction = next;
        Ok(())
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("hosts", &self.config.get_hosts())
            .field("dbname", &self.config.get_dbname())
            .field("open", &self.client.is_some())
            .field("transaction", &self.transaction)
            .finish()
    }
}

impl Connection for PostgresConnection {
    type Parameter = PgValue;

    fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Err(DatabaseError::connection("Connection is already open"));
        }

        let client = self
            .config
            .connect(NoTls)
            .map_err(|e| DatabaseError::connection(e.to_string()))?;
        self.client = Some(client);
        self.transaction = None;
        debug!(dbname = ?self.config.get_dbname(), "PostgreSQL connection opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };

        if self.transaction.take().is_some() {
            if let Err(e) = client.batch_execute("ROLLBACK") {
                warn!(error = %e, "Rollback of open transaction failed on close");
            }
        }

        client.close()?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn begin(&mut self, id: u64) -> Result<()> {
        self.transaction_statement("BEGIN", Some(id))
    }

    fn commit(&mut self) -> Result<()> {
        self.transaction_statement("COMMIT", None)
    }

    fn rollback(&mut self) -> Result<()> {
        self.transaction_statement("ROLLBACK", None)
    }

    fn current_transaction(&self) -> Option<u64> {
        self.transaction
    }

    fn create_parameter(&self, _name: &str, value: &DatabaseValue) -> Result<PgValue> {
        Ok(PgValue(value.clone()))
    }

    fn execute(&mut self, command: &Command<PgValue>) -> Result<u64> {
        let (sql, params) = statement_args(command);
        let client = self.client()?;
        Ok(client.execute(sql.as_str(), &params)?)
    }

    fn scalar(&mut self, command: &Command<PgValue>) -> Result<Option<DatabaseValue>> {
        let (sql, params) = statement_args(command);
        let client = self.client()?;
        let stmt = client.prepare(&sql)?;
        if stmt.columns().is_empty() {
            client.execute(&stmt, &params)?;
            return Ok(None);
        }

        let column_type = stmt.columns()[0].type_().clone();
        let mut rows = client.query_raw(&stmt, params.iter().copied())?;
        match rows.next()? {
            Some(row) => Ok(Some(value_at(&row, 0, &column_type)?)),
            None => Ok(None),
        }
    }

    fn reader<T, F>(&mut self, command: &Command<PgValue>, read: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RowReader) -> Result<T>,
    {
        let (sql, params) = statement_args(command);
        let client = self.client()?;
        let stmt = client.prepare(&sql)?;
        let columns = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.type_().clone()))
            .collect();

        let mut reader = PostgresRowReader {
            rows: Some(client.query_raw(&stmt, params.iter().copied())?),
            columns,
            current: None,
        };
        let outcome = read(&mut reader);
        reader.close()?;
        outcome
    }
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        if let Err(e) = Connection::close(self) {
            warn!(error = %e, "Failed to close PostgreSQL connection");
        }
    }
}

/// Rewritten SQL plus the parameters in ordinal order
fn statement_args(command: &Command<PgValue>) -> (String, Vec<&(dyn ToSql + Sync)>) {
    let mut names: Vec<&str> = Vec::new();
    let mut slots: Vec<&PgValue> = Vec::new();

    for (name, value) in command.parameters() {
        let name = name.trim_start_matches('@');
        match names.iter().position(|n| !name.is_empty() && *n == name) {
            Some(index) => slots[index] = value,
            None => {
                names.push(name);
                slots.push(value);
            }
        }
    }

    let sql = rewrite_placeholders(command.sql(), &names);
    let params = slots
        .into_iter()
        .map(|v| v as &(dyn ToSql + Sync))
        .collect();
    (sql, params)
}

/// Replace `@name` with `$n` where `n` is the name's one-based slot.
///
/// Quoted literals, quoted identifiers, comments and dollar-quoted bodies are
/// copied untouched, as are names with no slot.
pub(crate) fn rewrite_placeholders(sql: &str, names: &[&str]) -> String {
    let ordinals: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .map(|(index, name)| (*name, index + 1))
        .collect();

    placeholders::rewrite(sql, POSTGRES, |placeholder| match placeholder {
        Placeholder::Named(name) => ordinals.get(name).map(|ordinal| format!("${}", ordinal)),
        Placeholder::Positional => None,
    })
}

/// A value bound to a PostgreSQL statement.
///
/// Converted to whatever Rust type matches the placeholder's inferred SQL
/// type, so an integer binds to `int2`, `int4` or `int8` alike.
#[derive(Debug, Clone, PartialEq)]
pub struct PgValue(pub DatabaseValue);

type BoxError = Box<dyn Error + Sync + Send>;

fn require<T>(value: Option<T>, ty: &Type, actual: &DatabaseValue) -> std::result::Result<T, BoxError> {
    value.ok_or_else(|| DatabaseError::type_mismatch(ty.name(), actual.type_name()).into())
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        let value = &self.0;
        match *ty {
            _ if value.is_null() => Ok(IsNull::Yes),
            Type::BOOL => require(value.as_bool(), ty, value)?.to_sql(ty, out),
            Type::INT2 => i16::try_from(require(value.as_long(), ty, value)?)?.to_sql(ty, out),
            Type::INT4 => i32::try_from(require(value.as_long(), ty, value)?)?.to_sql(ty, out),
            Type::INT8 => require(value.as_long(), ty, value)?.to_sql(ty, out),
            Type::FLOAT4 => require(value.as_float(), ty, value)?.to_sql(ty, out),
            Type::FLOAT8 => require(value.as_double(), ty, value)?.to_sql(ty, out),
            Type::BYTEA => require(value.as_bytes(), ty, value)?.to_sql(ty, out),
            Type::TIMESTAMP | Type::TIMESTAMPTZ => {
                system_time(require(value.as_long(), ty, value)?).to_sql(ty, out)
            }
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                require(value.to_text(), ty, value)?.to_sql(ty, out)
            }
            _ => Err(DatabaseError::type_mismatch(ty.name(), value.type_name()).into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn system_time(micros: i64) -> SystemTime {
    let offset = Duration::from_micros(micros.unsigned_abs());
    if micros >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

fn unix_micros(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_micros() as i64,
        Err(e) => -(e.duration().as_micros() as i64),
    }
}

/// Read column `idx` of `row` according to its SQL type
fn value_at(row: &Row, idx: usize, ty: &Type) -> Result<DatabaseValue> {
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(DatabaseValue::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| DatabaseValue::Int(i32::from(v))),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map(DatabaseValue::Int),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(DatabaseValue::Long),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| DatabaseValue::Long(i64::from(v))),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(DatabaseValue::Float),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(DatabaseValue::Double),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(DatabaseValue::Bytes),
        "timestamp" | "timestamptz" => row
            .try_get::<_, Option<SystemTime>>(idx)?
            .map(|t| DatabaseValue::Timestamp(unix_micros(t))),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(|_| {
                DatabaseError::type_mismatch("a supported column type", ty.name())
            })?
            .map(DatabaseValue::String),
    };
    Ok(value.unwrap_or(DatabaseValue::Null))
}

/// Forward-only reader over a running PostgreSQL query
struct PostgresRowReader<'c> {
    rows: Option<RowIter<'c>>,
    columns: Vec<(String, Type)>,
    current: Option<Row>,
}

impl RowReader for PostgresRowReader<'_> {
    fn read(&mut self) -> Result<bool> {
        let rows = self.rows.as_mut().ok_or(DatabaseError::CursorClosed)?;
        self.current = rows.next()?;
        Ok(self.current.is_some())
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, index: usize) -> Result<String> {
        self.columns
            .get(index)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| DatabaseError::ColumnNotFound(format!("#{}", index)))
    }

    fn value(&self, index: usize) -> Result<DatabaseValue> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DatabaseError::query("Reader is not positioned on a row"))?;
        let (_, ty) = self
            .columns
            .get(index)
            .ok_or_else(|| DatabaseError::ColumnNotFound(format!("#{}", index)))?;
        value_at(row, index, ty)
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
