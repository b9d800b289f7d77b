//! Result cursor over a forward-only row reader
//!
//! A [`ResultCursor`] materializes the current row lazily. The field list is
//! read from the reader once per execution; the row views (`row`, `tuples`)
//! are built on first access and dropped on every [`ResultCursor::advance`].

use super::driver::RowReader;
use super::error::{DatabaseError, Result};
use super::value::{DatabaseRow, DatabaseValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Position of a cursor relative to its rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorState {
    /// Executed, `advance` not called yet
    Unpositioned,
    /// On a row
    Positioned,
    /// Past the last row
    Exhausted,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CursorState::Unpositioned => "unpositioned",
            CursorState::Positioned => "positioned",
            CursorState::Exhausted => "exhausted",
        })
    }
}

/// Ordered `(column name, value)` pairs of one row
pub type RowTuples = Arc<[(String, DatabaseValue)]>;

/// Cursor over the rows of one executed statement
pub struct ResultCursor<'r> {
    sql: String,
    reader: &'r mut dyn RowReader,
    state: CursorState,
    closed: bool,
    fields: Option<Arc<[String]>>,
    row: Option<Arc<DatabaseRow>>,
    tuples: Option<RowTuples>,
}

impl<'r> ResultCursor<'r> {
    pub fn new(sql: impl Into<String>, reader: &'r mut dyn RowReader) -> Self {
        Self {
            sql: sql.into(),
            reader,
            state: CursorState::Unpositioned,
            closed: false,
            fields: None,
            row: None,
            tuples: None,
        }
    }

    /// SQL text the cursor was opened for
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Move to the next row.
    ///
    /// Returns `false` once the rows are exhausted; later calls keep
    /// returning `false` without touching the reader.
    pub fn advance(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.row = None;
        self.tuples = None;

        if self.state == CursorState::Exhausted {
            return Ok(false);
        }

        match self.reader.read() {
            Ok(true) => {
                self.state = CursorState::Positioned;
                Ok(true)
            }
            Ok(false) => {
                self.state = CursorState::Exhausted;
                Ok(false)
            }
            Err(e) => {
                self.state = CursorState::Exhausted;
                Err(e)
            }
        }
    }

    /// Column names in result order.
    ///
    /// Computed on first access; every later call returns the same `Arc`.
    pub fn fields(&mut self) -> Result<Arc<[String]>> {
        self.ensure_open()?;
        if let Some(fields) = &self.fields {
            return Ok(Arc::clone(fields));
        }

        let names = (0..self.reader.field_count())
            .map(|i| self.reader.field_name(i))
            .collect::<Result<Vec<_>>>()?;
        let fields: Arc<[String]> = names.into();
        self.fields = Some(Arc::clone(&fields));
        Ok(fields)
    }

    /// Current row as a name -> value map.
    ///
    /// When a column name repeats, the first column wins.
    pub fn row(&mut self) -> Result<Arc<DatabaseRow>> {
        self.ensure_positioned()?;
        if let Some(row) = &self.row {
            return Ok(Arc::clone(row));
        }

        let fields = self.fields()?;
        let mut row = DatabaseRow::with_capacity(fields.len());
        for (index, name) in fields.iter().enumerate() {
            let value = self.reader.value(index)?;
            row.entry(name.clone()).or_insert(value);
        }

        let row = Arc::new(row);
        self.row = Some(Arc::clone(&row));
        Ok(row)
    }

    /// Current row as ordered `(name, value)` pairs, one per column
    pub fn tuples(&mut self) -> Result<RowTuples> {
        self.ensure_positioned()?;
        if let Some(tuples) = &self.tuples {
            return Ok(Arc::clone(tuples));
        }

        let fields = self.fields()?;
        let tuples = fields
            .iter()
            .enumerate()
            .map(|(index, name)| Ok((name.clone(), self.reader.value(index)?)))
            .collect::<Result<Vec<_>>>()?;

        let tuples: RowTuples = tuples.into();
        self.tuples = Some(Arc::clone(&tuples));
        Ok(tuples)
    }

    /// Current row converted by `convert`
    pub fn row_as<T, F>(&mut self, convert: F) -> Result<T>
    where
        F: FnOnce(&DatabaseRow) -> T,
    {
        let row = self.row()?;
        Ok(convert(&*row))
    }

    /// Value of column `name` in the current row
    pub fn get(&mut self, name: &str) -> Result<DatabaseValue> {
        let row = self.row()?;
        row.get(name)
            .cloned()
            .ok_or_else(|| DatabaseError::ColumnNotFound(name.to_string()))
    }

    /// Lazily convert the remaining rows.
    ///
    /// Each item advances the cursor. A new iterator continues from the
    /// current position; rows already consumed are not replayed.
    pub fn rows_as<T, F>(&mut self, convert: F) -> Rows<'_, 'r, F>
    where
        F: FnMut(&DatabaseRow) -> T,
    {
        Rows {
            cursor: self,
            convert,
            done: false,
        }
    }

    /// Lazily yield the remaining rows as owned maps
    pub fn rows(&mut self) -> Rows<'_, 'r, fn(&DatabaseRow) -> DatabaseRow> {
        self.rows_as(DatabaseRow::clone as fn(&DatabaseRow) -> DatabaseRow)
    }

    /// Release the reader. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.row = None;
        self.tuples = None;
        self.reader.close()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DatabaseError::CursorClosed);
        }
        Ok(())
    }

    fn ensure_positioned(&self) -> Result<()> {
        self.ensure_open()?;
        if self.state != CursorState::Positioned {
            return Err(DatabaseError::invalid_cursor_state(self.state));
        }
        Ok(())
    }
}

impl Drop for ResultCursor<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(sql = %self.sql, error = %e, "Failed to close result reader");
        }
    }
}

impl fmt::Debug for ResultCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Single-pass iterator returned by [`ResultCursor::rows_as`]
pub struct Rows<'c, 'r, F> {
    cursor: &'c mut ResultCursor<'r>,
    convert: F,
    done: bool,
}

impl<T, F> Iterator for Rows<'_, '_, F>
where
    F: FnMut(&DatabaseRow) -> T,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.cursor.advance() {
            Ok(true) => Some(self.cursor.row().map(|row| (self.convert)(&*row))),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
