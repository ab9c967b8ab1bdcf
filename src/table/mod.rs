//! In-memory tables and their CSV hand-off format
//!
//! Every stage of the pipeline exchanges a fully materialized table through a
//! comma-delimited UTF-8 file with a header row. Null cells are written as empty
//! fields and empty fields read back as null.

mod csv_io;
mod error;
mod record;
mod values;

pub use error::{TableError, TableResult};
pub use record::{RawRecord, SOURCE_FILE_COLUMN};
pub use values::{
    ColumnKind, DATE_FORMAT, TIME_FORMAT, TIMESTAMP_FORMAT, canonical_number, parse_date,
    parse_datetime_dayfirst, parse_integer, parse_number, parse_time_of_day,
};

/// A row of nullable text cells
pub type Row = Vec<Option<String>>;

/// Ordered columns of nullable text; every row has every column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl WideTable {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> TableResult<Self> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Coerce records into one table
    ///
    /// Columns are `source_file` first, then every other field in first-seen order
    /// across all records. Fields a record lacks are null.
    pub fn from_records(records: &[RawRecord]) -> Self {
        let mut columns = vec![SOURCE_FILE_COLUMN.to_string()];
        for record in records {
            for name in record.field_names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).map(str::to_string))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Check if a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row; its width must match the header
    pub fn push_row(&mut self, row: Row) -> TableResult<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell value by row index and column name (None if null or no such column)
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Number of null cells in a column (0 if the column is absent)
    pub fn null_count(&self, column: &str) -> usize {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().filter(|row| row[idx].is_none()).count(),
            None => 0,
        }
    }

    /// Remove a column, returning whether it existed
    pub fn drop_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Append a column holding the same value in every row
    ///
    /// Does nothing if the column already exists; returns whether it was added.
    pub fn add_constant_column(&mut self, column: &str, value: Option<&str>) -> bool {
        if self.has_column(column) {
            return false;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(value.map(str::to_string));
        }
        true
    }

    /// Replace a column's values in place, or append it if absent
    pub fn set_column(&mut self, column: &str, values: Vec<Option<String>>) -> TableResult<()> {
        if values.len() != self.rows.len() {
            return Err(TableError::RowWidth {
                row: 0,
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        match self.column_index(column) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(column.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Rewrite every cell of a column; returns false if the column is absent
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(Option<&str>) -> Option<String>,
    {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(row[idx].as_deref());
        }
        true
    }
}
