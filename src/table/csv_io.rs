//! CSV reading and writing for [`WideTable`]

use std::fs;
use std::io::Write;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use super::error::{TableError, TableResult};
use super::{Row, WideTable};

impl WideTable {
    /// Read a table from a CSV file with a header row
    ///
    /// Empty fields are read as null.
    pub fn read_csv(path: &Path) -> TableResult<Self> {
        if !path.exists() {
            return Err(TableError::FileNotFound(path.to_path_buf()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| TableError::csv(path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| TableError::csv(path, e))?
            .iter()
            .map(|h| h.trim_matches('\u{feff}').to_string())
            .collect();

        let mut table = WideTable::new(headers)?;
        for record in reader.records() {
            let record = record.map_err(|e| TableError::csv(path, e))?;
            let row: Row = record
                .iter()
                .map(|value| {
                    if value.is_empty() {
                        None
                    } else {
                        Some(value.to_string())
                    }
                })
                .collect();
            table.push_row(row)?;
        }

        Ok(table)
    }

    /// Write the table to a CSV file, creating parent directories
    pub fn write_csv(&self, path: &Path) -> TableResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| TableError::io(parent, e))?;
            }
        }

        let file = fs::File::create(path).map_err(|e| TableError::io(path, e))?;
        self.write_to(file).map_err(|e| match e {
            TableError::Csv { source, .. } => TableError::csv(path, source),
            TableError::Io { source, .. } => TableError::io(path, source),
            other => other,
        })
    }

    /// Write the table as CSV to any writer
    pub fn write_to<W: Write>(&self, writer: W) -> TableResult<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        writer
            .write_record(self.columns())
            .map_err(|e| TableError::csv("<writer>", e))?;
        for row in self.rows() {
            writer
                .write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))
                .map_err(|e| TableError::csv("<writer>", e))?;
        }
        writer.flush().map_err(|e| TableError::io("<writer>", e))?;

        Ok(())
    }
}
