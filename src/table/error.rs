//! Error types for tabular hand-off files

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, reading or writing a table
#[derive(Error, Debug)]
pub enum TableError {
    /// Table file not found
    #[error("Table file not found: {0}")]
    FileNotFound(PathBuf),

    /// CSV read/write error with path context
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// IO error with path context
    #[error("IO error with {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Row has a different width than the header
    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Column declared twice in a header
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

impl TableError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
