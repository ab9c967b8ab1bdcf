//! Error types for bulk loading

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a table
#[derive(Error, Debug)]
pub enum LoadError {
    /// Table name is not one of the nine destination tables
    #[error("Unsupported table: {0}")]
    UnsupportedTable(String),

    /// Source file for a table is missing
    #[error("Source file not found for {table}: {}", .path.display())]
    FileNotFound { table: String, path: PathBuf },

    /// File header does not match the destination column list
    #[error(
        "Header of {} does not match {table}: expected [{}], found [{}]",
        .path.display(),
        .expected.join(", "),
        .found.join(", ")
    )]
    HeaderMismatch {
        table: String,
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Bulk transfer failed; the table's transaction was rolled back
    #[error("COPY into {table} failed: {cause}")]
    Copy { table: String, cause: String },

    /// Could not reach the destination store
    #[error("Database connection error: {0}")]
    Connect(String),

    /// Schema statement failed
    #[error("Schema error: {0}")]
    Schema(String),

    /// Reading a source file failed
    #[error("IO error with {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for loading
pub type LoadResult<T> = Result<T, LoadError>;

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Table the error concerns, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            LoadError::UnsupportedTable(table)
            | LoadError::FileNotFound { table, .. }
            | LoadError::HeaderMismatch { table, .. }
            | LoadError::Copy { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoadError::UnsupportedTable(table) => {
                format!(
                    "Unsupported table: {table}\n\n\
                    Hint: Valid tables are dim_patient, dim_hospital, dim_diagnosis, dim_chapter, \
                    dim_web, dim_acr, dim_document, dim_date and fact_consultation."
                )
            }
            LoadError::FileNotFound { table, path } => {
                format!(
                    "No data file for {table}: {}\n\n\
                    Hint: Run the transform stage first.",
                    path.display()
                )
            }
            LoadError::HeaderMismatch { .. } => {
                format!(
                    "{self}\n\n\
                    Hint: Regenerate the file with the transform stage."
                )
            }
            LoadError::Connect(msg) => {
                format!(
                    "Cannot connect to the database: {msg}\n\n\
                    Hint: Check --database-url or the DATABASE_URL environment variable."
                )
            }
            LoadError::Schema(msg) => {
                format!(
                    "Failed to create the destination schema: {msg}\n\n\
                    Hint: The user needs permission to drop and create tables."
                )
            }
            _ => self.to_string(),
        }
    }
}
