//! Error types for the dimensional transform

use std::path::PathBuf;
use thiserror::Error;

use crate::table::TableError;

/// Errors that abort the transform
///
/// Bad values inside rows are never errors; they are absorbed into defaults.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The wide table produced by flattening is missing
    #[error("Missing input table: {0}")]
    MissingInput(PathBuf),

    /// Invalid cleaning configuration
    #[error("Invalid cleaning configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing a table failed
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for the transform
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingInput(path) => {
                format!(
                    "Input table not found: {}\n\n\
                    Hint: Run the flatten stage first, or pass the output directory it wrote to.",
                    path.display()
                )
            }
            ModelError::InvalidConfig(msg) => {
                format!(
                    "Invalid cleaning configuration: {msg}\n\n\
                    Hint: Check the [cleaning] section of the pipeline configuration."
                )
            }
            ModelError::Table(TableError::Csv { path, source }) => {
                format!(
                    "Cannot read table {}: {source}\n\n\
                    Hint: The file must be comma-delimited UTF-8 with a header row.",
                    path.display()
                )
            }
            _ => self.to_string(),
        }
    }
}
