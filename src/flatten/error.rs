//! Error types for flattening

use std::path::PathBuf;
use thiserror::Error;

use crate::table::TableError;

/// Errors that abort a flattening run
///
/// Per-file parse failures are not errors at this level: they are recorded in
/// [`FlattenStats`](super::FlattenStats) and the file is skipped.
#[derive(Error, Debug)]
pub enum FlattenError {
    /// Pattern matching error
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Source not accessible
    #[error("Source not accessible: {path} - {reason}")]
    SourceNotAccessible { path: PathBuf, reason: String },

    /// Writing the wide table failed
    #[error(transparent)]
    Table(#[from] TableError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for flattening
pub type FlattenResult<T> = Result<T, FlattenError>;

impl FlattenError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            FlattenError::InvalidPattern(pattern) => {
                format!(
                    "Invalid glob pattern: {pattern}\n\n\
                    Hint: Use standard glob syntax like '*.xml' or '**/*.xml'."
                )
            }
            FlattenError::SourceNotAccessible { path, reason } => {
                format!(
                    "Cannot access source: {}\nReason: {reason}\n\n\
                    Hint: Check the source directory permissions.",
                    path.display()
                )
            }
            _ => self.to_string(),
        }
    }
}
