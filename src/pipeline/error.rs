//! Error types for pipeline operations
//!
//! Stage errors keep their source so the chain can be printed for debugging, while
//! [`PipelineError::user_message`] gives the short form with a hint for CLI output.

use std::path::PathBuf;
use thiserror::Error;

use crate::flatten::FlattenError;
use crate::load::LoadError;
use crate::model::ModelError;

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Stage failed with underlying cause
    #[error("Stage '{stage}' failed: {source}")]
    StageFailure {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Checkpoint error
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// Resume error
    #[error("Cannot resume from checkpoint: {0}")]
    ResumeError(String),

    /// IO error with path context
    #[error("IO error with {}: {message}", .path.display())]
    IoErrorWithPath {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Flattening error
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    /// Transform error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Load error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Multiple errors occurred
    #[error("Multiple errors occurred: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<PipelineError>),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create a stage failure with underlying error
    pub fn stage_failure<E>(stage: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StageFailure {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Create an IO error with path context
    pub fn io_with_path(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoErrorWithPath {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Collapse a list of errors: one error stays as is, several become `Multiple`
    pub fn from_errors(mut errors: Vec<PipelineError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Check if this error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::IoErrorWithPath { .. } => true,
            PipelineError::Load(LoadError::Connect(_) | LoadError::Copy { .. }) => true,
            PipelineError::StageFailure { source, .. } => source
                .downcast_ref::<PipelineError>()
                .is_some_and(PipelineError::is_recoverable),
            PipelineError::Multiple(errors) => errors.iter().all(PipelineError::is_recoverable),
            _ => false,
        }
    }

    /// Get the stage name if this is a stage error
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            PipelineError::StageFailure { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::ConfigError(msg) => {
                format!(
                    "Configuration error: {msg}\n\nHint: Check your pipeline configuration file."
                )
            }
            PipelineError::StageFailure { stage, source } => {
                let detail = source
                    .downcast_ref::<PipelineError>()
                    .map(PipelineError::user_message)
                    .unwrap_or_else(|| source.to_string());
                format!("Stage '{stage}' failed: {detail}")
            }
            PipelineError::MissingInput(input) => {
                format!(
                    "Missing required input: {input}\n\nHint: Ensure all required files exist and paths are correct."
                )
            }
            PipelineError::FileNotFound(path) => {
                format!(
                    "File not found: {}\n\nHint: Check that the file exists and the path is correct.",
                    path.display()
                )
            }
            PipelineError::CheckpointError(msg) => {
                format!(
                    "Checkpoint error: {msg}\n\nHint: Delete the checkpoint file and run without --resume."
                )
            }
            PipelineError::ResumeError(msg) => {
                format!("Cannot resume: {msg}\n\nHint: Run the pipeline again without --resume.")
            }
            PipelineError::Flatten(e) => e.user_message(),
            PipelineError::Model(e) => e.user_message(),
            PipelineError::Load(e) => e.user_message(),
            PipelineError::Multiple(errors) => errors
                .iter()
                .map(PipelineError::user_message)
                .collect::<Vec<_>>()
                .join("\n\n"),
            _ => self.to_string(),
        }
    }
}
