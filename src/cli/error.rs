//! CLI error types

use thiserror::Error;

use crate::flatten::FlattenError;
use crate::load::LoadError;
use crate::model::ModelError;
use crate::pipeline::PipelineError;

/// Errors surfaced by CLI commands
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{0} table(s) failed to load")]
    LoadFailures(usize),
}

impl CliError {
    /// Message printed before exiting
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument(msg) => {
                format!("Invalid argument: {msg}\n\nHint: Run with --help to see valid values.")
            }
            CliError::Pipeline(e) => e.user_message(),
            CliError::Flatten(e) => e.user_message(),
            CliError::Model(e) => e.user_message(),
            CliError::Load(e) => e.user_message(),
            _ => self.to_string(),
        }
    }
}
