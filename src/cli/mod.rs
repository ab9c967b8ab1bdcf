//! CLI module for the consultation-etl binary

pub mod commands;
pub mod error;
pub mod logging;

pub use error::CliError;
