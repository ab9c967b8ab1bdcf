//! Flatten command implementation

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::flatten::{FlattenOptions, run_flatten};
use crate::model::WIDE_TABLE_FILE;

/// Arguments for the `flatten` command
#[derive(Debug)]
pub struct FlattenArgs {
    pub source: PathBuf,
    pub pattern: String,
    pub output_dir: PathBuf,
    pub progress: bool,
}

/// Handle the `flatten` command
pub fn handle_flatten(args: &FlattenArgs) -> Result<(), CliError> {
    let options = FlattenOptions::new(args.source.clone())
        .with_pattern(args.pattern.clone())
        .with_progress(args.progress);
    let output = args.output_dir.join(WIDE_TABLE_FILE);

    let stats = run_flatten(&options, &output)?;

    eprintln!("Flattened {} into {}", args.source.display(), output.display());
    eprintln!(
        "  Files: {} parsed, {} skipped of {} found",
        stats.files_parsed, stats.files_skipped, stats.files_discovered
    );
    eprintln!("  Table: {} rows x {} columns", stats.rows, stats.columns);
    eprintln!("  Duration: {}", stats.duration_string());
    for error in &stats.errors {
        eprintln!("  ! {}", error);
    }
    Ok(())
}
