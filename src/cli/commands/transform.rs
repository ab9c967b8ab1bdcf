//! Transform command implementation

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::model::{CleaningConfig, StarSchema, WIDE_TABLE_FILE, transform_file};

/// Arguments for the `transform` command
#[derive(Debug)]
pub struct TransformArgs {
    /// Wide table to read (default: `<output_dir>/xml_data.csv`)
    pub input: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub threshold: Option<usize>,
}

/// Handle the `transform` command
pub fn handle_transform(args: &TransformArgs) -> Result<(), CliError> {
    let input = args
        .input
        .clone()
        .unwrap_or_else(|| args.output_dir.join(WIDE_TABLE_FILE));
    let mut cleaning = CleaningConfig::default();
    if let Some(threshold) = args.threshold {
        cleaning = cleaning.with_null_threshold(threshold);
    }

    let report = transform_file(
        &input,
        &args.output_dir,
        &cleaning,
        &StarSchema::consultation(),
    )?;

    eprintln!("Transformed {} rows from {}", report.input_rows, input.display());
    if !report.cleaning.dropped_sparse.is_empty() {
        eprintln!(
            "  Dropped sparse columns: {}",
            report.cleaning.dropped_sparse.join(", ")
        );
    }
    for output in &report.outputs {
        eprintln!("  {:<20} {:>8} rows  {}", output.table, output.rows, output.path.display());
    }
    if report.unmatched_keys > 0 {
        eprintln!("  Warning: {} foreign key(s) left null", report.unmatched_keys);
    }
    Ok(())
}
