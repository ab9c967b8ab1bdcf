//! XML flattening
//!
//! Reads every matching file in a source directory, extracts one flat record per
//! file and unions the field names of all records into a single [`WideTable`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use consultation_etl::flatten::{FlattenOptions, run_flatten};
//!
//! let options = FlattenOptions::new("data/xml");
//! let stats = run_flatten(&options, Path::new("processed/xml_data.csv"))?;
//! println!("{} rows, {} columns", stats.rows, stats.columns);
//! # Ok::<(), consultation_etl::flatten::FlattenError>(())
//! ```

mod discover;
mod error;
mod progress;
mod stats;
mod xml;

pub use discover::{DiscoveredFile, discover_files};
pub use error::{FlattenError, FlattenResult};
pub use progress::{FlattenProgress, format_bytes};
pub use stats::FlattenStats;
pub use xml::{parse_record, parse_record_file};

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::table::{RawRecord, SOURCE_FILE_COLUMN, WideTable};

/// Default glob pattern for source files
pub const DEFAULT_PATTERN: &str = "*.xml";

/// Where and how to look for source files
#[derive(Debug, Clone)]
pub struct FlattenOptions {
    /// Directory holding one XML file per record
    pub source_dir: PathBuf,
    /// Glob pattern relative to `source_dir`
    pub pattern: String,
    /// Show a progress bar
    pub progress: bool,
}

impl FlattenOptions {
    /// Options for a source directory with the default pattern
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            progress: false,
        }
    }

    /// Set the glob pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// Flatten the source directory into a wide table
///
/// A missing source directory is not an error: it yields a table with only the
/// `source_file` column. Files that fail to parse are logged and skipped.
pub fn flatten_directory(options: &FlattenOptions) -> FlattenResult<(WideTable, FlattenStats)> {
    let start = Instant::now();
    let mut stats = FlattenStats::new();

    if !options.source_dir.is_dir() {
        warn!(
            "Source directory {} does not exist, producing an empty table",
            options.source_dir.display()
        );
        let table = WideTable::from_records(&[]);
        stats.columns = table.columns().len();
        stats.duration = start.elapsed();
        return Ok((table, stats));
    }

    let files = discover_files(&options.source_dir, &options.pattern)?;
    stats.files_discovered = files.len();
    info!(
        "Found {} file(s) matching '{}' in {}",
        files.len(),
        options.pattern,
        options.source_dir.display()
    );

    let progress = FlattenProgress::new(files.len() as u64, options.progress);
    let mut records: Vec<RawRecord> = Vec::with_capacity(files.len());

    for file in &files {
        let file_name = file.file_name();
        match parse_record_file(&file.path) {
            Ok(mut record) => {
                // The injected name wins over a same-named field in the document.
                record.insert(SOURCE_FILE_COLUMN, Some(file_name.clone()));
                debug!("Parsed {} ({} fields)", file_name, record.len());
                records.push(record);
                stats.files_parsed += 1;
                stats.bytes_processed += file.size;
                progress.inc_files();
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", file_name, e);
                stats.add_error(format!("{}: {:#}", file_name, e));
                stats.files_skipped += 1;
                progress.skip_file(&file_name);
            }
        }
    }

    let table = WideTable::from_records(&records);
    stats.rows = table.len();
    stats.columns = table.columns().len();
    stats.duration = start.elapsed();

    progress.finish_success(&format!(
        "{} file(s) flattened, {} skipped",
        stats.files_parsed, stats.files_skipped
    ));

    Ok((table, stats))
}

/// Flatten the source directory and write the wide table to `output_path`
pub fn run_flatten(options: &FlattenOptions, output_path: &Path) -> FlattenResult<FlattenStats> {
    let (table, mut stats) = flatten_directory(options)?;
    let start = Instant::now();

    table.write_csv(output_path)?;
    stats.duration += start.elapsed();

    info!(
        "Flattened {} row(s) x {} column(s) into {} ({} read, {})",
        stats.rows,
        stats.columns,
        output_path.display(),
        format_bytes(stats.bytes_processed),
        stats.duration_string()
    );

    Ok(stats)
}
