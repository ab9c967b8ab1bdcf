//! Schema and load command implementations

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::load::{BulkLoader, DestinationTable, PostgresLoader, load_all, schema};

/// Arguments for the `load` command
#[derive(Debug)]
pub struct LoadArgs {
    pub database_url: String,
    pub output_dir: PathBuf,
    /// Tables to load (empty = all)
    pub tables: Vec<String>,
    pub fail_fast: bool,
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::InvalidArgument(format!("cannot start runtime: {e}")))
}

/// Handle the `schema` command
pub fn handle_schema(database_url: &str) -> Result<(), CliError> {
    runtime()?.block_on(async {
        let mut loader = PostgresLoader::connect(database_url).await?;
        loader.execute_ddl(&schema::create_schema()).await?;
        eprintln!(
            "Recreated {} destination tables",
            DestinationTable::all().len()
        );
        Ok::<(), CliError>(())
    })
}

/// Handle the `load` command
///
/// The destination tables are recreated first so that a load never appends to rows of
/// an earlier run.
pub fn handle_load(args: &LoadArgs) -> Result<(), CliError> {
    let tables: Vec<DestinationTable> = if args.tables.is_empty() {
        DestinationTable::all().to_vec()
    } else {
        args.tables
            .iter()
            .map(|t| t.parse::<DestinationTable>())
            .collect::<Result<_, _>>()?
    };

    let report = runtime()?.block_on(async {
        let mut loader = PostgresLoader::connect(&args.database_url).await?;
        loader.execute_ddl(&schema::create_schema()).await?;
        Ok::<_, CliError>(load_all(&mut loader, &args.output_dir, &tables, args.fail_fast).await)
    })?;

    for (table, rows) in report.loaded() {
        eprintln!("  {:<20} {:>8} rows", table.name(), rows);
    }
    for (table, error) in report.failures() {
        eprintln!("  {:<20} FAILED: {}", table.name(), error);
    }
    for table in &report.skipped {
        eprintln!("  {:<20} skipped", table.name());
    }
    eprintln!("Loaded {} rows", report.total_rows());

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::LoadFailures(
            report.failures().len() + report.skipped.len(),
        ))
    }
}
