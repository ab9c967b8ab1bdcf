//! The bulk loader seam and the per-table load loop

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::copy::{CopyPlan, count_data_rows};
use super::error::{LoadError, LoadResult};
use super::tables::DestinationTable;
use crate::model::table_path;

/// A destination store that accepts whole-table bulk copies
///
/// Each `load` is one unit: either every row of the file is committed or none is.
#[async_trait]
pub trait BulkLoader: Send {
    /// Execute a DDL script
    async fn execute_ddl(&mut self, sql: &str) -> LoadResult<()>;

    /// Copy a validated file into its table, returning the number of rows loaded
    async fn load(&mut self, plan: &CopyPlan) -> LoadResult<u64>;
}

/// Outcome of loading one table
#[derive(Debug)]
pub struct TableLoad {
    pub table: DestinationTable,
    pub result: LoadResult<u64>,
}

/// Outcome of loading a set of tables
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Tables attempted, in load order
    pub tables: Vec<TableLoad>,
    /// Tables not attempted because an earlier load failed in fail-fast mode
    pub skipped: Vec<DestinationTable>,
}

impl LoadReport {
    /// True if every attempted table loaded and none was skipped
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.tables.iter().all(|t| t.result.is_ok())
    }

    /// Rows loaded per successful table
    pub fn loaded(&self) -> Vec<(DestinationTable, u64)> {
        self.tables
            .iter()
            .filter_map(|t| t.result.as_ref().ok().map(|rows| (t.table, *rows)))
            .collect()
    }

    /// Total rows loaded
    pub fn total_rows(&self) -> u64 {
        self.loaded().iter().map(|(_, rows)| rows).sum()
    }

    /// Failed tables with their errors
    pub fn failures(&self) -> Vec<(DestinationTable, &LoadError)> {
        self.tables
            .iter()
            .filter_map(|t| t.result.as_ref().err().map(|e| (t.table, e)))
            .collect()
    }

    /// Take ownership of the errors
    pub fn into_errors(self) -> Vec<LoadError> {
        self.tables
            .into_iter()
            .filter_map(|t| t.result.err())
            .collect()
    }
}

/// Validate and load one table from `output_dir/<table>.csv`
pub async fn load_table<L>(loader: &mut L, table_name: &str, output_dir: &Path) -> LoadResult<u64>
where
    L: BulkLoader + ?Sized,
{
    let path = table_path(output_dir, table_name);
    let plan = CopyPlan::prepare(table_name, &path)?;
    debug!("Loading {} from {}", plan.table, plan.path.display());
    loader.load(&plan).await
}

/// Load tables in the given order, dimensions before the fact table
///
/// A failing table does not stop the others unless `fail_fast` is set, in which case
/// the remaining tables are reported as skipped.
pub async fn load_all<L>(
    loader: &mut L,
    output_dir: &Path,
    tables: &[DestinationTable],
    fail_fast: bool,
) -> LoadReport
where
    L: BulkLoader + ?Sized,
{
    let mut ordered: Vec<DestinationTable> = tables.to_vec();
    ordered.sort();
    ordered.dedup();

    let mut report = LoadReport::default();
    let mut iter = ordered.into_iter();

    for table in iter.by_ref() {
        let result = load_table(loader, table.name(), output_dir).await;
        let failed = result.is_err();
        match &result {
            Ok(rows) => info!("Loaded {} row(s) into {}", rows, table),
            Err(e) => error!("Failed to load {}: {}", table, e),
        }
        report.tables.push(TableLoad { table, result });

        if failed && fail_fast {
            break;
        }
    }

    report.skipped = iter.collect();
    if !report.skipped.is_empty() {
        warn!("Skipped {} table(s) after a failure", report.skipped.len());
    }
    report
}

/// In-memory loader that records what it is asked to do
///
/// Rows are counted from the file instead of being sent anywhere. Tables listed in
/// `fail_tables` fail as a bulk transfer would, leaving nothing loaded.
#[derive(Debug, Default)]
pub struct RecordingLoader {
    pub ddl: Vec<String>,
    pub loaded: Vec<(DestinationTable, u64)>,
    pub fail_tables: Vec<DestinationTable>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `table` fail
    pub fn failing_on(mut self, table: DestinationTable) -> Self {
        self.fail_tables.push(table);
        self
    }
}

#[async_trait]
impl BulkLoader for RecordingLoader {
    async fn execute_ddl(&mut self, sql: &str) -> LoadResult<()> {
        self.ddl.push(sql.to_string());
        Ok(())
    }

    async fn load(&mut self, plan: &CopyPlan) -> LoadResult<u64> {
        if self.fail_tables.contains(&plan.table) {
            return Err(LoadError::Copy {
                table: plan.table.name().to_string(),
                cause: "simulated transfer failure".to_string(),
            });
        }
        let rows = count_data_rows(&plan.path)?;
        self.loaded.push((plan.table, rows));
        Ok(rows)
    }
}
