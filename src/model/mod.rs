//! Dimensional transform
//!
//! Turns the flattened wide table into a star schema: eight deduplicated dimension
//! tables with surrogate keys and one fact table whose foreign keys are resolved
//! against them.
//!
//! The steps are:
//! 1. [`clean`]: drop sparse and irrelevant columns, split ACR, default missing values
//! 2. [`fill_natural_keys`]: every natural-key column present and non-null
//! 3. [`build_dim`] for each dimension of the [`StarSchema`]
//! 4. [`build_fact`], which resolves keys with [`map_keys`]
//! 5. [`StarTables::write_all`]: nine CSV files
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use consultation_etl::model::{CleaningConfig, StarSchema, transform_file};
//!
//! let report = transform_file(
//!     Path::new("processed/xml_data.csv"),
//!     Path::new("processed"),
//!     &CleaningConfig::default(),
//!     &StarSchema::consultation(),
//! )?;
//! println!("{} fact rows", report.fact_rows);
//! # Ok::<(), consultation_etl::model::ModelError>(())
//! ```

mod clean;
mod config;
mod dimension;
mod error;
mod export;
mod fact;

pub use clean::{CleaningReport, clean};
pub use config::{
    ACR_COLUMN, ACR_PARTS, CleaningConfig, ColumnMapping, DEFAULT_NULL_THRESHOLD,
    DEFAULT_SENTINEL, DimensionSpec, FactSpec, StarSchema, acr_part_columns,
};
pub use dimension::{DimensionTable, NaturalKey, build_dim, fill_natural_keys};
pub use error::{ModelError, ModelResult};
pub use export::{StarTables, TableOutput, WIDE_TABLE_FILE, export_dimension, table_path};
pub use fact::{FactRow, FactTable, build_fact, map_keys};

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::table::WideTable;

/// Summary of a transform run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReport {
    /// Rows in the wide table
    pub input_rows: usize,
    /// What cleaning changed
    pub cleaning: CleaningReport,
    /// Distinct rows per dimension, in schema order
    pub dimension_rows: Vec<(String, usize)>,
    /// Rows in the fact table
    pub fact_rows: usize,
    /// Foreign keys that resolved to null
    pub unmatched_keys: usize,
    /// Files written
    pub outputs: Vec<TableOutput>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Clean a wide table in place and build the star schema from it
pub fn transform(
    table: &mut WideTable,
    cleaning: &CleaningConfig,
    schema: &StarSchema,
) -> ModelResult<(StarTables, CleaningReport)> {
    let report = clean(table, cleaning)?;
    fill_natural_keys(table, schema, &cleaning.sentinel);

    let dimensions: Vec<DimensionTable> = schema
        .dimensions
        .iter()
        .map(|spec| build_dim(table, spec, &cleaning.sentinel))
        .collect();
    let fact = build_fact(table, &dimensions, schema, &cleaning.sentinel);

    Ok((
        StarTables {
            dimensions,
            fact,
            fact_table: schema.fact.table,
        },
        report,
    ))
}

/// Read the wide table, transform it and write the nine output tables
///
/// A missing input is reported before anything is written.
pub fn transform_file(
    input: &Path,
    output_dir: &Path,
    cleaning: &CleaningConfig,
    schema: &StarSchema,
) -> ModelResult<TransformReport> {
    let _span = info_span!("transform", input = %input.display()).entered();
    let start = Instant::now();

    cleaning.validate().map_err(ModelError::InvalidConfig)?;
    if !input.is_file() {
        return Err(ModelError::MissingInput(input.to_path_buf()));
    }

    let mut table = WideTable::read_csv(input)?;
    info!(
        "Read {} row(s) x {} column(s) from {}",
        table.len(),
        table.columns().len(),
        input.display()
    );

    let input_rows = table.len();
    let (star, cleaning_report) = transform(&mut table, cleaning, schema)?;
    let outputs = star.write_all(output_dir)?;

    let report = TransformReport {
        input_rows,
        cleaning: cleaning_report,
        dimension_rows: star
            .dimensions
            .iter()
            .map(|d| (d.name().to_string(), d.len()))
            .collect(),
        fact_rows: star.fact.len(),
        unmatched_keys: star.fact.unmatched_keys(),
        outputs,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Transform complete: {} fact row(s), {} dimension(s), {} unmatched key(s)",
        report.fact_rows,
        report.dimension_rows.len(),
        report.unmatched_keys
    );
    Ok(report)
}
