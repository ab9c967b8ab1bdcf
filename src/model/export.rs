//! Export of the nine output tables
//!
//! Dimensions are written without their surrogate key, in key order, so the
//! destination's auto-increment regenerates the same numbering. Typed columns are
//! rendered to their literal form; a value that does not fit the type (including the
//! sentinel) becomes an empty field, which loads as null.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dimension::DimensionTable;
use super::error::ModelResult;
use super::fact::FactTable;
use crate::table::{Row, TableResult, WideTable};

/// File the flattener writes and the transform reads
pub const WIDE_TABLE_FILE: &str = "xml_data.csv";

/// Path of an output table inside `output_dir`
pub fn table_path(output_dir: &Path, table: &str) -> PathBuf {
    output_dir.join(format!("{table}.csv"))
}

/// One written output table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOutput {
    pub table: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// A dimension rendered for export: output columns only, typed cells
pub fn export_dimension(dim: &DimensionTable) -> TableResult<WideTable> {
    let spec = dim.spec();
    let mut table = WideTable::new(spec.output_columns().map(str::to_string).collect())?;

    for (_, key) in dim.rows() {
        let row: Row = spec
            .columns
            .iter()
            .zip(key.parts())
            .map(|(mapping, value)| mapping.kind.render(Some(value)))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

/// Dimensions and fact table of one transform run
#[derive(Debug, Clone)]
pub struct StarTables {
    pub dimensions: Vec<DimensionTable>,
    pub fact: FactTable,
    pub fact_table: &'static str,
}

impl StarTables {
    /// Look up a built dimension by table name
    pub fn dimension(&self, table: &str) -> Option<&DimensionTable> {
        self.dimensions.iter().find(|d| d.name() == table)
    }

    /// Write every table as `<table>.csv` under `output_dir`
    pub fn write_all(&self, output_dir: &Path) -> ModelResult<Vec<TableOutput>> {
        let mut outputs = Vec::with_capacity(self.dimensions.len() + 1);

        for dim in &self.dimensions {
            let path = table_path(output_dir, dim.name());
            let table = export_dimension(dim)?;
            table.write_csv(&path)?;
            debug!("Wrote {} ({} rows)", path.display(), table.len());
            outputs.push(TableOutput {
                table: dim.name().to_string(),
                path,
                rows: table.len(),
            });
        }

        let path = table_path(output_dir, self.fact_table);
        self.fact.to_table()?.write_csv(&path)?;
        outputs.push(TableOutput {
            table: self.fact_table.to_string(),
            path,
            rows: self.fact.len(),
        });

        info!(
            "Exported {} table(s) to {}",
            outputs.len(),
            output_dir.display()
        );
        Ok(outputs)
    }
}
