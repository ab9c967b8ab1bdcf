//! Missingness cleanup applied to the wide table before dimension building
//!
//! Every step is total: values that cannot be coerced fall back to the documented
//! default (0, the sentinel, or null) and are counted in the [`CleaningReport`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::{ACR_COLUMN, CleaningConfig, acr_part_columns};
use super::error::ModelResult;
use crate::table::{
    DATE_FORMAT, TIME_FORMAT, TIMESTAMP_FORMAT, WideTable, canonical_number,
    parse_datetime_dayfirst, parse_time_of_day,
};

/// What the cleaning pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningReport {
    /// Columns dropped for exceeding the null threshold
    pub dropped_sparse: Vec<String>,
    /// Always-irrelevant columns that were present and dropped
    pub dropped_irrelevant: Vec<String>,
    /// Whether a combined ACR column was split
    pub acr_split: bool,
    /// Columns added with their default value
    pub synthesized: Vec<String>,
    /// Null cells replaced by a default
    pub defaulted_cells: usize,
    /// Non-null values that could not be parsed and became a default or null
    pub unparseable_values: usize,
}

impl CleaningReport {
    /// True if the pass left the table untouched
    pub fn is_noop(&self) -> bool {
        self.dropped_sparse.is_empty()
            && self.dropped_irrelevant.is_empty()
            && !self.acr_split
            && self.synthesized.is_empty()
            && self.defaulted_cells == 0
            && self.unparseable_values == 0
    }
}

/// Run the cleaning pass over a wide table in place
///
/// Date and timestamp values are coerced before sparse columns are counted, so a
/// value that cannot be parsed counts as a null and a second pass finds nothing new
/// to drop.
pub fn clean(table: &mut WideTable, config: &CleaningConfig) -> ModelResult<CleaningReport> {
    let mut report = CleaningReport::default();

    for column in &config.date_columns {
        coerce_dates(table, column, &mut report);
    }

    for column in &config.timestamp_columns {
        coerce_timestamps(table, column, &mut report);
    }

    drop_sparse_columns(table, config.null_threshold, &mut report);

    for column in &config.dropped_columns {
        if table.drop_column(column) {
            report.dropped_irrelevant.push(column.clone());
        }
    }

    split_acr(table, &mut report)?;

    for column in &config.text_columns {
        fill_default(table, column, &config.sentinel, &mut report);
    }

    for column in &config.numeric_columns {
        fill_default(table, column, "0", &mut report);
    }

    if report.is_noop() {
        debug!("Cleaning pass made no changes");
    } else {
        info!(
            "Cleaning: dropped {} sparse and {} irrelevant column(s), synthesized {}, defaulted {} cell(s), {} unparseable value(s)",
            report.dropped_sparse.len(),
            report.dropped_irrelevant.len(),
            report.synthesized.len(),
            report.defaulted_cells,
            report.unparseable_values
        );
    }

    Ok(report)
}

fn drop_sparse_columns(table: &mut WideTable, threshold: usize, report: &mut CleaningReport) {
    let sparse: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| table.null_count(c) > threshold)
        .cloned()
        .collect();

    for column in sparse {
        debug!("Dropping column {} ({} nulls)", column, table.null_count(&column));
        table.drop_column(&column);
        report.dropped_sparse.push(column);
    }
}

/// ACR part value: canonical number, 0 when missing or unparseable
fn acr_value(raw: Option<&str>, report: &mut CleaningReport) -> String {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => match canonical_number(value) {
            Some(n) => n,
            None => {
                report.unparseable_values += 1;
                "0".to_string()
            }
        },
        None => "0".to_string(),
    }
}

fn split_acr(table: &mut WideTable, report: &mut CleaningReport) -> ModelResult<()> {
    let parts = acr_part_columns();

    if let Some(idx) = table.column_index(ACR_COLUMN) {
        let mut split: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(table.len()); parts.len()];
        let raw_values: Vec<Option<String>> =
            table.rows().iter().map(|row| row[idx].clone()).collect();

        for raw in raw_values {
            let mut pieces = raw.as_deref().map(|v| v.splitn(parts.len(), ',')).into_iter().flatten();
            for column in split.iter_mut() {
                column.push(Some(acr_value(pieces.next(), report)));
            }
        }

        table.drop_column(ACR_COLUMN);
        for (name, values) in parts.iter().zip(split) {
            table.set_column(name, values)?;
        }
        report.acr_split = true;
        return Ok(());
    }

    for name in &parts {
        if table.has_column(name) {
            let mut changed = 0usize;
            let mut unparseable = 0usize;
            table.map_column(name, |raw| {
                let mut scratch = CleaningReport::default();
                let value = acr_value(raw, &mut scratch);
                unparseable += scratch.unparseable_values;
                if raw != Some(value.as_str()) {
                    changed += 1;
                }
                Some(value)
            });
            report.defaulted_cells += changed;
            report.unparseable_values += unparseable;
        } else {
            table.add_constant_column(name, Some("0"));
            report.synthesized.push(name.clone());
        }
    }
    Ok(())
}

fn fill_default(table: &mut WideTable, column: &str, default: &str, report: &mut CleaningReport) {
    if !table.has_column(column) {
        table.add_constant_column(column, Some(default));
        report.synthesized.push(column.to_string());
        return;
    }

    let mut filled = 0usize;
    table.map_column(column, |raw| match raw {
        Some(value) => Some(value.to_string()),
        None => {
            filled += 1;
            Some(default.to_string())
        }
    });
    report.defaulted_cells += filled;
}

fn coerce_dates(table: &mut WideTable, column: &str, report: &mut CleaningReport) {
    let mut unparseable = 0usize;
    table.map_column(column, |raw| {
        let raw = raw?;
        match parse_datetime_dayfirst(raw) {
            Some(dt) => Some(dt.format(DATE_FORMAT).to_string()),
            None => {
                unparseable += 1;
                None
            }
        }
    });
    report.unparseable_values += unparseable;
}

fn coerce_timestamps(table: &mut WideTable, column: &str, report: &mut CleaningReport) {
    let mut unparseable = 0usize;
    table.map_column(column, |raw| {
        let raw = raw?;
        if let Some(dt) = parse_datetime_dayfirst(raw) {
            return Some(dt.format(TIMESTAMP_FORMAT).to_string());
        }
        // A bare time of day keeps its time.
        match parse_time_of_day(raw) {
            Some(t) => Some(t.format(TIME_FORMAT).to_string()),
            None => {
                unparseable += 1;
                None
            }
        }
    });
    report.unparseable_values += unparseable;
}
