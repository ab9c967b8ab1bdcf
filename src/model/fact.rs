//! Fact table construction and surrogate-key resolution

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

use super::config::StarSchema;
use super::dimension::{DimensionTable, KeyColumns, column_positions};
use crate::table::{
    DATE_FORMAT, Row, TIME_FORMAT, TableResult, WideTable, parse_date, parse_integer,
    parse_time_of_day,
};

/// Resolve every wide-table row to its surrogate key in `dim`
///
/// The dimension's natural key is read from the source columns of its definition,
/// canonicalised the same way [`build_dim`](super::build_dim) does. A row whose tuple
/// matches no dimension row gets `None` and a warning; the run carries on.
pub fn map_keys(table: &WideTable, dim: &DimensionTable, sentinel: &str) -> Vec<Option<i64>> {
    let columns = KeyColumns::locate(table, dim.spec());

    let mut unmatched = 0usize;
    let keys: Vec<Option<i64>> = table
        .rows()
        .iter()
        .map(|row| {
            let key = columns.key(row, sentinel);
            let id = dim.key_of(&key);
            if id.is_none() {
                unmatched += 1;
            }
            id
        })
        .collect();

    if unmatched > 0 {
        warn!(
            "{} row(s) have no matching {} entry; their {} is null",
            unmatched,
            dim.name(),
            dim.key_name()
        );
    }
    keys
}

/// One row of the fact table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
    /// Surrogate keys in foreign-key column order
    pub keys: Vec<Option<i64>>,
    /// Integer measures in metric column order
    pub metrics: Vec<i64>,
    pub creation: Option<NaiveDate>,
    pub time_of_day: Option<NaiveTime>,
}

/// The resolved fact table
#[derive(Debug, Clone, Default)]
pub struct FactTable {
    columns: Vec<String>,
    rows: Vec<FactRow>,
    unmatched_keys: usize,
}

impl FactTable {
    /// Header in export order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in wide-table order
    pub fn rows(&self) -> &[FactRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Foreign keys that resolved to null
    pub fn unmatched_keys(&self) -> usize {
        self.unmatched_keys
    }

    /// Render as a text table ready for export
    pub fn to_table(&self) -> TableResult<WideTable> {
        let mut table = WideTable::new(self.columns.clone())?;
        for fact in &self.rows {
            let mut row: Row = Vec::with_capacity(self.columns.len());
            row.extend(fact.keys.iter().map(|k| k.map(|id| id.to_string())));
            row.extend(fact.metrics.iter().map(|m| Some(m.to_string())));
            row.push(fact.creation.map(|d| d.format(DATE_FORMAT).to_string()));
            row.push(fact.time_of_day.map(|t| t.format(TIME_FORMAT).to_string()));
            table.push_row(row)?;
        }
        Ok(table)
    }
}

/// Integer measure: numeric parse truncated, 0 when missing or unparseable
fn metric_value(raw: Option<&str>) -> i64 {
    raw.and_then(parse_integer).unwrap_or(0)
}

/// Build the fact table from the cleaned wide table and its dimensions
///
/// `dimensions` must hold one built dimension per foreign key of `schema.fact`; a
/// foreign key without one resolves to null for every row.
pub fn build_fact(
    table: &WideTable,
    dimensions: &[DimensionTable],
    schema: &StarSchema,
    sentinel: &str,
) -> FactTable {
    let fact = &schema.fact;
    let columns: Vec<String> = schema.fact_columns().into_iter().map(String::from).collect();

    let key_columns: Vec<Vec<Option<i64>>> = fact
        .foreign_keys
        .iter()
        .map(|name| match dimensions.iter().find(|d| d.name() == *name) {
            Some(dim) => map_keys(table, dim, sentinel),
            None => {
                warn!("No dimension built for {}, keys will be null", name);
                vec![None; table.len()]
            }
        })
        .collect();

    let metric_positions = column_positions(table, fact.metrics.iter().map(|m| m.source));
    let creation_pos = table.column_index(fact.creation.source);
    let time_pos = table.column_index(fact.time_of_day.source);

    let cell = |row: &Row, pos: Option<usize>| -> Option<String> {
        pos.and_then(|i| row[i].clone())
    };

    let mut rows = Vec::with_capacity(table.len());
    for (i, row) in table.rows().iter().enumerate() {
        rows.push(FactRow {
            keys: key_columns.iter().map(|keys| keys[i]).collect(),
            metrics: metric_positions
                .iter()
                .map(|pos| metric_value(cell(row, *pos).as_deref()))
                .collect(),
            creation: cell(row, creation_pos).as_deref().and_then(parse_date),
            time_of_day: cell(row, time_pos).as_deref().and_then(parse_time_of_day),
        });
    }

    let unmatched_keys: usize = rows
        .iter()
        .map(|r: &FactRow| r.keys.iter().filter(|k| k.is_none()).count())
        .sum();

    debug!(
        "Built {} with {} row(s), {} unmatched key(s)",
        fact.table,
        rows.len(),
        unmatched_keys
    );

    FactTable {
        columns,
        rows,
        unmatched_keys,
    }
}
