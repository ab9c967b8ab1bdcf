//! Dimension construction
//!
//! A dimension is the distinct set of natural-key tuples found in the wide table, in
//! first-seen order, numbered 1..N.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::config::{DimensionSpec, StarSchema};
use crate::table::{ColumnKind, Row, WideTable};

/// A natural-key tuple in its canonical text form
///
/// Both sides of a key lookup go through [`KeyColumns::key`], so matching never
/// depends on how a value happened to be typed. Typed parts hold the value's export
/// rendering: `40` and `40.0` are the same age, and every value that exports as null
/// is the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey(Vec<String>);

impl NaturalKey {
    /// Build a key from explicit parts
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// Key parts in column order
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Where a dimension's natural-key columns sit in a wide table, and their kinds
#[derive(Debug, Clone)]
pub struct KeyColumns {
    columns: Vec<(Option<usize>, ColumnKind)>,
}

impl KeyColumns {
    /// Locate the source columns of `spec` in `table`
    pub fn locate(table: &WideTable, spec: &DimensionSpec) -> Self {
        let columns = spec
            .columns
            .iter()
            .map(|mapping| (table.column_index(mapping.source), mapping.kind))
            .collect();
        Self { columns }
    }

    /// Source columns absent from the table
    pub fn missing<'a>(&'a self, spec: &'a DimensionSpec) -> impl Iterator<Item = &'static str> + 'a {
        spec.columns
            .iter()
            .zip(&self.columns)
            .filter(|(_, (pos, _))| pos.is_none())
            .map(|(mapping, _)| mapping.source)
    }

    /// The canonical key of one row
    ///
    /// An absent column, a null or blank cell, or a typed value that does not parse
    /// reads as the sentinel.
    pub fn key(&self, row: &Row, sentinel: &str) -> NaturalKey {
        let parts = self
            .columns
            .iter()
            .map(|(pos, kind)| {
                pos.and_then(|i| row[i].as_deref())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .and_then(|v| kind.render(Some(v)))
                    .unwrap_or_else(|| sentinel.to_string())
            })
            .collect();
        NaturalKey(parts)
    }
}

/// Positions of a list of source columns in a table
pub(crate) fn column_positions<'a>(
    table: &WideTable,
    columns: impl IntoIterator<Item = &'a str>,
) -> Vec<Option<usize>> {
    columns.into_iter().map(|c| table.column_index(c)).collect()
}

/// A built dimension: distinct natural keys with their surrogate keys
#[derive(Debug, Clone)]
pub struct DimensionTable {
    spec: DimensionSpec,
    rows: Vec<NaturalKey>,
    index: HashMap<NaturalKey, i64>,
}

impl DimensionTable {
    /// Create an empty dimension
    pub fn new(spec: DimensionSpec) -> Self {
        Self {
            spec,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a key if unseen, returning its surrogate key
    pub fn insert(&mut self, key: NaturalKey) -> i64 {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.rows.len() as i64 + 1;
        self.index.insert(key.clone(), id);
        self.rows.push(key);
        id
    }

    /// Definition this dimension was built from
    pub fn spec(&self) -> &DimensionSpec {
        &self.spec
    }

    /// Destination table name
    pub fn name(&self) -> &'static str {
        self.spec.table
    }

    /// Surrogate key column name
    pub fn key_name(&self) -> &'static str {
        self.spec.key
    }

    /// Number of distinct rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the dimension has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with their surrogate keys, in key order
    pub fn rows(&self) -> impl Iterator<Item = (i64, &NaturalKey)> {
        self.rows.iter().enumerate().map(|(i, k)| (i as i64 + 1, k))
    }

    /// Surrogate key of a natural key
    pub fn key_of(&self, key: &NaturalKey) -> Option<i64> {
        self.index.get(key).copied()
    }

    /// Natural key behind a surrogate key
    pub fn lookup(&self, id: i64) -> Option<&NaturalKey> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.rows.get(idx)
    }
}

/// Build one dimension from the cleaned wide table
///
/// Source columns missing from the table read as the sentinel. Rows are deduplicated
/// on the full canonical natural-key tuple, keeping first-occurrence order, and
/// numbered from 1.
pub fn build_dim(table: &WideTable, spec: &DimensionSpec, sentinel: &str) -> DimensionTable {
    let columns = KeyColumns::locate(table, spec);
    for source in columns.missing(spec) {
        debug!("{}: column {} absent, using sentinel", spec.table, source);
    }

    let mut dim = DimensionTable::new(*spec);
    for row in table.rows() {
        dim.insert(columns.key(row, sentinel));
    }

    debug!(
        "Built {} with {} row(s) from {} source row(s)",
        spec.table,
        dim.len(),
        table.len()
    );
    dim
}

/// Make every natural-key column present and non-null
///
/// Absent columns are added filled with the sentinel and null cells are replaced
/// with it, so dimensions never contain nulls. Returns the number of cells changed.
pub fn fill_natural_keys(table: &mut WideTable, schema: &StarSchema, sentinel: &str) -> usize {
    let mut changed = 0usize;
    for column in schema.natural_key_columns() {
        if table.add_constant_column(column, Some(sentinel)) {
            changed += table.len();
            continue;
        }
        table.map_column(column, |raw| match raw.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => Some(value.to_string()),
            None => {
                changed += 1;
                Some(sentinel.to_string())
            }
        });
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{RawRecord, SOURCE_FILE_COLUMN};

    const SENTINEL: &str = "Non précisé";

    fn hospital_spec() -> DimensionSpec {
        *StarSchema::consultation().dimension("dim_hospital").unwrap()
    }

    #[test]
    fn test_build_dim_dedups_in_first_seen_order() {
        let table = WideTable::from_records(&[
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "a.xml")
                .with_field("Hospital", "GH")
                .with_field("Department", "Cardio"),
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "b.xml")
                .with_field("Hospital", "CHU")
                .with_field("Department", "Radio"),
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "c.xml")
                .with_field("Hospital", "GH")
                .with_field("Department", "Cardio"),
        ]);

        let dim = build_dim(&table, &hospital_spec(), SENTINEL);
        assert_eq!(dim.len(), 2);

        let rows: Vec<(i64, Vec<String>)> =
            dim.rows().map(|(id, k)| (id, k.parts().to_vec())).collect();
        assert_eq!(rows[0], (1, vec!["GH".to_string(), "Cardio".to_string()]));
        assert_eq!(rows[1], (2, vec!["CHU".to_string(), "Radio".to_string()]));
        assert_eq!(dim.lookup(2).map(|k| k.parts()[0].as_str()), Some("CHU"));
        assert_eq!(dim.lookup(0), None);
        assert_eq!(dim.lookup(3), None);
    }

    #[test]
    fn test_absent_and_null_columns_read_as_sentinel() {
        let table = WideTable::from_records(&[
            RawRecord::new().with_field(SOURCE_FILE_COLUMN, "a.xml"),
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "b.xml")
                .with_field("Hospital", "GH"),
        ]);

        let dim = build_dim(&table, &hospital_spec(), SENTINEL);
        let keys: Vec<String> = dim.rows().map(|(_, k)| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "(Non précisé, Non précisé)".to_string(),
                "(GH, Non précisé)".to_string()
            ]
        );
    }

    #[test]
    fn test_typed_key_parts_are_canonical() {
        let spec = *StarSchema::consultation().dimension("dim_patient").unwrap();
        let patient = |age: &str, birthdate: &str| {
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "a.xml")
                .with_field("Description", "Fall")
                .with_field("ClinicalPresentation", SENTINEL)
                .with_field("Birthdate", birthdate)
                .with_field("Age", age)
        };
        let table = WideTable::from_records(&[
            patient("40", "1970-02-01"),
            patient("40.0", "01/02/1970"),
            patient("40.7", "1970-02-01 00:00:00"),
            patient("41", "unknown"),
            patient("41", SENTINEL),
        ]);

        let dim = build_dim(&table, &spec, SENTINEL);
        let rows: Vec<Vec<String>> = dim.rows().map(|(_, k)| k.parts().to_vec()).collect();
        assert_eq!(
            rows,
            vec![
                vec!["Fall", SENTINEL, "1970-02-01", "40"],
                vec!["Fall", SENTINEL, SENTINEL, "41"],
            ]
        );
    }

    #[test]
    fn test_insert_returns_existing_key() {
        let mut dim = DimensionTable::new(hospital_spec());
        assert_eq!(dim.insert(NaturalKey::new(vec!["GH".into(), "Cardio".into()])), 1);
        assert_eq!(dim.insert(NaturalKey::new(vec!["CHU".into(), "Cardio".into()])), 2);
        assert_eq!(dim.insert(NaturalKey::new(vec!["GH".into(), "Cardio".into()])), 1);
        assert_eq!(dim.len(), 2);
    }

    #[test]
    fn test_fill_natural_keys() {
        let mut table = WideTable::from_records(&[
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "a.xml")
                .with_field("Hospital", "GH"),
            RawRecord::new()
                .with_field(SOURCE_FILE_COLUMN, "b.xml")
                .with_field("Diagnosis", "Fracture"),
        ]);
        let schema = StarSchema::consultation();
        fill_natural_keys(&mut table, &schema, SENTINEL);

        for column in schema.natural_key_columns() {
            assert_eq!(table.null_count(column), 0, "{column}");
        }
        assert_eq!(table.value(1, "Hospital"), Some(SENTINEL));
        assert_eq!(table.value(0, "ACR1"), Some(SENTINEL));
        assert_eq!(fill_natural_keys(&mut table, &schema, SENTINEL), 0);
    }
}
