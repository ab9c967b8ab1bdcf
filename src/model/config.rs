//! Cleaning parameters and the star-schema definition
//!
//! Both are plain immutable values handed to the transform functions; nothing here
//! is global state.

use serde::{Deserialize, Serialize};

use crate::table::{ColumnKind, SOURCE_FILE_COLUMN};

/// Placeholder substituted for missing free text
pub const DEFAULT_SENTINEL: &str = "Non précisé";

/// Columns with more nulls than this are dropped
pub const DEFAULT_NULL_THRESHOLD: usize = 800;

/// Combined ACR field and the number of parts it splits into
pub const ACR_COLUMN: &str = "ACR";
pub const ACR_PARTS: usize = 4;

/// Names of the split ACR columns (`ACR1` .. `ACR4`)
pub fn acr_part_columns() -> Vec<String> {
    (1..=ACR_PARTS).map(|i| format!("{ACR_COLUMN}{i}")).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Parameters of the cleaning pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Absolute null count above which a column is dropped
    ///
    /// This is a row count, not a ratio: the same data set grown tenfold keeps
    /// columns it would otherwise lose.
    pub null_threshold: usize,
    /// Text substituted for missing free text and natural-key values
    pub sentinel: String,
    /// Columns that are always dropped
    pub dropped_columns: Vec<String>,
    /// Free-text columns defaulted to the sentinel
    pub text_columns: Vec<String>,
    /// Numeric columns defaulted to 0
    pub numeric_columns: Vec<String>,
    /// Columns parsed to a calendar date
    pub date_columns: Vec<String>,
    /// Columns parsed to a timestamp
    pub timestamp_columns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            null_threshold: DEFAULT_NULL_THRESHOLD,
            sentinel: DEFAULT_SENTINEL.to_string(),
            dropped_columns: strings(&["OOperation"]),
            text_columns: strings(&[
                "Description",
                "ClinicalPresentation",
                "Commentary",
                "Chapter",
                "Hospital",
                "Department",
                "Language",
                "Diagnosis",
                "Title",
                "WEBURL",
                "ImageThumbnailID",
            ]),
            numeric_columns: strings(&[
                "ODislocation",
                "OPolytrauma",
                "OOpen",
                "OPathologic",
                "OGraft",
                "Age",
            ]),
            date_columns: strings(&["Date", "Birthdate", "Creation"]),
            timestamp_columns: strings(&["DateTime"]),
        }
    }
}

impl CleaningConfig {
    /// Set the sparsity threshold
    pub fn with_null_threshold(mut self, threshold: usize) -> Self {
        self.null_threshold = threshold;
        self
    }

    /// Set the sentinel text
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Check the configuration for values the pass cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.sentinel.trim().is_empty() {
            return Err("sentinel must not be empty".to_string());
        }
        for column in &self.text_columns {
            if self.numeric_columns.contains(column) {
                return Err(format!("column '{column}' is listed as both text and numeric"));
            }
        }
        Ok(())
    }
}

/// A source column and the name and kind it is exported under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source: &'static str,
    pub output: &'static str,
    pub kind: ColumnKind,
}

const fn map(source: &'static str, output: &'static str, kind: ColumnKind) -> ColumnMapping {
    ColumnMapping {
        source,
        output,
        kind,
    }
}

/// One dimension: its natural-key columns and surrogate key name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    /// Destination table name
    pub table: &'static str,
    /// Surrogate key column
    pub key: &'static str,
    /// Natural-key columns in order
    pub columns: &'static [ColumnMapping],
}

impl DimensionSpec {
    /// Source column names of the natural key
    pub fn source_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.source)
    }

    /// Output column names of the natural key
    pub fn output_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.output)
    }
}

/// The fact table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactSpec {
    /// Destination table name
    pub table: &'static str,
    /// Dimension tables in foreign-key column order
    pub foreign_keys: &'static [&'static str],
    /// Integer measures
    pub metrics: &'static [ColumnMapping],
    /// Date of creation
    pub creation: ColumnMapping,
    /// Time of day of the consultation
    pub time_of_day: ColumnMapping,
}

/// Eight dimensions and one fact table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarSchema {
    pub dimensions: &'static [DimensionSpec],
    pub fact: FactSpec,
}

const CONSULTATION_DIMENSIONS: &[DimensionSpec] = &[
    DimensionSpec {
        table: "dim_patient",
        key: "id_patient",
        columns: &[
            map("Description", "description_patient", ColumnKind::Text),
            map("ClinicalPresentation", "clinical_presentation", ColumnKind::Text),
            map("Birthdate", "birthdate", ColumnKind::Date),
            map("Age", "age", ColumnKind::Integer),
        ],
    },
    DimensionSpec {
        table: "dim_hospital",
        key: "id_hospital",
        columns: &[
            map("Hospital", "hospital", ColumnKind::Text),
            map("Department", "department", ColumnKind::Text),
        ],
    },
    DimensionSpec {
        table: "dim_diagnosis",
        key: "id_diagnosis",
        columns: &[map("Diagnosis", "diagnosis", ColumnKind::Text)],
    },
    DimensionSpec {
        table: "dim_chapter",
        key: "id_chapter",
        columns: &[map("Chapter", "chapter", ColumnKind::Text)],
    },
    DimensionSpec {
        table: "dim_web",
        key: "id_web",
        columns: &[map("WEBURL", "weburl", ColumnKind::Text)],
    },
    DimensionSpec {
        table: "dim_date",
        key: "id_date",
        columns: &[map("Date", "date_event", ColumnKind::Date)],
    },
    DimensionSpec {
        table: "dim_acr",
        key: "id_acr",
        columns: &[
            map("ACR1", "acr1", ColumnKind::Numeric),
            map("ACR2", "acr2", ColumnKind::Numeric),
            map("ACR3", "acr3", ColumnKind::Numeric),
            map("ACR4", "acr4", ColumnKind::Numeric),
        ],
    },
    DimensionSpec {
        table: "dim_document",
        key: "id_document",
        columns: &[
            map(SOURCE_FILE_COLUMN, "source_file", ColumnKind::Text),
            map("Title", "title", ColumnKind::Text),
            map("Language", "language", ColumnKind::Text),
            map("Commentary", "commentary", ColumnKind::Text),
            map("ImageThumbnailID", "image_thumbnail_id", ColumnKind::Integer),
        ],
    },
];

const CONSULTATION_FACT: FactSpec = FactSpec {
    table: "fact_consultation",
    foreign_keys: &[
        "dim_patient",
        "dim_hospital",
        "dim_diagnosis",
        "dim_chapter",
        "dim_document",
        "dim_web",
        "dim_acr",
        "dim_date",
    ],
    metrics: &[
        map("ODislocation", "odislocation", ColumnKind::Integer),
        map("OPolytrauma", "opolytrauma", ColumnKind::Integer),
        map("OOpen", "oopen", ColumnKind::Integer),
        map("OPathologic", "opathologic", ColumnKind::Integer),
        map("OGraft", "ograft", ColumnKind::Integer),
        map("Order", "order_num", ColumnKind::Integer),
    ],
    creation: map("Creation", "creation", ColumnKind::Date),
    time_of_day: map("DateTime", "date_time", ColumnKind::Time),
};

impl StarSchema {
    /// The consultation star schema
    pub fn consultation() -> Self {
        Self {
            dimensions: CONSULTATION_DIMENSIONS,
            fact: CONSULTATION_FACT,
        }
    }

    /// Look up a dimension by table name
    pub fn dimension(&self, table: &str) -> Option<&'static DimensionSpec> {
        self.dimensions.iter().find(|d| d.table == table)
    }

    /// Every natural-key source column, deduplicated, in dimension order
    pub fn natural_key_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = Vec::new();
        for dim in self.dimensions {
            for source in dim.source_columns() {
                if !columns.contains(&source) {
                    columns.push(source);
                }
            }
        }
        columns
    }

    /// Fact table header: foreign keys, metrics, then the two temporal columns
    pub fn fact_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = self
            .fact
            .foreign_keys
            .iter()
            .filter_map(|t| self.dimension(t).map(|d| d.key))
            .collect();
        columns.extend(self.fact.metrics.iter().map(|m| m.output));
        columns.push(self.fact.creation.output);
        columns.push(self.fact.time_of_day.output);
        columns
    }
}

impl Default for StarSchema {
    fn default() -> Self {
        Self::consultation()
    }
}
