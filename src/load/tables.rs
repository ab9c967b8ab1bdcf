//! Static catalogue of destination tables and their insertable columns

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LoadError;
use crate::table::ColumnKind;

/// A column of a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Dimension this column is a foreign key to
    pub references: Option<DestinationTable>,
}

const fn col(name: &'static str, kind: ColumnKind) -> DestinationColumn {
    DestinationColumn {
        name,
        kind,
        references: None,
    }
}

const fn fk(name: &'static str, table: DestinationTable) -> DestinationColumn {
    DestinationColumn {
        name,
        kind: ColumnKind::Integer,
        references: Some(table),
    }
}

/// The nine destination tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationTable {
    DimPatient,
    DimHospital,
    DimDiagnosis,
    DimChapter,
    DimWeb,
    DimAcr,
    DimDocument,
    DimDate,
    FactConsultation,
}

const PATIENT_COLUMNS: &[DestinationColumn] = &[
    col("description_patient", ColumnKind::Text),
    col("clinical_presentation", ColumnKind::Text),
    col("birthdate", ColumnKind::Date),
    col("age", ColumnKind::Integer),
];

const HOSPITAL_COLUMNS: &[DestinationColumn] = &[
    col("hospital", ColumnKind::Text),
    col("department", ColumnKind::Text),
];

const DIAGNOSIS_COLUMNS: &[DestinationColumn] = &[col("diagnosis", ColumnKind::Text)];

const CHAPTER_COLUMNS: &[DestinationColumn] = &[col("chapter", ColumnKind::Text)];

const WEB_COLUMNS: &[DestinationColumn] = &[col("weburl", ColumnKind::Text)];

const ACR_COLUMNS: &[DestinationColumn] = &[
    col("acr1", ColumnKind::Numeric),
    col("acr2", ColumnKind::Numeric),
    col("acr3", ColumnKind::Numeric),
    col("acr4", ColumnKind::Numeric),
];

const DOCUMENT_COLUMNS: &[DestinationColumn] = &[
    col("source_file", ColumnKind::Text),
    col("title", ColumnKind::Text),
    col("language", ColumnKind::Text),
    col("commentary", ColumnKind::Text),
    col("image_thumbnail_id", ColumnKind::Integer),
];

const DATE_COLUMNS: &[DestinationColumn] = &[col("date_event", ColumnKind::Date)];

const FACT_COLUMNS: &[DestinationColumn] = &[
    fk("id_patient", DestinationTable::DimPatient),
    fk("id_hospital", DestinationTable::DimHospital),
    fk("id_diagnosis", DestinationTable::DimDiagnosis),
    fk("id_chapter", DestinationTable::DimChapter),
    fk("id_document", DestinationTable::DimDocument),
    fk("id_web", DestinationTable::DimWeb),
    fk("id_acr", DestinationTable::DimAcr),
    fk("id_date", DestinationTable::DimDate),
    col("odislocation", ColumnKind::Integer),
    col("opolytrauma", ColumnKind::Integer),
    col("oopen", ColumnKind::Integer),
    col("opathologic", ColumnKind::Integer),
    col("ograft", ColumnKind::Integer),
    col("order_num", ColumnKind::Integer),
    col("creation", ColumnKind::Date),
    col("date_time", ColumnKind::Time),
];

impl DestinationTable {
    /// All tables, dimensions first and the fact table last
    pub fn all() -> &'static [DestinationTable] {
        &[
            Self::DimPatient,
            Self::DimHospital,
            Self::DimDiagnosis,
            Self::DimChapter,
            Self::DimWeb,
            Self::DimAcr,
            Self::DimDocument,
            Self::DimDate,
            Self::FactConsultation,
        ]
    }

    /// Table name in the destination store
    pub fn name(&self) -> &'static str {
        match self {
            Self::DimPatient => "dim_patient",
            Self::DimHospital => "dim_hospital",
            Self::DimDiagnosis => "dim_diagnosis",
            Self::DimChapter => "dim_chapter",
            Self::DimWeb => "dim_web",
            Self::DimAcr => "dim_acr",
            Self::DimDocument => "dim_document",
            Self::DimDate => "dim_date",
            Self::FactConsultation => "fact_consultation",
        }
    }

    /// Insertable columns in file order
    ///
    /// Dimension surrogate keys are generated by the store and not listed; the fact
    /// table lists its foreign keys.
    pub fn columns(&self) -> &'static [DestinationColumn] {
        match self {
            Self::DimPatient => PATIENT_COLUMNS,
            Self::DimHospital => HOSPITAL_COLUMNS,
            Self::DimDiagnosis => DIAGNOSIS_COLUMNS,
            Self::DimChapter => CHAPTER_COLUMNS,
            Self::DimWeb => WEB_COLUMNS,
            Self::DimAcr => ACR_COLUMNS,
            Self::DimDocument => DOCUMENT_COLUMNS,
            Self::DimDate => DATE_COLUMNS,
            Self::FactConsultation => FACT_COLUMNS,
        }
    }

    /// Column names in file order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.name).collect()
    }

    /// Auto-generated primary key
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::DimPatient => "id_patient",
            Self::DimHospital => "id_hospital",
            Self::DimDiagnosis => "id_diagnosis",
            Self::DimChapter => "id_chapter",
            Self::DimWeb => "id_web",
            Self::DimAcr => "id_acr",
            Self::DimDocument => "id_document",
            Self::DimDate => "id_date",
            Self::FactConsultation => "id_fact",
        }
    }

    /// True for the fact table
    pub fn is_fact(&self) -> bool {
        matches!(self, Self::FactConsultation)
    }
}

impl fmt::Display for DestinationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DestinationTable {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| LoadError::UnsupportedTable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_round_trip() {
        for table in DestinationTable::all() {
            assert_eq!(table.name().parse::<DestinationTable>().unwrap(), *table);
        }
        assert!(matches!(
            "dim_unknown".parse::<DestinationTable>(),
            Err(LoadError::UnsupportedTable(_))
        ));
    }

    #[test]
    fn test_fact_is_last_and_references_every_dimension() {
        let all = DestinationTable::all();
        assert_eq!(all.len(), 9);
        assert_eq!(all.last(), Some(&DestinationTable::FactConsultation));

        let referenced: Vec<DestinationTable> = DestinationTable::FactConsultation
            .columns()
            .iter()
            .filter_map(|c| c.references)
            .collect();
        assert_eq!(referenced.len(), 8);
        for dim in &all[..8] {
            assert!(referenced.contains(dim), "{dim}");
            assert!(!dim.columns().iter().any(|c| c.name == dim.key_column()));
        }
    }

    #[test]
    fn test_document_columns() {
        assert_eq!(
            DestinationTable::DimDocument.column_names(),
            vec!["source_file", "title", "language", "commentary", "image_thumbnail_id"]
        );
    }
}
