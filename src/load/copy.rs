//! Validated bulk-copy plans

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::error::{LoadError, LoadResult};
use super::tables::DestinationTable;
use crate::table::ColumnKind;

/// A table load that passed its preconditions
///
/// Building a plan checks, in order, that the table name is known, that its file
/// exists and that the file's header matches the destination columns exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    pub table: DestinationTable,
    pub path: PathBuf,
}

impl CopyPlan {
    /// Validate a load request
    pub fn prepare(table_name: &str, path: &Path) -> LoadResult<Self> {
        let table: DestinationTable = table_name.parse()?;

        if !path.is_file() {
            return Err(LoadError::FileNotFound {
                table: table.name().to_string(),
                path: path.to_path_buf(),
            });
        }

        let found = read_header(path)?;
        let expected = table.column_names();
        if found != expected {
            return Err(LoadError::HeaderMismatch {
                table: table.name().to_string(),
                path: path.to_path_buf(),
                expected: expected.into_iter().map(String::from).collect(),
                found,
            });
        }

        Ok(Self {
            table,
            path: path.to_path_buf(),
        })
    }

    /// `COPY ... FROM STDIN` statement for this table
    ///
    /// The file has a header row, comma delimiter and double-quote quoting and
    /// escaping; an empty field is null. Typed columns also treat a quoted empty
    /// field as null, which is how a single-column row with a null is written.
    pub fn statement(&self) -> String {
        let columns = self.table.column_names().join(", ");
        let force_null: Vec<&str> = self
            .table
            .columns()
            .iter()
            .filter(|c| c.kind != ColumnKind::Text)
            .map(|c| c.name)
            .collect();

        let mut options = vec![
            "FORMAT csv".to_string(),
            "HEADER true".to_string(),
            "DELIMITER ','".to_string(),
            "NULL ''".to_string(),
            "QUOTE '\"'".to_string(),
            "ESCAPE '\"'".to_string(),
            "ENCODING 'UTF8'".to_string(),
        ];
        if !force_null.is_empty() {
            options.push(format!("FORCE_NULL ({})", force_null.join(", ")));
        }

        format!(
            "COPY {} ({}) FROM STDIN WITH ({})",
            self.table.name(),
            columns,
            options.join(", ")
        )
    }
}

/// Header row of a CSV file, BOM stripped
fn read_header(path: &Path) -> LoadResult<Vec<String>> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(BufReader::new(file));

    let mut record = csv::StringRecord::new();
    let has_row = reader.read_record(&mut record).map_err(|e| {
        LoadError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    if !has_row {
        return Ok(Vec::new());
    }

    Ok(record
        .iter()
        .map(|h| h.trim_matches('\u{feff}').to_string())
        .collect())
}

/// Number of data lines in a file, header excluded
pub(crate) fn count_data_rows(path: &Path) -> LoadResult<u64> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);
    let mut rows = 0u64;
    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => rows += 1,
            Ok(false) => break,
            Err(e) => {
                return Err(LoadError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                ));
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_checks_preconditions_in_order() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("dim_web.csv");

        assert!(matches!(
            CopyPlan::prepare("dim_nope", &missing),
            Err(LoadError::UnsupportedTable(_))
        ));
        assert!(matches!(
            CopyPlan::prepare("dim_web", &missing),
            Err(LoadError::FileNotFound { .. })
        ));

        fs::write(&missing, "url\nhttp://x\n").unwrap();
        assert!(matches!(
            CopyPlan::prepare("dim_web", &missing),
            Err(LoadError::HeaderMismatch { .. })
        ));

        fs::write(&missing, "weburl\nhttp://x\n").unwrap();
        let plan = CopyPlan::prepare("dim_web", &missing).unwrap();
        assert_eq!(plan.table, DestinationTable::DimWeb);
        assert_eq!(count_data_rows(&missing).unwrap(), 1);
    }

    #[test]
    fn test_statement() {
        let plan = CopyPlan {
            table: DestinationTable::DimDate,
            path: PathBuf::from("dim_date.csv"),
        };
        assert_eq!(
            plan.statement(),
            "COPY dim_date (date_event) FROM STDIN WITH (FORMAT csv, HEADER true, DELIMITER ',', \
             NULL '', QUOTE '\"', ESCAPE '\"', ENCODING 'UTF8', FORCE_NULL (date_event))"
        );

        let plan = CopyPlan {
            table: DestinationTable::DimHospital,
            path: PathBuf::from("dim_hospital.csv"),
        };
        assert!(!plan.statement().contains("FORCE_NULL"));
    }

    #[test]
    fn test_count_rows_with_embedded_newlines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dim_chapter.csv");
        fs::write(&path, "chapter\n\"multi\nline\"\nsecond\n").unwrap();
        assert_eq!(count_data_rows(&path).unwrap(), 2);
    }
}
