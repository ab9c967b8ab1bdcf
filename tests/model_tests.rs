//! Dimensional transform tests

use std::collections::HashSet;
use std::fs;

use consultation_etl::model::{
    CleaningConfig, StarSchema, StarTables, WIDE_TABLE_FILE, clean, table_path, transform,
    transform_file,
};
use consultation_etl::table::{RawRecord, SOURCE_FILE_COLUMN, WideTable};
use tempfile::TempDir;

const SENTINEL: &str = "Non précisé";

fn consultation(file: &str) -> RawRecord {
    RawRecord::new().with_field(SOURCE_FILE_COLUMN, file)
}

fn sample_table() -> WideTable {
    WideTable::from_records(&[
        consultation("001.xml")
            .with_field("Hospital", "GH")
            .with_field("Department", "Cardiology")
            .with_field("Diagnosis", "Fracture")
            .with_field("Chapter", "Trauma")
            .with_field("ACR", "1,2.50,x")
            .with_field("Date", "12/03/2004")
            .with_field("Age", "40")
            .with_field("OGraft", "3")
            .with_field("Order", "2.9")
            .with_field("Creation", "01/05/2010")
            .with_field("DateTime", "2010-05-01 08:15:00"),
        consultation("002.xml")
            .with_field("Hospital", "GH")
            .with_field("Department", "Cardiology")
            .with_field("Diagnosis", "Fracture")
            .with_field("ACR", "1,2.5")
            .with_field("Date", "2004-03-12")
            .with_field("OGraft", "abc"),
        consultation("003.xml")
            .with_field("Hospital", "GH")
            .with_field("Department", "Neurology")
            .with_field("WEBURL", "http://example.org/case/3")
            .with_field("Date", "not a date")
            .with_field("OOperation", "surgery"),
    ])
}

fn build(table: &mut WideTable) -> StarTables {
    let (star, _) =
        transform(table, &CleaningConfig::default(), &StarSchema::consultation()).unwrap();
    star
}

mod star_schema_tests {
    use super::*;

    #[test]
    fn test_surrogate_keys_are_dense_and_natural_keys_unique() {
        let mut table = sample_table();
        let star = build(&mut table);

        assert_eq!(star.dimensions.len(), 8);
        for dim in &star.dimensions {
            let ids: Vec<i64> = dim.rows().map(|(id, _)| id).collect();
            let expected: Vec<i64> = (1..=dim.len() as i64).collect();
            assert_eq!(ids, expected, "{}", dim.name());

            let keys: HashSet<Vec<String>> = dim.rows().map(|(_, k)| k.parts().to_vec()).collect();
            assert_eq!(keys.len(), dim.len(), "{}", dim.name());
            assert!(
                dim.rows().all(|(_, k)| k.parts().iter().all(|p| !p.is_empty())),
                "{}",
                dim.name()
            );
        }
    }

    #[test]
    fn test_every_fact_key_resolves_to_its_row() {
        let mut table = sample_table();
        let star = build(&mut table);
        let schema = StarSchema::consultation();

        assert_eq!(star.fact.len(), 3);
        assert_eq!(star.fact.unmatched_keys(), 0);

        for (i, row) in star.fact.rows().iter().enumerate() {
            for (dim_name, key) in schema.fact.foreign_keys.iter().zip(&row.keys) {
                let dim = star.dimension(dim_name).unwrap();
                let id = key.expect("every key resolves");
                let natural = dim.lookup(id).unwrap();
                let expected: Vec<String> = dim
                    .spec()
                    .columns
                    .iter()
                    .map(|c| {
                        c.kind
                            .render(table.value(i, c.source).map(str::trim))
                            .unwrap_or_else(|| SENTINEL.to_string())
                    })
                    .collect();
                assert_eq!(natural.parts(), expected.as_slice(), "{dim_name} row {i}");
            }
        }
    }

    #[test]
    fn test_hospital_duplicates_share_a_key() {
        let mut table = sample_table();
        let star = build(&mut table);

        let hospital = star.dimension("dim_hospital").unwrap();
        assert_eq!(hospital.len(), 2);
        let rows: Vec<Vec<String>> = hospital.rows().map(|(_, k)| k.parts().to_vec()).collect();
        assert_eq!(rows[0], vec!["GH", "Cardiology"]);
        assert_eq!(rows[1], vec!["GH", "Neurology"]);

        let hospital_keys: Vec<Option<i64>> =
            star.fact.rows().iter().map(|r| r.keys[1]).collect();
        assert_eq!(hospital_keys, vec![Some(1), Some(1), Some(2)]);
    }

    #[test]
    fn test_acr_split_into_canonical_parts() {
        let mut table = sample_table();
        let star = build(&mut table);

        assert!(!table.has_column("ACR"));
        let acr = star.dimension("dim_acr").unwrap();
        let rows: Vec<Vec<String>> = acr.rows().map(|(_, k)| k.parts().to_vec()).collect();
        assert_eq!(
            rows,
            vec![
                vec!["1", "2.5", "0", "0"],
                vec!["0", "0", "0", "0"],
            ]
        );
    }

    #[test]
    fn test_absent_acr_yields_single_zero_row() {
        let mut table = WideTable::from_records(&[
            consultation("a.xml").with_field("Hospital", "GH"),
            consultation("b.xml").with_field("Hospital", "CHU"),
        ]);
        let star = build(&mut table);

        let acr = star.dimension("dim_acr").unwrap();
        assert_eq!(acr.len(), 1);
        assert_eq!(acr.lookup(1).unwrap().parts(), &["0", "0", "0", "0"]);
        assert!(star.fact.rows().iter().all(|r| r.keys[6] == Some(1)));
    }

    #[test]
    fn test_metrics_and_temporal_columns() {
        let mut table = sample_table();
        let star = build(&mut table);
        let rows = star.fact.rows();

        // odislocation, opolytrauma, oopen, opathologic, ograft, order_num
        assert_eq!(rows[0].metrics, vec![0, 0, 0, 0, 3, 2]);
        assert_eq!(rows[1].metrics, vec![0, 0, 0, 0, 0, 0]);

        assert_eq!(
            rows[0].creation.map(|d| d.to_string()),
            Some("2010-05-01".to_string())
        );
        assert_eq!(
            rows[0].time_of_day.map(|t| t.to_string()),
            Some("08:15:00".to_string())
        );
        assert!(rows[1].creation.is_none());
        assert!(rows[2].time_of_day.is_none());
    }

    #[test]
    fn test_day_first_dates_collapse_with_iso_dates() {
        let mut table = sample_table();
        let star = build(&mut table);

        let dates = star.dimension("dim_date").unwrap();
        let rows: Vec<Vec<String>> = dates.rows().map(|(_, k)| k.parts().to_vec()).collect();
        assert_eq!(rows, vec![vec!["2004-03-12"], vec![SENTINEL]]);
    }
}

mod cleaning_tests {
    use super::*;

    #[test]
    fn test_sparse_columns_use_a_strict_threshold() {
        let mut records = Vec::new();
        for i in 0..802 {
            let mut record = consultation(&format!("{i:04}.xml"));
            if i == 0 {
                record = record.with_field("Extra", "x");
            }
            if i < 2 {
                record = record.with_field("Kept", "y");
            }
            records.push(record);
        }
        let mut table = WideTable::from_records(&records);
        assert_eq!(table.null_count("Extra"), 801);
        assert_eq!(table.null_count("Kept"), 800);

        let report = clean(&mut table, &CleaningConfig::default()).unwrap();
        assert_eq!(report.dropped_sparse, vec!["Extra".to_string()]);
        assert!(!table.has_column("Extra"));
        assert!(table.has_column("Kept"));
    }

    #[test]
    fn test_operation_column_is_always_dropped() {
        let mut table = sample_table();
        let report = clean(&mut table, &CleaningConfig::default()).unwrap();
        assert!(!table.has_column("OOperation"));
        assert_eq!(report.dropped_irrelevant, vec!["OOperation".to_string()]);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let config = CleaningConfig::default();
        let mut table = sample_table();
        clean(&mut table, &config).unwrap();
        let once = table.clone();

        let report = clean(&mut table, &config).unwrap();
        assert!(report.is_noop(), "{report:?}");
        assert_eq!(table, once);
    }

    #[test]
    fn test_defaults_are_filled() {
        let mut table = sample_table();
        clean(&mut table, &CleaningConfig::default()).unwrap();

        assert_eq!(table.value(2, "Diagnosis"), Some(SENTINEL));
        assert_eq!(table.value(0, "Language"), Some(SENTINEL));
        assert_eq!(table.value(2, "Age"), Some("0"));
        assert_eq!(table.value(0, "OPolytrauma"), Some("0"));
        assert_eq!(table.value(0, "Date"), Some("2004-03-12"));
        assert_eq!(table.value(2, "Date"), None);
        assert_eq!(table.value(0, "DateTime"), Some("2010-05-01 08:15:00"));
    }
}

mod export_tests {
    use super::*;

    #[test]
    fn test_transform_file_writes_nine_tables() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join(WIDE_TABLE_FILE);
        sample_table().write_csv(&input).unwrap();

        let report = transform_file(
            &input,
            dir.path(),
            &CleaningConfig::default(),
            &StarSchema::consultation(),
        )
        .unwrap();

        assert_eq!(report.input_rows, 3);
        assert_eq!(report.fact_rows, 3);
        assert_eq!(report.outputs.len(), 9);
        assert_eq!(report.unmatched_keys, 0);

        let dates = fs::read_to_string(table_path(dir.path(), "dim_date")).unwrap();
        let lines: Vec<&str> = dates.lines().collect();
        assert_eq!(lines, vec!["date_event", "2004-03-12", "\"\""]);

        let hospitals = WideTable::read_csv(&table_path(dir.path(), "dim_hospital")).unwrap();
        assert_eq!(hospitals.columns(), &["hospital", "department"]);
        assert_eq!(hospitals.len(), 2);

        let fact = WideTable::read_csv(&table_path(dir.path(), "fact_consultation")).unwrap();
        assert_eq!(fact.columns().len(), 16);
        assert_eq!(fact.value(0, "id_hospital"), Some("1"));
        assert_eq!(fact.value(2, "id_hospital"), Some("2"));
        assert_eq!(fact.value(0, "order_num"), Some("2"));
        assert_eq!(fact.value(0, "creation"), Some("2010-05-01"));
        assert_eq!(fact.value(1, "date_time"), None);
    }

    #[test]
    fn test_equal_typed_keys_export_once() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join(WIDE_TABLE_FILE);
        WideTable::from_records(&[
            consultation("a.xml")
                .with_field("Description", "Fall")
                .with_field("Age", "40")
                .with_field("ImageThumbnailID", "12"),
            consultation("a.xml")
                .with_field("Description", "Fall")
                .with_field("Age", "40.0")
                .with_field("ImageThumbnailID", "012"),
        ])
        .write_csv(&input)
        .unwrap();

        transform_file(
            &input,
            dir.path(),
            &CleaningConfig::default(),
            &StarSchema::consultation(),
        )
        .unwrap();

        let patients = WideTable::read_csv(&table_path(dir.path(), "dim_patient")).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients.value(0, "age"), Some("40"));

        let documents = WideTable::read_csv(&table_path(dir.path(), "dim_document")).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents.value(0, "image_thumbnail_id"), Some("12"));

        let fact = WideTable::read_csv(&table_path(dir.path(), "fact_consultation")).unwrap();
        assert_eq!(fact.value(0, "id_patient"), Some("1"));
        assert_eq!(fact.value(1, "id_patient"), Some("1"));
        assert_eq!(fact.value(1, "id_document"), Some("1"));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join(WIDE_TABLE_FILE);
        sample_table().write_csv(&input).unwrap();

        let first = dir.path().join("first");
        let second = dir.path().join("second");
        for out in [&first, &second] {
            transform_file(
                &input,
                out,
                &CleaningConfig::default(),
                &StarSchema::consultation(),
            )
            .unwrap();
        }

        for dim in StarSchema::consultation().dimensions {
            assert_eq!(
                fs::read(table_path(&first, dim.table)).unwrap(),
                fs::read(table_path(&second, dim.table)).unwrap(),
                "{}",
                dim.table
            );
        }
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let result = transform_file(
            &dir.path().join(WIDE_TABLE_FILE),
            &out,
            &CleaningConfig::default(),
            &StarSchema::consultation(),
        );
        assert!(result.is_err());
        assert!(!out.exists());
    }
}
