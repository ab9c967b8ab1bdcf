//! Pipeline orchestration tests

use std::fs;
use std::path::{Path, PathBuf};

use consultation_etl::model::{WIDE_TABLE_FILE, table_path};
use consultation_etl::pipeline::{
    CHECKPOINT_FILE, Checkpoint, PipelineConfig, PipelineError, PipelineExecutor, PipelineStage,
    PipelineStatus, run_pipeline,
};
use consultation_etl::table::WideTable;
use tempfile::TempDir;

/// Three consultation files under `<root>/xml`
fn fixture(root: &Path) -> PathBuf {
    let source = root.join("xml");
    fs::create_dir(&source).unwrap();
    fs::write(
        source.join("001.xml"),
        "<Case><Hospital>GH</Hospital><Department>Cardiology</Department>\
         <ACR>1,2</ACR><Date>12/03/2004</Date><Order>1</Order></Case>",
    )
    .unwrap();
    fs::write(
        source.join("002.xml"),
        "<Case><Hospital>GH</Hospital><Department>Cardiology</Department>\
         <Diagnosis>Fracture</Diagnosis></Case>",
    )
    .unwrap();
    fs::write(
        source.join("003.xml"),
        "<Case><Hospital>CHU</Hospital><WEBURL>http://example.org/3</WEBURL></Case>",
    )
    .unwrap();
    source
}

fn local_config(root: &Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_source_dir(fixture(root))
        .with_output_dir(root.join("processed"))
        .with_stages(vec![PipelineStage::Flatten, PipelineStage::Transform])
}

mod local_stages {
    use super::*;

    #[test]
    fn test_flatten_and_transform() {
        let temp = TempDir::new().unwrap();
        let config = local_config(temp.path());
        let output_dir = config.output_dir.clone();

        let report = run_pipeline(config).unwrap();
        assert!(report.is_success());
        assert_eq!(
            report.stages_completed,
            vec![PipelineStage::Flatten, PipelineStage::Transform]
        );

        let flatten = report.output(PipelineStage::Flatten).unwrap();
        assert_eq!(flatten.metadata["rows"], 3);
        assert_eq!(flatten.files, vec![output_dir.join(WIDE_TABLE_FILE)]);

        let transform = report.output(PipelineStage::Transform).unwrap();
        assert_eq!(transform.files.len(), 9);
        assert_eq!(transform.metadata["fact_rows"], 3);
        assert_eq!(transform.metadata["dimension_rows"]["dim_hospital"], 2);
        assert_eq!(transform.metadata["unmatched_keys"], 0);

        let fact = WideTable::read_csv(&table_path(&output_dir, "fact_consultation")).unwrap();
        assert_eq!(fact.len(), 3);

        let checkpoint = Checkpoint::load(&output_dir.join(CHECKPOINT_FILE)).unwrap();
        assert_eq!(checkpoint.status, PipelineStatus::Completed);
        assert_eq!(checkpoint.run_id, report.run_id);
    }

    #[test]
    fn test_missing_source_directory_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::new()
            .with_source_dir(temp.path().join("absent"))
            .with_output_dir(temp.path().join("processed"))
            .with_stages(vec![PipelineStage::Flatten, PipelineStage::Transform]);

        let report = run_pipeline(config).unwrap();
        assert!(report.is_success());
        assert_eq!(report.output(PipelineStage::Transform).unwrap().metadata["fact_rows"], 0);
    }

    #[test]
    fn test_transform_without_input_fails_the_stage() {
        let temp = TempDir::new().unwrap();
        let output_dir = temp.path().join("processed");
        let config = PipelineConfig::new()
            .with_output_dir(&output_dir)
            .with_stages(vec![PipelineStage::Transform]);

        let err = run_pipeline(config).unwrap_err();
        assert_eq!(err.stage_name(), Some("transform"));
        assert!(err.user_message().contains("Hint:"));

        let checkpoint = Checkpoint::load(&output_dir.join(CHECKPOINT_FILE)).unwrap();
        assert_eq!(checkpoint.status, PipelineStatus::Failed);
        assert!(checkpoint.error.is_some());
        assert!(!table_path(&output_dir, "dim_patient").exists());
    }

    #[test]
    fn test_completed_run_is_not_resumed() {
        let temp = TempDir::new().unwrap();
        let config = local_config(temp.path());
        run_pipeline(config.clone()).unwrap();

        let err = run_pipeline(config.clone().with_resume(true)).unwrap_err();
        assert!(matches!(err, PipelineError::ResumeError(_)));

        // Without --resume a fresh run starts over.
        let report = run_pipeline(config).unwrap();
        assert!(report.is_success());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let config = local_config(temp.path()).with_dry_run(true);
        let output_dir = config.output_dir.clone();

        let report = run_pipeline(config).unwrap();
        assert!(report.is_success());
        assert!(report.stages_completed.is_empty());
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_dry_run_reports_every_failing_stage() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::new()
            .with_output_dir(temp.path())
            .with_stages(vec![PipelineStage::Transform, PipelineStage::Load])
            .with_dry_run(true);

        match run_pipeline(config).unwrap_err() {
            PipelineError::Multiple(errors) => {
                let stages: Vec<_> = errors.iter().filter_map(|e| e.stage_name()).collect();
                assert_eq!(stages, vec!["transform", "load"]);
            }
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }
}

#[cfg(feature = "postgres")]
mod database_stages {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use consultation_etl::load::{
        BulkLoader, CopyPlan, DestinationTable, LoadResult, RecordingLoader,
    };

    fn full_config(root: &Path) -> PipelineConfig {
        local_config(root).with_stages(Vec::new())
    }

    #[test]
    fn test_full_run_loads_all_tables() {
        let temp = TempDir::new().unwrap();
        let mut executor = PipelineExecutor::new(full_config(temp.path()))
            .unwrap()
            .with_loader(Box::new(RecordingLoader::new()));

        let report = executor.run().unwrap();
        assert_eq!(report.stages_completed, PipelineStage::all());

        let load = report.output(PipelineStage::Load).unwrap();
        assert_eq!(load.files.len(), 9);
        assert_eq!(load.metadata["rows"]["fact_consultation"], 3);
        assert_eq!(load.metadata["rows"]["dim_hospital"], 2);
        assert_eq!(load.metadata["rows"]["dim_acr"], 2);

        let schema = report.output(PipelineStage::Schema).unwrap();
        assert_eq!(schema.metadata["tables"], 9);
    }

    /// Loader that logs DDL and copies, in order, into a shared journal
    struct JournalLoader {
        inner: RecordingLoader,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl JournalLoader {
        fn new(inner: RecordingLoader, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                inner,
                journal: Arc::clone(journal),
            }
        }
    }

    #[async_trait]
    impl BulkLoader for JournalLoader {
        async fn execute_ddl(&mut self, sql: &str) -> LoadResult<()> {
            self.journal.lock().unwrap().push("DDL".to_string());
            self.inner.execute_ddl(sql).await
        }

        async fn load(&mut self, plan: &CopyPlan) -> LoadResult<u64> {
            let rows = self.inner.load(plan).await?;
            self.journal
                .lock()
                .unwrap()
                .push(format!("COPY {}", plan.table.name()));
            Ok(rows)
        }
    }

    #[test]
    fn test_load_stage_alone_recreates_schema() {
        let temp = TempDir::new().unwrap();
        let config = local_config(temp.path());
        run_pipeline(config.clone()).unwrap();

        let journal = Arc::new(Mutex::new(Vec::new()));
        let config = config.with_stages(vec![PipelineStage::Load]);
        let mut executor = PipelineExecutor::new(config)
            .unwrap()
            .with_loader(Box::new(JournalLoader::new(RecordingLoader::new(), &journal)));

        let report = executor.run().unwrap();
        assert_eq!(
            report.stages_completed,
            vec![PipelineStage::Schema, PipelineStage::Load]
        );
        let journal = journal.lock().unwrap();
        assert_eq!(journal.first().map(String::as_str), Some("DDL"));
        assert_eq!(journal.len(), 1 + DestinationTable::all().len());
    }

    #[test]
    fn test_load_failure_then_resume() {
        let temp = TempDir::new().unwrap();
        let config = full_config(temp.path());
        let output_dir = config.output_dir.clone();
        let journal = Arc::new(Mutex::new(Vec::new()));

        let mut executor = PipelineExecutor::new(config.clone())
            .unwrap()
            .with_loader(Box::new(JournalLoader::new(
                RecordingLoader::new().failing_on(DestinationTable::DimAcr),
                &journal,
            )));
        let err = executor.run().unwrap_err();
        assert_eq!(err.stage_name(), Some("load"));
        assert!(err.to_string().contains("dim_acr"));

        let checkpoint = Checkpoint::load(&output_dir.join(CHECKPOINT_FILE)).unwrap();
        assert_eq!(checkpoint.status, PipelineStatus::Failed);
        assert_eq!(
            checkpoint.completed_stages,
            vec![
                PipelineStage::Flatten,
                PipelineStage::Transform,
                PipelineStage::Schema
            ]
        );
        // The first attempt committed every table but dim_acr.
        assert!(journal.lock().unwrap().contains(&"COPY dim_patient".to_string()));

        // Completed local stages are not repeated: the sources can be gone.
        fs::remove_dir_all(temp.path().join("xml")).unwrap();
        let first_attempt = journal.lock().unwrap().len();

        let mut executor = PipelineExecutor::new(config.with_resume(true))
            .unwrap()
            .with_loader(Box::new(JournalLoader::new(RecordingLoader::new(), &journal)));
        assert_eq!(executor.checkpoint().run_id, checkpoint.run_id);

        let report = executor.run().unwrap();
        assert!(report.is_success());
        assert_eq!(report.run_id, checkpoint.run_id);
        assert_eq!(report.stages_completed.len(), 4);

        // The schema is recreated before anything is loaded again, so every table
        // holds exactly one copy of its rows.
        let journal = journal.lock().unwrap();
        let resumed = &journal[first_attempt..];
        assert_eq!(resumed.first().map(String::as_str), Some("DDL"));
        let last_ddl = journal.iter().rposition(|e| e == "DDL").unwrap();
        for table in DestinationTable::all() {
            let copies = journal[last_ddl..]
                .iter()
                .filter(|e| **e == format!("COPY {}", table.name()))
                .count();
            assert_eq!(copies, 1, "{} loaded {} time(s)", table.name(), copies);
        }

        let wide = WideTable::read_csv(&output_dir.join(WIDE_TABLE_FILE)).unwrap();
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn test_resume_rejects_changed_configuration() {
        let temp = TempDir::new().unwrap();
        let config = full_config(temp.path());

        let mut executor = PipelineExecutor::new(config.clone())
            .unwrap()
            .with_loader(Box::new(
                RecordingLoader::new().failing_on(DestinationTable::FactConsultation),
            ));
        assert!(executor.run().is_err());

        let mut changed = config.with_resume(true);
        changed.cleaning.null_threshold = 1;
        assert!(matches!(
            PipelineExecutor::new(changed),
            Err(PipelineError::ResumeError(_))
        ));
    }

    #[test]
    fn test_fail_fast_stops_at_first_failed_table() {
        let temp = TempDir::new().unwrap();
        let mut executor = PipelineExecutor::new(full_config(temp.path()).with_fail_fast(true))
            .unwrap()
            .with_loader(Box::new(
                RecordingLoader::new()
                    .failing_on(DestinationTable::DimPatient)
                    .failing_on(DestinationTable::DimHospital),
            ));

        let err = executor.run().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("dim_patient"));
        assert!(!message.contains("dim_hospital"));
    }

    #[test]
    fn test_dry_run_accepts_injected_loader() {
        let temp = TempDir::new().unwrap();
        let mut executor = PipelineExecutor::new(full_config(temp.path()).with_dry_run(true))
            .unwrap()
            .with_loader(Box::new(RecordingLoader::new()));

        assert!(executor.run().unwrap().is_success());
    }
}
