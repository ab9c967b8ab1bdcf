//! Pipeline executor for running the ETL stages in order

use std::collections::HashMap;
use std::time::Instant;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::checkpoint::{Checkpoint, PipelineStatus, StageOutput};
use super::config::{PipelineConfig, PipelineStage};
use super::error::{PipelineError, PipelineResult};
use crate::flatten::{self, FlattenOptions};
use crate::load::{CopyPlan, DestinationTable};
use crate::model::{self, StarSchema, table_path};

#[cfg(feature = "postgres")]
use crate::load::{BulkLoader, PostgresLoader, load_all, schema};

/// Pipeline executor that runs all stages
pub struct PipelineExecutor {
    config: PipelineConfig,
    checkpoint: Checkpoint,
    #[cfg(feature = "postgres")]
    runtime: Option<tokio::runtime::Runtime>,
    #[cfg(feature = "postgres")]
    loader: Option<Box<dyn BulkLoader>>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::ConfigError)?;

        let config_hash = Self::hash_config(&config);
        let run_id = Uuid::new_v4().to_string();

        let checkpoint = if config.resume {
            Self::load_or_create_checkpoint(&config, &run_id, &config_hash)?
        } else {
            Checkpoint::new(&run_id, &config_hash)
        };
        let checkpoint = match &config.name {
            Some(name) if checkpoint.name.is_none() => checkpoint.with_name(name),
            _ => checkpoint,
        };

        Ok(Self {
            config,
            checkpoint,
            #[cfg(feature = "postgres")]
            runtime: None,
            #[cfg(feature = "postgres")]
            loader: None,
        })
    }

    /// Use the given loader for the schema and load stages instead of connecting
    /// to `database_url`
    #[cfg(feature = "postgres")]
    pub fn with_loader(mut self, loader: Box<dyn BulkLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Get the current checkpoint
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline
    pub fn run(&mut self) -> PipelineResult<PipelineReport> {
        let _span = info_span!(
            "pipeline_run",
            run_id = %self.checkpoint.run_id,
            dry_run = self.config.dry_run
        )
        .entered();

        let start = Instant::now();
        let stages = self.config.effective_stages();

        info!(
            run_id = %self.checkpoint.run_id,
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            dry_run = self.config.dry_run,
            "Starting pipeline"
        );

        if self.config.verbose {
            eprintln!("Pipeline run: {}", self.checkpoint.run_id);
            eprintln!(
                "Stages to run: {:?}",
                stages.iter().map(|s| s.name()).collect::<Vec<_>>()
            );
            if self.config.dry_run {
                eprintln!("DRY RUN MODE - no changes will be made");
            }
        }

        if self.config.dry_run {
            return self.dry_run(&stages);
        }

        for stage in &stages {
            if self.checkpoint.is_stage_completed(*stage) && !self.must_rerun(*stage, &stages) {
                debug!(stage = stage.name(), "Stage already completed, skipping");
                if self.config.verbose {
                    eprintln!("Stage {} already completed, skipping", stage.name());
                }
                continue;
            }

            let _stage_span = info_span!("pipeline_stage", stage = stage.name()).entered();
            info!(stage = stage.name(), "Starting stage: {}", stage.description());
            if self.config.verbose {
                eprintln!("Running stage {}...", stage.name());
            }

            self.checkpoint.start_stage(*stage);
            self.save_checkpoint()?;

            match self.run_stage(*stage) {
                Ok(output) => {
                    info!(
                        stage = stage.name(),
                        duration_ms = output.duration_ms,
                        "Stage completed"
                    );
                    if self.config.verbose {
                        eprintln!(
                            "Stage {} completed in {}ms",
                            stage.name(),
                            output.duration_ms
                        );
                    }
                    self.checkpoint.complete_stage(*stage, output);
                    self.save_checkpoint()?;
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    error!(stage = stage.name(), error = %error_msg, "Stage failed");
                    self.checkpoint.fail_stage(*stage, &error_msg);
                    self.save_checkpoint()?;
                    return Err(PipelineError::stage_failure(stage.name(), e));
                }
            }
        }

        self.checkpoint.complete();
        self.save_checkpoint()?;

        let duration = start.elapsed();
        info!(
            run_id = %self.checkpoint.run_id,
            duration_ms = duration.as_millis() as u64,
            stages_completed = self.checkpoint.completed_stages.len(),
            "Pipeline completed"
        );

        Ok(PipelineReport {
            run_id: self.checkpoint.run_id.clone(),
            status: self.checkpoint.status,
            stages_completed: self.checkpoint.completed_stages.clone(),
            duration_ms: duration.as_millis() as u64,
            outputs: self.checkpoint.stage_outputs.clone(),
        })
    }

    /// Run a single stage
    fn run_stage(&mut self, stage: PipelineStage) -> PipelineResult<StageOutput> {
        let start = Instant::now();

        let output = match stage {
            PipelineStage::Flatten => self.run_flatten()?,
            PipelineStage::Transform => self.run_transform()?,
            PipelineStage::Schema => self.run_schema()?,
            PipelineStage::Load => self.run_load()?,
        };

        Ok(output.with_duration(start.elapsed().as_millis() as u64))
    }

    /// Run the flatten stage
    fn run_flatten(&self) -> PipelineResult<StageOutput> {
        let options = FlattenOptions::new(self.config.source_dir.clone())
            .with_pattern(self.config.pattern.clone())
            .with_progress(self.config.progress);
        let path = self.config.wide_table_path();

        let stats = flatten::run_flatten(&options, &path)?;
        if self.config.verbose {
            eprintln!(
                "  Flattened {} of {} file(s) into {} row(s)",
                stats.files_parsed, stats.files_discovered, stats.rows
            );
        }

        Ok(StageOutput::success()
            .with_file(path)
            .with_metadata("source", json!(self.config.source_dir.display().to_string()))
            .with_metadata("files_discovered", json!(stats.files_discovered))
            .with_metadata("files_skipped", json!(stats.files_skipped))
            .with_metadata("rows", json!(stats.rows))
            .with_metadata("columns", json!(stats.columns)))
    }

    /// Run the transform stage
    fn run_transform(&self) -> PipelineResult<StageOutput> {
        let report = model::transform_file(
            &self.config.wide_table_path(),
            &self.config.output_dir,
            &self.config.cleaning,
            &StarSchema::consultation(),
        )?;

        let dimension_rows: serde_json::Map<String, serde_json::Value> = report
            .dimension_rows
            .iter()
            .map(|(table, rows)| (table.clone(), json!(rows)))
            .collect();

        Ok(StageOutput::success()
            .with_files(report.outputs.iter().map(|o| o.path.clone()).collect())
            .with_metadata("input_rows", json!(report.input_rows))
            .with_metadata("fact_rows", json!(report.fact_rows))
            .with_metadata("dimension_rows", serde_json::Value::Object(dimension_rows))
            .with_metadata("unmatched_keys", json!(report.unmatched_keys))
            .with_metadata("dropped_columns", json!(report.cleaning.dropped_sparse)))
    }

    /// Run the schema stage
    #[cfg(feature = "postgres")]
    fn run_schema(&mut self) -> PipelineResult<StageOutput> {
        let ddl = schema::create_schema();
        let (runtime, loader) = self.destination()?;
        runtime.block_on(loader.execute_ddl(&ddl))?;

        Ok(StageOutput::success().with_metadata("tables", json!(DestinationTable::all().len())))
    }

    /// Run the load stage
    #[cfg(feature = "postgres")]
    fn run_load(&mut self) -> PipelineResult<StageOutput> {
        let output_dir = self.config.output_dir.clone();
        let tables = self.config.effective_tables();
        let fail_fast = self.config.fail_fast;

        let (runtime, loader) = self.destination()?;
        let report = runtime.block_on(load_all(loader, &output_dir, &tables, fail_fast));

        if !report.skipped.is_empty() {
            warn!(
                "Not loaded after a failure: {}",
                report
                    .skipped
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let loaded: serde_json::Map<String, serde_json::Value> = report
            .loaded()
            .into_iter()
            .map(|(table, rows)| (table.name().to_string(), json!(rows)))
            .collect();
        let total_rows = report.total_rows();
        let files: Vec<_> = report
            .loaded()
            .into_iter()
            .map(|(table, _)| table_path(&output_dir, table.name()))
            .collect();

        if let Some(err) = PipelineError::from_errors(
            report
                .into_errors()
                .into_iter()
                .map(PipelineError::Load)
                .collect(),
        ) {
            return Err(err);
        }

        Ok(StageOutput::success()
            .with_files(files)
            .with_metadata("rows", serde_json::Value::Object(loaded))
            .with_metadata("total_rows", json!(total_rows)))
    }

    #[cfg(not(feature = "postgres"))]
    fn run_schema(&mut self) -> PipelineResult<StageOutput> {
        Err(Self::database_unsupported())
    }

    #[cfg(not(feature = "postgres"))]
    fn run_load(&mut self) -> PipelineResult<StageOutput> {
        Err(Self::database_unsupported())
    }

    #[cfg(not(feature = "postgres"))]
    fn database_unsupported() -> PipelineError {
        PipelineError::ConfigError(
            "schema and load stages need the `postgres` feature".to_string(),
        )
    }

    /// Runtime and loader for the database stages, connecting on first use
    #[cfg(feature = "postgres")]
    fn destination(
        &mut self,
    ) -> PipelineResult<(&tokio::runtime::Runtime, &mut (dyn BulkLoader + 'static))> {
        let runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| PipelineError::ConfigError(format!("cannot start runtime: {e}")))?,
        };
        let runtime = self.runtime.insert(runtime);

        if self.loader.is_none() {
            let url = self
                .config
                .database_url
                .as_deref()
                .ok_or_else(|| PipelineError::MissingInput("database URL".to_string()))?;
            let loader = runtime.block_on(PostgresLoader::connect(url))?;
            info!("Connected to destination database");
            self.loader = Some(Box::new(loader));
        }

        let loader = self
            .loader
            .as_deref_mut()
            .ok_or_else(|| PipelineError::MissingInput("database connection".to_string()))?;
        Ok((runtime, loader))
    }

    fn has_destination(&self) -> bool {
        #[cfg(feature = "postgres")]
        let injected = self.loader.is_some();
        #[cfg(not(feature = "postgres"))]
        let injected = false;
        injected || self.config.database_url.is_some()
    }

    /// Whether a completed stage has to run again in this run
    ///
    /// A pending load needs empty tables, so the schema is recreated before it even
    /// when an earlier attempt already did so.
    fn must_rerun(&self, stage: PipelineStage, stages: &[PipelineStage]) -> bool {
        stage == PipelineStage::Schema
            && stages.contains(&PipelineStage::Load)
            && !self.checkpoint.is_stage_completed(PipelineStage::Load)
    }

    /// Run in dry-run mode (validation only)
    fn dry_run(&self, stages: &[PipelineStage]) -> PipelineResult<PipelineReport> {
        let mut errors = Vec::new();

        for stage in stages {
            if let Err(e) = self.validate_stage(*stage, stages) {
                warn!(stage = stage.name(), "Validation failed: {}", e);
                errors.push(PipelineError::stage_failure(stage.name(), e));
            }
        }

        if let Some(err) = PipelineError::from_errors(errors) {
            return Err(err);
        }

        info!("Dry run validation passed for all stages");

        Ok(PipelineReport {
            run_id: self.checkpoint.run_id.clone(),
            status: PipelineStatus::Completed,
            stages_completed: Vec::new(),
            duration_ms: 0,
            outputs: HashMap::new(),
        })
    }

    /// Validate a stage's inputs
    ///
    /// Inputs produced by an earlier stage of the same run are not checked.
    fn validate_stage(&self, stage: PipelineStage, stages: &[PipelineStage]) -> PipelineResult<()> {
        match stage {
            PipelineStage::Flatten => {
                glob::Pattern::new(&self.config.pattern).map_err(|e| {
                    PipelineError::ConfigError(format!("pattern '{}': {}", self.config.pattern, e))
                })?;
                if !self.config.source_dir.is_dir() {
                    warn!(
                        source = %self.config.source_dir.display(),
                        "Source directory not found; flattening would produce an empty table"
                    );
                }
            }
            PipelineStage::Transform => {
                let input = self.config.wide_table_path();
                if !stages.contains(&PipelineStage::Flatten) && !input.is_file() {
                    return Err(PipelineError::FileNotFound(input));
                }
            }
            PipelineStage::Schema => {
                if !self.has_destination() {
                    return Err(PipelineError::MissingInput("database URL".to_string()));
                }
            }
            PipelineStage::Load => {
                if !self.has_destination() {
                    return Err(PipelineError::MissingInput("database URL".to_string()));
                }
                if !stages.contains(&PipelineStage::Transform) {
                    let errors: Vec<PipelineError> = self
                        .config
                        .effective_tables()
                        .into_iter()
                        .filter_map(|table| {
                            let path = table_path(&self.config.output_dir, table.name());
                            CopyPlan::prepare(table.name(), &path).err()
                        })
                        .map(PipelineError::Load)
                        .collect();
                    if let Some(err) = PipelineError::from_errors(errors) {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Save checkpoint to disk
    fn save_checkpoint(&self) -> PipelineResult<()> {
        self.checkpoint.save(&self.config.checkpoint_path())
    }

    /// Load existing checkpoint or create new one
    fn load_or_create_checkpoint(
        config: &PipelineConfig,
        run_id: &str,
        config_hash: &str,
    ) -> PipelineResult<Checkpoint> {
        let path = config.checkpoint_path();

        if !path.exists() {
            debug!(path = %path.display(), "No checkpoint found, starting fresh");
            return Ok(Checkpoint::new(run_id, config_hash));
        }

        let mut checkpoint = Checkpoint::load(&path)?;

        if checkpoint.config_hash != config_hash {
            return Err(PipelineError::ResumeError(
                "Configuration has changed since last run".to_string(),
            ));
        }

        if checkpoint.status == PipelineStatus::Completed {
            return Err(PipelineError::ResumeError(format!(
                "Run {} already completed",
                checkpoint.run_id
            )));
        }

        info!(
            run_id = %checkpoint.run_id,
            completed = ?checkpoint.completed_stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Resuming from checkpoint"
        );
        checkpoint.resume();
        Ok(checkpoint)
    }

    /// Hash the inputs that determine stage outputs, for change detection
    fn hash_config(config: &PipelineConfig) -> String {
        let mut hasher = Sha256::new();
        hasher.update(config.source_dir.display().to_string().as_bytes());
        hasher.update(config.pattern.as_bytes());
        hasher.update(config.output_dir.display().to_string().as_bytes());
        if let Some(ref url) = config.database_url {
            hasher.update(url.as_bytes());
        }
        hasher.update(
            serde_json::to_string(&config.cleaning)
                .unwrap_or_default()
                .as_bytes(),
        );
        format!("{:x}", hasher.finalize())
    }
}

/// Report from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Run ID
    pub run_id: String,
    /// Final status
    pub status: PipelineStatus,
    /// Completed stages
    pub stages_completed: Vec<PipelineStage>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Stage outputs keyed by stage name
    pub outputs: HashMap<String, StageOutput>,
}

impl PipelineReport {
    /// Check if pipeline was successful
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Output of one stage, if it ran
    pub fn output(&self, stage: PipelineStage) -> Option<&StageOutput> {
        self.outputs.get(stage.name())
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}s", secs)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Pipeline {} - {}", self.run_id, self.status);
        eprintln!("Duration: {}", self.duration_formatted());
        eprintln!("Stages completed: {}", self.stages_completed.len());

        for stage in PipelineStage::all() {
            if let Some(output) = self.output(stage) {
                let status = if output.success {
                    "ok"
                } else {
                    "failed"
                };
                eprintln!(
                    "  - {}: {} ({}ms)",
                    stage.name(),
                    status,
                    output.duration_ms
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_executor_creation() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::new()
            .with_name("unit")
            .with_source_dir(temp.path().join("xml"))
            .with_output_dir(temp.path().join("out"));

        let executor = PipelineExecutor::new(config).unwrap();
        assert_eq!(executor.checkpoint().status, PipelineStatus::Running);
        assert_eq!(executor.checkpoint().name.as_deref(), Some("unit"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig::new().with_pattern("");
        assert!(matches!(
            PipelineExecutor::new(config),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_config_hash() {
        let config1 = PipelineConfig::new()
            .with_source_dir("/data/xml")
            .with_pattern("*.xml");
        let config2 = PipelineConfig::new()
            .with_source_dir("/data/xml")
            .with_pattern("*.xml")
            .with_verbose(true);
        let config3 = PipelineConfig::new().with_source_dir("/data/other");
        let mut config4 = config1.clone();
        config4.cleaning.null_threshold = 10;

        let hash = PipelineExecutor::hash_config(&config1);
        assert_eq!(hash, PipelineExecutor::hash_config(&config2));
        assert_ne!(hash, PipelineExecutor::hash_config(&config3));
        assert_ne!(hash, PipelineExecutor::hash_config(&config4));
    }

    #[test]
    fn test_pending_load_reruns_schema() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::new().with_output_dir(temp.path());
        let stages = config.effective_stages();
        let mut executor = PipelineExecutor::new(config).unwrap();

        executor
            .checkpoint
            .complete_stage(PipelineStage::Schema, StageOutput::success());
        assert!(executor.must_rerun(PipelineStage::Schema, &stages));
        assert!(!executor.must_rerun(PipelineStage::Transform, &stages));

        executor
            .checkpoint
            .complete_stage(PipelineStage::Load, StageOutput::success());
        assert!(!executor.must_rerun(PipelineStage::Schema, &stages));
    }

    #[test]
    fn test_pipeline_report() {
        let report = PipelineReport {
            run_id: "test-123".to_string(),
            status: PipelineStatus::Completed,
            stages_completed: vec![PipelineStage::Flatten, PipelineStage::Transform],
            duration_ms: 65000,
            outputs: HashMap::new(),
        };

        assert!(report.is_success());
        assert_eq!(report.duration_formatted(), "1m 5s");
        assert!(report.output(PipelineStage::Flatten).is_none());
    }
}
