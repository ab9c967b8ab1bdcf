//! CLI commands for pipeline operations

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::pipeline::{Checkpoint, PipelineConfig, PipelineExecutor, PipelineStage};

/// Arguments for the `pipeline run` command
///
/// `None` and `false` leave the value from the configuration file in place.
#[derive(Debug, Default)]
pub struct PipelineRunArgs {
    /// TOML configuration file
    pub config_file: Option<PathBuf>,
    /// Source directory of XML files
    pub source: Option<PathBuf>,
    /// File pattern for source files
    pub pattern: Option<String>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    /// Database connection string
    pub database_url: Option<String>,
    /// Stages to run (empty = all)
    pub stages: Vec<String>,
    /// Sparsity threshold for column drops
    pub threshold: Option<usize>,
    /// Stop loading at the first failed table
    pub fail_fast: bool,
    /// Dry run mode
    pub dry_run: bool,
    /// Resume from checkpoint
    pub resume: bool,
    /// Show progress bars
    pub progress: bool,
    /// Verbose output
    pub verbose: bool,
}

/// Arguments for the `pipeline status` command
#[derive(Debug)]
pub struct PipelineStatusArgs {
    /// Output directory holding the checkpoint
    pub output_dir: PathBuf,
}

/// Parse `--stage` values
pub fn parse_stages(stages: &[String]) -> Result<Vec<PipelineStage>, CliError> {
    stages
        .iter()
        .map(|s| s.parse::<PipelineStage>().map_err(CliError::InvalidArgument))
        .collect()
}

/// Build the pipeline configuration: file first, then flags, then `DATABASE_URL`
pub fn build_config(args: &PipelineRunArgs) -> Result<PipelineConfig, CliError> {
    let mut config = match &args.config_file {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::new(),
    };

    if let Some(source) = &args.source {
        config = config.with_source_dir(source);
    }
    if let Some(pattern) = &args.pattern {
        config = config.with_pattern(pattern);
    }
    if let Some(output_dir) = &args.output_dir {
        config = config.with_output_dir(output_dir);
    }
    if let Some(url) = &args.database_url {
        config = config.with_database_url(url);
    }
    if config.database_url.is_none() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config = config.with_database_url(url);
        }
    }
    if !args.stages.is_empty() {
        config = config.with_stages(parse_stages(&args.stages)?);
    }
    if let Some(threshold) = args.threshold {
        config.cleaning = config.cleaning.with_null_threshold(threshold);
    }
    if args.fail_fast {
        config = config.with_fail_fast(true);
    }
    if args.dry_run {
        config = config.with_dry_run(true);
    }
    if args.resume {
        config = config.with_resume(true);
    }
    if args.progress {
        config = config.with_progress(true);
    }
    if args.verbose {
        config = config.with_verbose(true);
    }

    Ok(config)
}

/// Handle the `pipeline run` command
pub fn handle_pipeline_run(args: &PipelineRunArgs) -> Result<(), CliError> {
    let config = build_config(args)?;
    let mut executor = PipelineExecutor::new(config)?;

    eprintln!("Starting pipeline run: {}", executor.checkpoint().run_id);

    let report = executor.run()?;
    report.print_summary();

    if report.is_success() {
        eprintln!();
        eprintln!("Pipeline completed successfully!");
    }
    Ok(())
}

/// Handle the `pipeline status` command
pub fn handle_pipeline_status(args: &PipelineStatusArgs) -> Result<(), CliError> {
    let checkpoint_path = Checkpoint::default_path(&args.output_dir);

    if !checkpoint_path.exists() {
        eprintln!(
            "No pipeline checkpoint found in: {}",
            args.output_dir.display()
        );
        eprintln!("Run 'consultation-etl pipeline run' to start a new pipeline.");
        return Ok(());
    }

    let checkpoint = Checkpoint::load(&checkpoint_path)?;

    eprintln!("Pipeline Status");
    eprintln!("===============");
    eprintln!();
    eprintln!("Run ID:   {}", checkpoint.run_id);
    if let Some(name) = &checkpoint.name {
        eprintln!("Name:     {}", name);
    }
    eprintln!("Status:   {}", checkpoint.status);
    eprintln!(
        "Started:  {}",
        checkpoint.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    eprintln!(
        "Updated:  {}",
        checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    eprintln!();
    eprintln!("Stages:");
    for stage in PipelineStage::all() {
        let Some(output) = checkpoint.stage_outputs.get(stage.name()) else {
            continue;
        };
        let status = if output.success {
            "completed"
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

    if let Some(stage) = &checkpoint.current_stage {
        eprintln!();
        eprintln!("Current Stage: {}", stage.name());
    }

    if let Some(ref error) = checkpoint.error {
        eprintln!();
        eprintln!("Error: {}", error);
    }

    Ok(())
}
