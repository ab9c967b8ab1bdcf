//! Pipeline configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::flatten::DEFAULT_PATTERN;
use crate::load::DestinationTable;
use crate::model::{CleaningConfig, WIDE_TABLE_FILE};

/// Name of the checkpoint file inside the output directory
pub const CHECKPOINT_FILE: &str = "pipeline.checkpoint.json";

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the pipeline run
    pub name: Option<String>,
    /// Directory holding one XML file per consultation
    pub source_dir: PathBuf,
    /// File pattern for source files
    pub pattern: String,
    /// Directory for the wide table, the nine output tables and the checkpoint
    pub output_dir: PathBuf,
    /// PostgreSQL connection string for the schema and load stages
    pub database_url: Option<String>,
    /// Cleaning parameters of the transform stage
    pub cleaning: CleaningConfig,
    /// Stages to run (empty = all)
    pub stages: Vec<PipelineStage>,
    /// Tables to load (empty = all)
    pub tables: Vec<DestinationTable>,
    /// Stop loading at the first failed table
    pub fail_fast: bool,
    /// Enable dry-run mode
    pub dry_run: bool,
    /// Resume from checkpoint
    pub resume: bool,
    /// Verbose output
    pub verbose: bool,
    /// Show progress bars
    pub progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: None,
            source_dir: PathBuf::from("data/xml"),
            pattern: DEFAULT_PATTERN.to_string(),
            output_dir: PathBuf::from("processed"),
            database_url: None,
            cleaning: CleaningConfig::default(),
            stages: Vec::new(),
            tables: Vec::new(),
            fail_fast: false,
            dry_run: false,
            resume: false,
            verbose: false,
            progress: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file; absent keys take their defaults
    pub fn from_toml_file(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io_with_path(path, "reading configuration", e))?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Set the pipeline name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the source directory
    pub fn with_source_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_dir = path.into();
        self
    }

    /// Set the file pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Set the database connection string
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Set cleaning parameters
    pub fn with_cleaning(mut self, cleaning: CleaningConfig) -> Self {
        self.cleaning = cleaning;
        self
    }

    /// Set specific stages to run
    pub fn with_stages(mut self, stages: Vec<PipelineStage>) -> Self {
        self.stages = stages;
        self
    }

    /// Restrict the load stage to some tables
    pub fn with_tables(mut self, tables: Vec<DestinationTable>) -> Self {
        self.tables = tables;
        self
    }

    /// Stop loading at the first failure
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable resume from checkpoint
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Show progress bars
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Get stages to run (all if empty), always in execution order
    ///
    /// Loading always starts from a freshly created schema: the exported surrogate
    /// keys are 1..N and only match tables the load itself fills. Selecting `load`
    /// therefore selects `schema` too.
    pub fn effective_stages(&self) -> Vec<PipelineStage> {
        if self.stages.is_empty() {
            return PipelineStage::all();
        }
        let loads = self.stages.contains(&PipelineStage::Load);
        PipelineStage::all()
            .into_iter()
            .filter(|s| self.stages.contains(s) || (loads && *s == PipelineStage::Schema))
            .collect()
    }

    /// Tables the load stage covers (all if empty)
    pub fn effective_tables(&self) -> Vec<DestinationTable> {
        if self.tables.is_empty() {
            DestinationTable::all().to_vec()
        } else {
            self.tables.clone()
        }
    }

    /// Path of the flattened wide table
    pub fn wide_table_path(&self) -> PathBuf {
        self.output_dir.join(WIDE_TABLE_FILE)
    }

    /// Path of the checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(CHECKPOINT_FILE)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.trim().is_empty() {
            return Err("File pattern must not be empty".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }
        if let Some(url) = &self.database_url {
            if url.trim().is_empty() {
                return Err("Database URL must not be empty when set".to_string());
            }
        }
        self.cleaning
            .validate()
            .map_err(|e| format!("Cleaning: {e}"))?;
        Ok(())
    }
}

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Stage 1: Flatten XML files into the wide table
    Flatten,
    /// Stage 2: Build the star schema from the wide table
    Transform,
    /// Stage 3: Drop and recreate the destination tables
    Schema,
    /// Stage 4: Bulk-load the nine tables
    Load,
}

impl PipelineStage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![Self::Flatten, Self::Transform, Self::Schema, Self::Load]
    }

    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flatten => "flatten",
            Self::Transform => "transform",
            Self::Schema => "schema",
            Self::Load => "load",
        }
    }

    /// Get stage description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Flatten => "Flatten XML files into one wide table",
            Self::Transform => "Build dimension and fact tables",
            Self::Schema => "Recreate the destination schema",
            Self::Load => "Bulk-load tables into PostgreSQL",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flatten" | "1" => Ok(Self::Flatten),
            "transform" | "2" => Ok(Self::Transform),
            "schema" | "3" => Ok(Self::Schema),
            "load" | "4" => Ok(Self::Load),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}
