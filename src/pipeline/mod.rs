//! Pipeline orchestration: flatten, transform, schema, load
//!
//! The executor runs the four stages in fixed order and records progress in a
//! checkpoint file next to the outputs, so an interrupted run can be resumed without
//! repeating the stages that already completed.
//!
//! # Example
//!
//! ```rust,no_run
//! use consultation_etl::pipeline::{PipelineConfig, PipelineExecutor, PipelineStage};
//!
//! let config = PipelineConfig::new()
//!     .with_source_dir("data/xml")
//!     .with_output_dir("processed")
//!     .with_database_url("postgres://localhost/consultations")
//!     .with_stages(vec![PipelineStage::Flatten, PipelineStage::Transform]);
//!
//! let mut executor = PipelineExecutor::new(config)?;
//! let report = executor.run()?;
//!
//! println!("Pipeline completed in {}", report.duration_formatted());
//! # Ok::<(), consultation_etl::pipeline::PipelineError>(())
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Flatten**: Read one XML file per consultation into `xml_data.csv`
//! 2. **Transform**: Clean the wide table and write eight dimensions and the fact table
//! 3. **Schema**: Drop and recreate the destination tables
//! 4. **Load**: Bulk-copy the nine tables, dimensions first
//!
//! # Checkpointing
//!
//! With `resume` set, stages recorded as completed in `pipeline.checkpoint.json` are
//! skipped, except that the schema is recreated again while the load is pending. Resuming is refused when the configuration changed or the previous run
//! already completed.
//!
//! # Dry Run
//!
//! With `dry_run` set, each stage's inputs are validated and nothing is written.

mod checkpoint;
mod config;
mod error;
mod executor;

pub use checkpoint::{Checkpoint, PipelineStatus, StageOutput};
pub use config::{CHECKPOINT_FILE, PipelineConfig, PipelineStage};
pub use error::{PipelineError, PipelineResult};
pub use executor::{PipelineExecutor, PipelineReport};

/// Run a pipeline with the given configuration
pub fn run_pipeline(config: PipelineConfig) -> PipelineResult<PipelineReport> {
    let mut executor = PipelineExecutor::new(config)?;
    executor.run()
}
