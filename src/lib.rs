//! Consultation ETL - medical consultation records from XML files to a star schema
//!
//! Provides:
//! - XML flattening into one wide table (`flatten`)
//! - Cleaning and dimensional modelling into eight dimensions and one fact table (`model`)
//! - Bulk loading into PostgreSQL (`load`)
//! - Stage orchestration with checkpoints (`pipeline`)

pub mod flatten;
pub mod load;
pub mod model;
pub mod pipeline;
pub mod table;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use flatten::{FlattenError, FlattenOptions, FlattenStats, flatten_directory, run_flatten};
pub use load::{BulkLoader, CopyPlan, DestinationTable, LoadError, LoadReport, load_all};
#[cfg(feature = "postgres")]
pub use load::PostgresLoader;
pub use model::{
    CleaningConfig, DimensionTable, FactTable, ModelError, StarSchema, StarTables, build_dim,
    map_keys, transform, transform_file,
};
pub use pipeline::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineReport, PipelineStage,
    run_pipeline,
};
pub use table::{TableError, WideTable};
