//! Bulk loading into the destination store
//!
//! Each of the nine output files is copied into its destination table in one bulk
//! transfer. The table catalogue is static: a file is only accepted if its header
//! matches the destination's insertable columns exactly.
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "postgres")]
//! # async fn run() -> Result<(), consultation_etl::load::LoadError> {
//! use std::path::Path;
//! use consultation_etl::load::{BulkLoader, DestinationTable, PostgresLoader, load_all, schema};
//!
//! let mut loader = PostgresLoader::connect("postgres://localhost/consultations").await?;
//! loader.execute_ddl(&schema::create_schema()).await?;
//! let report = load_all(&mut loader, Path::new("processed"), DestinationTable::all(), false).await;
//! println!("{} rows loaded", report.total_rows());
//! # Ok(())
//! # }
//! ```

mod copy;
mod error;
mod loader;
#[cfg(feature = "postgres")]
mod postgres;
pub mod schema;
mod tables;

pub use copy::CopyPlan;
pub use error::{LoadError, LoadResult};
pub use loader::{BulkLoader, LoadReport, RecordingLoader, TableLoad, load_all, load_table};
#[cfg(feature = "postgres")]
pub use postgres::PostgresLoader;
pub use tables::{DestinationColumn, DestinationTable};
