//! CLI command implementations

pub mod flatten;
#[cfg(feature = "postgres")]
pub mod load;
pub mod pipeline;
pub mod transform;
