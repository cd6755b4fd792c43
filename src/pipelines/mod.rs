//! # Pipelines Module (Orchestration)
//!
//! High-level workflow coordination: pipelines own the execution flow,
//! calling into `io` to load data, `model` to process, and `io` to write.
//! Parallelism lives here: rayon inside the index builder, and bounded
//! crossbeam channels between the sample producer, path-finding workers,
//! and the writer. Progress reporting and per-sample error isolation also
//! happen here.

pub mod imputation;
pub mod index_build;
pub mod mapping;

pub use imputation::{CancelToken, PathFindingPipeline};
pub use index_build::IndexBuildPipeline;
pub use mapping::MappingPipeline;
