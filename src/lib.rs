//! # Haplograph Library
//!
//! Pangenome haplotype-graph imputation: given short reads from an
//! unknown sample and a pangenome expressed as haplotypes over reference
//! ranges, infer the most probable haplotype path (haploid) or path pair
//! (diploid) that produced the reads.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: in-memory graph, gamete, and count representations
//! - `error`: error types and result aliases
//! - `io`: file boundaries (haplotype VCF, index, mappings, reads, paths)
//! - `model`: kmer hashing, indexing, mapping, and HMM path inference
//! - `pipelines`: high-level workflow orchestration

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;

// Re-export commonly used types
pub use config::{Config, PathType};
pub use data::{
    GameteIdx, HapAssignment, HapId, HapIdx, HaplotypeGraph, RangeIdx, ReadMapping,
    ReadMappingCounts, ReferenceRange, SampleGamete,
};
pub use error::{HaplographError, Result};
pub use io::{MemorySequenceSource, SequenceSource};
pub use model::{
    AncestorSelector, DiploidPathFinder, HaploidPathFinder, KmerHasher, KmerIndex,
    KmerIndexBuilder, PathNode, ReadMapper,
};
pub use pipelines::{IndexBuildPipeline, MappingPipeline, PathFindingPipeline};
