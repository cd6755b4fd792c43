//! # Data Module
//!
//! In-memory representations of the pangenome. This is the core "Model"
//! layer.
//!
//! ## Design Philosophy: Dense Identifiers
//! The haplotype graph is a cyclic object graph in its natural OO
//! expression (samples ↔ haplotypes ↔ ranges). Here every entity gets a
//! dense integer id (`RangeIdx`, `HapIdx`, `GameteIdx`) and cross-references
//! are index lookups into contiguous arrays, which gives linear memory
//! layout and trivial read-only sharing across workers.
//!
//! ## Sub-modules
//! - `range`: reference-range intervals and their dense ids
//! - `gamete`: sample gametes and the graph-wide registry
//! - `graph`: the haplotype graph itself
//! - `counts`: read-mapping count multisets

pub mod counts;
pub mod gamete;
pub mod graph;
pub mod range;

pub use counts::{RangeObservations, ReadMapping, ReadMappingCounts};
pub use gamete::{GameteIdx, SampleGamete, SampleGametes};
pub use graph::{HapAssignment, HapId, HapIdx, HaplotypeGraph};
pub use range::{RangeIdx, ReferenceRange};
