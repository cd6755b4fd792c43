//! # Model Module
//!
//! Algorithm implementations for index construction, read mapping, and
//! path inference.
//!
//! ## Core Algorithms
//! - `kmer`: canonical 32-mer rolling hash
//! - `index`: two-level kmer → haplotype-set index and its builder
//! - `mapping`: alignment-free read-to-haplotype assignment
//! - `ancestors`: greedy set-cover state-space pruning
//! - `stats`: log-space binomial/multinomial primitives
//! - `transitions`, `emissions`: HMM probability models
//! - `hmm`: haploid and diploid Viterbi path finders

pub mod ancestors;
pub mod emissions;
pub mod hmm;
pub mod index;
pub mod kmer;
pub mod mapping;
pub mod stats;
pub mod transitions;

pub use ancestors::{AncestorParams, AncestorPick, AncestorSelector};
pub use emissions::HapAtRange;
pub use hmm::{DiploidPathFinder, HaploidPathFinder, PathNode, PathParams};
pub use index::{IndexParams, KmerIndex, KmerIndexBuilder, RangeKmerSets};
pub use kmer::{KmerHasher, KMER_SIZE};
pub use mapping::{MappingParams, ReadMapper};
pub use transitions::{DiploidTransitions, HaploidTransitions};
