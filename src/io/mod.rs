//! # I/O Module
//!
//! File-format boundaries. Converts between disk formats and the
//! in-memory graph, index, and count representations.

pub mod hapvcf;
pub mod kmer_index;
pub mod paths;
pub mod read_counts;
pub mod reads;
pub mod sequence;

pub use hapvcf::load_graph;
pub use kmer_index::{read_index, write_index};
pub use read_counts::{read_read_mapping, write_read_mapping};
pub use reads::{PairedReadStream, ReadStream};
pub use sequence::{CommandSequenceSource, MemorySequenceSource, SequenceSource};
