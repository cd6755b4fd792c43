//! # Read-to-Haplotype Mapping
//!
//! Alignment-free assignment of reads to haplotype sets. Every canonical
//! kmer of a read is looked up in the index; the haplotypes it hits are
//! tallied per reference range, and each surviving range contributes one
//! sorted haplotype set to the sample's count multiset.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::data::counts::ReadMappingCounts;
use crate::data::graph::{HapIdx, HaplotypeGraph};
use crate::data::range::RangeIdx;
use crate::error::Result;
use crate::model::index::KmerIndex;
use crate::model::kmer::KmerHasher;

/// Read-mapping parameters
#[derive(Clone, Copy, Debug)]
pub struct MappingParams {
    /// Within a range, retain haplotypes whose kmer hit count is at least
    /// `⌈max_count × this⌉`; 1.0 keeps strictly the argmax set
    pub min_proportion_of_max_count: f64,
    /// Keep a read only if one range dominates its kmer hits
    pub limit_single_ref_range: bool,
    /// Fraction of all hits the dominant range must hold
    pub min_same_reference_range: f64,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            min_proportion_of_max_count: 1.0,
            limit_single_ref_range: false,
            min_same_reference_range: 0.9,
        }
    }
}

/// Per-range kmer evidence for one read
#[derive(Clone, Debug, Default)]
struct RangeTally {
    /// Kmer hits landing in this range
    hits: u32,
    /// Hits per haplotype position
    hap_counts: HashMap<HapIdx, u32>,
}

/// Streams reads against a kmer index
pub struct ReadMapper<'a> {
    graph: &'a HaplotypeGraph,
    index: &'a KmerIndex,
    params: MappingParams,
}

impl<'a> ReadMapper<'a> {
    pub fn new(graph: &'a HaplotypeGraph, index: &'a KmerIndex, params: MappingParams) -> Self {
        Self {
            graph,
            index,
            params,
        }
    }

    /// Tally kmer hits per range; the hasher's non-ACGT reset splits the
    /// read into maximal valid runs, so runs shorter than 32 bases yield
    /// nothing
    fn tally(&self, seq: &[u8]) -> HashMap<RangeIdx, RangeTally> {
        let mut tallies: HashMap<RangeIdx, RangeTally> = HashMap::new();
        KmerHasher::scan(seq, |kmer| {
            if let Some(entries) = self.index.lookup(kmer) {
                for &(range, row) in entries {
                    let tally = tallies.entry(range).or_default();
                    tally.hits += 1;
                    for hap in self.index.range_sets(range).row_haps(row) {
                        *tally.hap_counts.entry(hap).or_insert(0) += 1;
                    }
                }
            }
        });
        tallies
    }

    /// Apply the single-range restriction and per-range argmax retention
    fn resolve(&self, mut tallies: HashMap<RangeIdx, RangeTally>) -> HashMap<RangeIdx, Vec<HapIdx>> {
        if self.params.limit_single_ref_range && !tallies.is_empty() {
            let total: u32 = tallies.values().map(|t| t.hits).sum();
            let (&best, best_hits) = tallies
                .iter()
                .map(|(r, t)| (r, t.hits))
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
                .expect("non-empty tallies");
            if (best_hits as f64) < self.params.min_same_reference_range * total as f64 {
                return HashMap::new();
            }
            tallies.retain(|r, _| *r == best);
        }

        let mut resolved = HashMap::with_capacity(tallies.len());
        for (range, tally) in tallies {
            let max = tally.hap_counts.values().copied().max().unwrap_or(0);
            if max == 0 {
                continue;
            }
            let threshold = (max as f64 * self.params.min_proportion_of_max_count).ceil() as u32;
            let mut haps: Vec<HapIdx> = tally
                .hap_counts
                .iter()
                .filter(|(_, &count)| count >= threshold)
                .map(|(&hap, _)| hap)
                .collect();
            haps.sort();
            resolved.insert(range, haps);
        }
        resolved
    }

    /// Resolve one single-end read to per-range haplotype sets
    pub fn map_read(&self, seq: &[u8]) -> HashMap<RangeIdx, Vec<HapIdx>> {
        self.resolve(self.tally(seq))
    }

    /// Resolve a read pair: each mate independently, then the per-range
    /// intersection; ranges whose intersection is empty contribute nothing
    pub fn map_pair(&self, seq1: &[u8], seq2: &[u8]) -> HashMap<RangeIdx, Vec<HapIdx>> {
        let first = self.map_read(seq1);
        let second = self.map_read(seq2);
        let mut intersected = HashMap::new();
        for (range, haps1) in first {
            if let Some(haps2) = second.get(&range) {
                let common: Vec<HapIdx> = haps1
                    .into_iter()
                    .filter(|h| haps2.binary_search(h).is_ok())
                    .collect();
                if !common.is_empty() {
                    intersected.insert(range, common);
                }
            }
        }
        intersected
    }

    /// Convert resolved sets to sorted haplotype-id lists and accumulate
    fn emit(&self, sets: HashMap<RangeIdx, Vec<HapIdx>>, counts: &mut ReadMappingCounts) {
        for (range, haps) in sets {
            let range_haps = self.graph.haps(range);
            // Positions ascend, and the range's hap list is sorted, so the
            // id list is already lexicographic
            let ids: Vec<_> = haps
                .into_iter()
                .map(|h| range_haps[h.as_usize()].clone())
                .collect();
            counts.add(ids);
        }
    }

    /// Map a stream of single-end reads
    pub fn map_single_stream(
        &self,
        reads: impl Iterator<Item = Result<Vec<u8>>>,
    ) -> Result<ReadMappingCounts> {
        let mut counts = ReadMappingCounts::new();
        let mut n_reads = 0u64;
        for read in reads {
            let seq = read?;
            self.emit(self.map_read(&seq), &mut counts);
            n_reads += 1;
            if n_reads % 1_000_000 == 0 {
                debug!(n_reads, "mapping progress");
            }
        }
        info!(n_reads, mapped = counts.total_reads(), "single-end mapping done");
        Ok(counts)
    }

    /// Map a stream of read pairs
    pub fn map_paired_stream(
        &self,
        pairs: impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>,
    ) -> Result<ReadMappingCounts> {
        let mut counts = ReadMappingCounts::new();
        let mut n_pairs = 0u64;
        for pair in pairs {
            let (seq1, seq2) = pair?;
            self.emit(self.map_pair(&seq1, &seq2), &mut counts);
            n_pairs += 1;
            if n_pairs % 1_000_000 == 0 {
                debug!(n_pairs, "mapping progress");
            }
        }
        info!(n_pairs, mapped = counts.total_reads(), "paired-end mapping done");
        Ok(counts)
    }
}
