//! # Read-Mapping Counts
//!
//! The only persisted output of read mapping: a multiset over sorted
//! haplotype-id lists. "This many reads mapped to exactly that haplotype
//! set." The range each set belongs to is recoverable because every
//! haplotype id belongs to exactly one range.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::graph::{HapId, HapIdx, HaplotypeGraph};
use crate::data::range::RangeIdx;
use crate::error::{HaplographError, Result};

/// Multiset of reads keyed by the exact haplotype set they mapped to
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadMappingCounts {
    counts: HashMap<Box<[HapId]>, u32>,
}

impl ReadMappingCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one read mapped to a haplotype set
    ///
    /// The set must already be sorted lexicographically; the immutable
    /// sorted list is the multiset key.
    pub fn add(&mut self, sorted_haps: Vec<HapId>) {
        debug_assert!(sorted_haps.windows(2).all(|w| w[0] <= w[1]));
        *self.counts.entry(sorted_haps.into_boxed_slice()).or_insert(0) += 1;
    }

    /// Record a haplotype set with an explicit count
    pub fn add_count(&mut self, sorted_haps: Vec<HapId>, count: u32) {
        *self.counts.entry(sorted_haps.into_boxed_slice()).or_insert(0) += count;
    }

    /// Merge another accumulator into this one
    pub fn merge(&mut self, other: ReadMappingCounts) {
        for (haps, count) in other.counts {
            *self.counts.entry(haps).or_insert(0) += count;
        }
    }

    /// Number of distinct haplotype sets observed
    pub fn n_sets(&self) -> usize {
        self.counts.len()
    }

    /// Total number of mapped reads
    pub fn total_reads(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[HapId], u32)> {
        self.counts.iter().map(|(k, &v)| (k.as_ref(), v))
    }

    /// Entries in lexicographic key order, for deterministic serialization
    pub fn iter_sorted(&self) -> Vec<(&[HapId], u32)> {
        let mut entries: Vec<(&[HapId], u32)> =
            self.counts.iter().map(|(k, &v)| (k.as_ref(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Group the observations by reference range
    ///
    /// Each haplotype set is resolved against the graph; a set that mixes
    /// haplotypes from different ranges, or names an unknown haplotype,
    /// violates the mapping-file contract.
    pub fn group_by_range(&self, graph: &HaplotypeGraph) -> Result<RangeObservations> {
        let mut by_range: HashMap<RangeIdx, Vec<(Vec<HapIdx>, u32)>> = HashMap::new();
        for (haps, count) in self.counts.iter() {
            let mut range = None;
            let mut set = Vec::with_capacity(haps.len());
            for hap in haps.iter() {
                let (r, h) = graph.locate_hap(hap).ok_or_else(|| {
                    HaplographError::malformed(format!("unknown haplotype id {hap}"))
                })?;
                match range {
                    None => range = Some(r),
                    Some(prev) if prev != r => {
                        return Err(HaplographError::malformed(format!(
                            "haplotype set spans ranges {} and {}",
                            graph.range(prev),
                            graph.range(r)
                        )))
                    }
                    _ => {}
                }
                set.push(h);
            }
            if let Some(r) = range {
                set.sort();
                by_range.entry(r).or_default().push((set, *count));
            }
        }
        // Deterministic observation order within each range
        for obs in by_range.values_mut() {
            obs.sort();
        }
        Ok(RangeObservations { by_range })
    }
}

/// Read observations resolved to per-range haplotype positions
#[derive(Clone, Debug, Default)]
pub struct RangeObservations {
    by_range: HashMap<RangeIdx, Vec<(Vec<HapIdx>, u32)>>,
}

impl RangeObservations {
    /// Observations at one range: `(sorted hap positions, read count)`
    pub fn at(&self, range: RangeIdx) -> Option<&[(Vec<HapIdx>, u32)]> {
        self.by_range.get(&range).map(|v| v.as_slice())
    }

    /// Ranges with at least one observation, ascending
    pub fn ranges(&self) -> Vec<RangeIdx> {
        let mut ranges: Vec<RangeIdx> = self.by_range.keys().copied().collect();
        ranges.sort();
        ranges
    }

    pub fn is_empty(&self) -> bool {
        self.by_range.is_empty()
    }
}

/// One sample's mapping output together with its provenance headers
#[derive(Clone, Debug)]
pub struct ReadMapping {
    pub sample: Arc<str>,
    pub filename1: String,
    pub filename2: Option<String>,
    pub counts: ReadMappingCounts,
}
