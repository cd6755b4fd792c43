//! # K-mer Index
//!
//! Two-level index mapping each informative canonical 32-mer to the set of
//! haplotypes containing it, grouped by reference range. Haplotype-set
//! cardinalities are heavy-tailed and many kmers share the same set within
//! a range, so each distinct set is stored once as a bit-packed row and
//! kmers reference rows by offset.

use std::collections::{BTreeMap, HashMap};

use bitvec::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::data::graph::{HapId, HapIdx, HaplotypeGraph};
use crate::data::range::RangeIdx;
use crate::error::{HaplographError, Result};
use crate::io::sequence::SequenceSource;
use crate::model::kmer::KmerHasher;

/// Per-range haplotype-set rows
///
/// Conceptually an `n_rows × n_haps` bit matrix: bit `(o, h)` is set iff
/// haplotype `h` of the range belongs to the set stored at row `o`. Rows
/// are deduplicated at build time.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeKmerSets {
    haps: Vec<HapId>,
    n_rows: u32,
    bits: BitVec<u64, Lsb0>,
}

impl RangeKmerSets {
    pub fn new(haps: Vec<HapId>) -> Self {
        Self {
            haps,
            n_rows: 0,
            bits: BitVec::new(),
        }
    }

    /// Rebuild from serialized words; `words` must hold exactly
    /// `n_rows × n_haps` bits rounded up to whole u64 words
    pub fn from_words(haps: Vec<HapId>, words: Vec<u64>, n_rows: u32) -> Result<Self> {
        let n_bits = n_rows as usize * haps.len();
        let expected_words = n_bits.div_ceil(64);
        if words.len() != expected_words {
            return Err(HaplographError::malformed(format!(
                "bit matrix has {} words, expected {expected_words}",
                words.len()
            )));
        }
        let mut bits = BitVec::from_vec(words);
        bits.truncate(n_bits);
        Ok(Self { haps, n_rows, bits })
    }

    pub fn haps(&self) -> &[HapId] {
        &self.haps
    }

    pub fn n_haps(&self) -> usize {
        self.haps.len()
    }

    pub fn n_rows(&self) -> u32 {
        self.n_rows
    }

    /// Append a row for the given haplotype positions, returning its id
    pub fn push_row(&mut self, hap_positions: &[u32]) -> u32 {
        let row = self.n_rows;
        let base = self.bits.len();
        self.bits.resize(base + self.haps.len(), false);
        for &pos in hap_positions {
            self.bits.set(base + pos as usize, true);
        }
        self.n_rows += 1;
        row
    }

    /// Whether the set at `row` contains the haplotype
    pub fn row_contains(&self, row: u32, hap: HapIdx) -> bool {
        self.bits[row as usize * self.haps.len() + hap.as_usize()]
    }

    /// Haplotype positions in the set at `row`
    pub fn row_haps(&self, row: u32) -> Vec<HapIdx> {
        let base = row as usize * self.haps.len();
        (0..self.haps.len())
            .filter(|&h| self.bits[base + h])
            .map(HapIdx::from)
            .collect()
    }

    /// Number of haplotypes in the set at `row`
    pub fn row_popcount(&self, row: u32) -> usize {
        let base = row as usize * self.haps.len();
        self.bits[base..base + self.haps.len()].count_ones()
    }

    /// Backing words of the bit matrix, little-endian u64
    pub fn words(&self) -> &[u64] {
        self.bits.as_raw_slice()
    }
}

/// The two-level kmer index over a haplotype graph
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KmerIndex {
    /// Canonical kmer → `(range, row)` tuples; a kmer may hit several ranges
    kmers: HashMap<u64, Vec<(RangeIdx, u32)>>,
    /// Row matrices, indexed by `RangeIdx`
    ranges: Vec<RangeKmerSets>,
}

impl KmerIndex {
    pub fn from_parts(ranges: Vec<RangeKmerSets>, kmers: HashMap<u64, Vec<(RangeIdx, u32)>>) -> Self {
        Self { kmers, ranges }
    }

    /// All `(range, row)` tuples for a canonical kmer
    pub fn lookup(&self, kmer: u64) -> Option<&[(RangeIdx, u32)]> {
        self.kmers.get(&kmer).map(|v| v.as_slice())
    }

    pub fn range_sets(&self, range: RangeIdx) -> &RangeKmerSets {
        &self.ranges[range.as_usize()]
    }

    pub fn n_ranges(&self) -> usize {
        self.ranges.len()
    }

    pub fn n_kmers(&self) -> usize {
        self.kmers.len()
    }

    /// Every stored kmer with its `(range, row)` tuples
    pub fn iter_kmers(&self) -> impl Iterator<Item = (u64, &[(RangeIdx, u32)])> {
        self.kmers.iter().map(|(&kmer, entries)| (kmer, entries.as_slice()))
    }

    /// `(kmer, row)` pairs stored for one range, sorted by kmer
    pub fn kmers_for_range(&self, range: RangeIdx) -> Vec<(u64, u32)> {
        let mut pairs: Vec<(u64, u32)> = self
            .kmers
            .iter()
            .flat_map(|(&kmer, entries)| {
                entries
                    .iter()
                    .filter(|(r, _)| *r == range)
                    .map(move |&(_, row)| (kmer, row))
            })
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

/// Index construction parameters
#[derive(Clone, Copy, Debug)]
pub struct IndexParams {
    /// Reject kmers present in more than this fraction of a range's haplotypes
    pub max_haplotype_proportion: f64,
    /// Deterministic subsampling: keep a kmer iff
    /// `kmer & hash_mask == hash_filter_value`; mask 0 retains all
    pub hash_mask: u64,
    pub hash_filter_value: u64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            max_haplotype_proportion: 0.75,
            hash_mask: 0,
            hash_filter_value: 0,
        }
    }
}

/// Builds the kmer index for a graph, one range at a time in parallel
pub struct KmerIndexBuilder<'a> {
    graph: &'a HaplotypeGraph,
    params: IndexParams,
}

impl<'a> KmerIndexBuilder<'a> {
    pub fn new(graph: &'a HaplotypeGraph, params: IndexParams) -> Self {
        Self { graph, params }
    }

    /// Stream every haplotype sequence and assemble the index
    pub fn build(&self, source: &dyn SequenceSource) -> Result<KmerIndex> {
        let range_ids: Vec<RangeIdx> = (0..self.graph.n_ranges() as u32).map(RangeIdx::new).collect();

        let per_range: Vec<(RangeKmerSets, Vec<(u64, u32)>)> = range_ids
            .par_iter()
            .map(|&range| self.build_range(range, source))
            .collect::<Result<_>>()?;

        let mut kmers: HashMap<u64, Vec<(RangeIdx, u32)>> = HashMap::new();
        let mut ranges = Vec::with_capacity(per_range.len());
        for (range_id, (sets, pairs)) in per_range.into_iter().enumerate() {
            let range = RangeIdx::new(range_id as u32);
            for (kmer, row) in pairs {
                kmers.entry(kmer).or_default().push((range, row));
            }
            ranges.push(sets);
        }

        let index = KmerIndex { kmers, ranges };
        info!(
            ranges = index.n_ranges(),
            kmers = index.n_kmers(),
            "kmer index built"
        );
        Ok(index)
    }

    fn build_range(
        &self,
        range: RangeIdx,
        source: &dyn SequenceSource,
    ) -> Result<(RangeKmerSets, Vec<(u64, u32)>)> {
        let haps = self.graph.haps(range);
        let max_set = (self.params.max_haplotype_proportion * haps.len() as f64).floor() as usize;

        // Which haplotypes contain each kmer; BTreeMap keeps row numbering
        // deterministic across runs
        let mut occurs: BTreeMap<u64, Vec<u32>> = BTreeMap::new();
        for (pos, hap) in haps.iter().enumerate() {
            let seq = source.sequence(hap, self.graph.range(range))?;
            let mask = self.params.hash_mask;
            let filter = self.params.hash_filter_value;
            KmerHasher::scan(seq.as_bytes(), |kmer| {
                if mask != 0 && kmer & mask != filter {
                    return;
                }
                let entry = occurs.entry(kmer).or_default();
                if entry.last() != Some(&(pos as u32)) {
                    entry.push(pos as u32);
                }
            });
        }

        let mut sets = RangeKmerSets::new(haps.to_vec());
        let mut row_of_set: HashMap<Vec<u32>, u32> = HashMap::new();
        let mut pairs = Vec::new();
        let mut rejected = 0usize;
        for (kmer, positions) in occurs {
            if positions.len() > max_set {
                rejected += 1;
                continue;
            }
            let row = *row_of_set
                .entry(positions.clone())
                .or_insert_with(|| sets.push_row(&positions));
            pairs.push((kmer, row));
        }

        debug!(
            range = %self.graph.range(range),
            kept = pairs.len(),
            rejected,
            rows = sets.n_rows(),
            "indexed range"
        );
        Ok((sets, pairs))
    }
}
