//! # Haplotype Graph
//!
//! In-memory model of reference ranges, haplotypes, and sample→haplotype
//! membership. The graph is built once, then shared read-only across
//! workers; all cross-references are dense index lookups into contiguous
//! arrays rather than object references.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::data::gamete::{GameteIdx, SampleGamete, SampleGametes};
use crate::data::range::{RangeIdx, ReferenceRange};
use crate::error::{HaplographError, Result};

/// Stable haplotype identifier (content hash of the sequence)
pub type HapId = Arc<str>;

/// Zero-cost newtype for a haplotype's position within one range's
/// sorted haplotype list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HapIdx(pub u32);

impl HapIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for HapIdx {
    fn from(idx: u32) -> Self {
        Self(idx)
    }
}

impl From<usize> for HapIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// One record from a haplotype-VCF file: a gamete carries a haplotype at
/// a reference range
#[derive(Clone, Debug)]
pub struct HapAssignment {
    pub range: ReferenceRange,
    pub hap: HapId,
    pub gamete: SampleGamete,
}

/// In-memory haplotype graph
///
/// For each range (in sorted order): the sorted list of haplotype ids
/// present there, the gametes carrying each haplotype, and the inverse
/// gamete→haplotype lookup. A gamete absent at a range is represented by
/// `None` in the inverse lookup, never by a sentinel id.
#[derive(Clone, Debug)]
pub struct HaplotypeGraph {
    ranges: Vec<ReferenceRange>,
    gametes: SampleGametes,
    /// Per range: haplotype ids, sorted lexicographically
    haps: Vec<Vec<HapId>>,
    /// Per range, per haplotype position: carrying gametes, sorted
    members: Vec<Vec<Vec<GameteIdx>>>,
    /// Per range, per gamete index: haplotype position, if present
    gamete_to_hap: Vec<Vec<Option<HapIdx>>>,
    /// Global hap id → owning range and position within it
    hap_index: HashMap<HapId, (RangeIdx, HapIdx)>,
}

impl HaplotypeGraph {
    /// Build the graph from assignment records
    ///
    /// Ranges are sorted and assigned dense ids here, as the terminal step
    /// of construction. A gamete assigned two different haplotypes at one
    /// range is an invariant violation.
    pub fn from_assignments(records: impl IntoIterator<Item = HapAssignment>) -> Result<Self> {
        let mut builder = GraphBuilder::new();
        for record in records {
            builder.add(record);
        }
        builder.finish()
    }

    /// All reference ranges, in `(contig, start)` order
    pub fn ranges(&self) -> &[ReferenceRange] {
        &self.ranges
    }

    pub fn n_ranges(&self) -> usize {
        self.ranges.len()
    }

    /// The range at a dense index
    pub fn range(&self, idx: RangeIdx) -> &ReferenceRange {
        &self.ranges[idx.as_usize()]
    }

    /// All sample gametes known to the graph
    pub fn gametes(&self) -> &SampleGametes {
        &self.gametes
    }

    /// Sorted haplotype ids present at a range
    pub fn haps(&self, range: RangeIdx) -> &[HapId] {
        &self.haps[range.as_usize()]
    }

    /// Gametes carrying the haplotype at `(range, hap)`
    pub fn gametes_of_hap(&self, range: RangeIdx, hap: HapIdx) -> &[GameteIdx] {
        &self.members[range.as_usize()][hap.as_usize()]
    }

    /// The haplotype a gamete carries at a range, if any
    pub fn hap_of(&self, range: RangeIdx, gamete: GameteIdx) -> Option<HapIdx> {
        self.gamete_to_hap[range.as_usize()][gamete.as_usize()]
    }

    /// The haplotype id a gamete carries at a range, if any
    pub fn hap_id_of(&self, range: RangeIdx, gamete: GameteIdx) -> Option<&HapId> {
        self.hap_of(range, gamete)
            .map(|h| &self.haps[range.as_usize()][h.as_usize()])
    }

    /// The owning range and position of a haplotype id
    pub fn locate_hap(&self, hap: &str) -> Option<(RangeIdx, HapIdx)> {
        self.hap_index.get(hap).copied()
    }

    /// Number of distinct gametes with a haplotype at a range
    pub fn gamete_count(&self, range: RangeIdx) -> usize {
        self.members[range.as_usize()]
            .iter()
            .map(|g| g.len())
            .sum()
    }

    /// Range ids whose gamete count meets the minimum
    ///
    /// `min_gametes == 0` disables the filter and returns every range.
    pub fn ranges_with_min_gametes(&self, min_gametes: usize) -> Vec<RangeIdx> {
        (0..self.ranges.len() as u32)
            .map(RangeIdx::new)
            .filter(|&r| min_gametes == 0 || self.gamete_count(r) >= min_gametes)
            .collect()
    }
}

/// Accumulates assignment records into per-range maps, then finalizes
/// into the dense graph representation
#[derive(Default)]
pub struct GraphBuilder {
    by_range: BTreeMap<ReferenceRange, HashMap<HapId, Vec<SampleGamete>>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one gamete→haplotype assignment
    pub fn add(&mut self, record: HapAssignment) {
        self.by_range
            .entry(record.range)
            .or_default()
            .entry(record.hap)
            .or_default()
            .push(record.gamete);
    }

    /// Merge another builder's accumulated records into this one
    pub fn merge(&mut self, other: GraphBuilder) {
        for (range, haps) in other.by_range {
            let entry = self.by_range.entry(range).or_default();
            for (hap, gametes) in haps {
                entry.entry(hap).or_default().extend(gametes);
            }
        }
    }

    /// Sort ranges, assign dense ids, and build the lookup arrays
    pub fn finish(self) -> Result<HaplotypeGraph> {
        let mut all_gametes = Vec::new();
        for haps in self.by_range.values() {
            for gametes in haps.values() {
                all_gametes.extend(gametes.iter().cloned());
            }
        }
        let gametes = SampleGametes::from_gametes(all_gametes);

        let n_ranges = self.by_range.len();
        let mut ranges = Vec::with_capacity(n_ranges);
        let mut haps = Vec::with_capacity(n_ranges);
        let mut members = Vec::with_capacity(n_ranges);
        let mut gamete_to_hap = Vec::with_capacity(n_ranges);
        let mut hap_index = HashMap::new();

        for (range_id, (range, hap_map)) in self.by_range.into_iter().enumerate() {
            let range_idx = RangeIdx::new(range_id as u32);
            let mut range_haps: Vec<HapId> = hap_map.keys().cloned().collect();
            range_haps.sort();

            let mut range_members = vec![Vec::new(); range_haps.len()];
            let mut inverse = vec![None; gametes.len()];

            for (hap_pos, hap) in range_haps.iter().enumerate() {
                let hap_idx = HapIdx::new(hap_pos as u32);
                if hap_index
                    .insert(hap.clone(), (range_idx, hap_idx))
                    .is_some()
                {
                    return Err(HaplographError::invariant(format!(
                        "haplotype {hap} appears in more than one reference range"
                    )));
                }
                let mut carrier_ids: Vec<GameteIdx> = hap_map[hap]
                    .iter()
                    .map(|g| {
                        gametes.index_of(g).ok_or_else(|| {
                            HaplographError::invariant(format!("unregistered gamete {g}"))
                        })
                    })
                    .collect::<Result<_>>()?;
                carrier_ids.sort();
                carrier_ids.dedup();

                for &g in &carrier_ids {
                    if let Some(prev) = inverse[g.as_usize()].replace(hap_idx) {
                        if prev != hap_idx {
                            return Err(HaplographError::invariant(format!(
                                "gamete {} maps to two haplotypes at range {}",
                                gametes.get(g),
                                range
                            )));
                        }
                    }
                }
                range_members[hap_pos] = carrier_ids;
            }

            ranges.push(range);
            haps.push(range_haps);
            members.push(range_members);
            gamete_to_hap.push(inverse);
        }

        Ok(HaplotypeGraph {
            ranges,
            gametes,
            haps,
            members,
            gamete_to_hap,
            hap_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(
        contig: &str,
        start: u32,
        end: u32,
        hap: &str,
        sample: &str,
        gamete: u8,
    ) -> HapAssignment {
        HapAssignment {
            range: ReferenceRange::new(contig, start, end),
            hap: hap.into(),
            gamete: SampleGamete::new(sample, gamete),
        }
    }

    #[test]
    fn test_graph_construction() {
        let graph = HaplotypeGraph::from_assignments(vec![
            assignment("chr1", 100, 200, "h2", "B", 0),
            assignment("chr1", 0, 100, "h1", "A", 0),
            assignment("chr1", 0, 100, "h1", "B", 0),
            assignment("chr1", 0, 100, "h0", "A", 1),
        ])
        .unwrap();

        assert_eq!(graph.n_ranges(), 2);
        assert_eq!(graph.range(RangeIdx::new(0)).start, 0);
        assert_eq!(graph.range(RangeIdx::new(1)).start, 100);

        // Haps sorted within the range
        let expected: Vec<HapId> = vec!["h0".into(), "h1".into()];
        assert_eq!(graph.haps(RangeIdx::new(0)), expected.as_slice());

        // Inverse lookups agree with membership
        let a0 = graph.gametes().index_of(&SampleGamete::new("A", 0)).unwrap();
        let a1 = graph.gametes().index_of(&SampleGamete::new("A", 1)).unwrap();
        let b0 = graph.gametes().index_of(&SampleGamete::new("B", 0)).unwrap();
        assert_eq!(graph.hap_id_of(RangeIdx::new(0), a0).unwrap().as_ref(), "h1");
        assert_eq!(graph.hap_id_of(RangeIdx::new(0), a1).unwrap().as_ref(), "h0");
        assert_eq!(graph.hap_of(RangeIdx::new(1), b0), Some(HapIdx::new(0)));
        // Absence is represented by omission
        assert_eq!(graph.hap_of(RangeIdx::new(1), a0), None);

        assert_eq!(
            graph.locate_hap("h2"),
            Some((RangeIdx::new(1), HapIdx::new(0)))
        );
        assert_eq!(
            graph.gametes_of_hap(RangeIdx::new(0), HapIdx::new(1)),
            &[a0, b0]
        );
        assert_eq!(graph.gametes_of_hap(RangeIdx::new(0), HapIdx::new(0)), &[a1]);
    }

    #[test]
    fn test_conflicting_assignment_is_invariant_violation() {
        let result = HaplotypeGraph::from_assignments(vec![
            assignment("chr1", 0, 100, "h1", "A", 0),
            assignment("chr1", 0, 100, "h2", "A", 0),
        ]);
        assert!(matches!(
            result,
            Err(HaplographError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_min_gamete_filter() {
        let graph = HaplotypeGraph::from_assignments(vec![
            assignment("chr1", 0, 100, "h1", "A", 0),
            assignment("chr1", 0, 100, "h1", "B", 0),
            assignment("chr1", 100, 200, "h2", "A", 0),
        ])
        .unwrap();

        assert_eq!(graph.ranges_with_min_gametes(2), vec![RangeIdx::new(0)]);
        // Zero disables filtering
        assert_eq!(graph.ranges_with_min_gametes(0).len(), 2);
    }
}
