//! # Most-Likely-Ancestor Selection
//!
//! Greedy weighted set cover that shrinks the HMM state space per sample:
//! repeatedly pick the gamete accounting for the most not-yet-covered read
//! observations, until the ancestor limit or the coverage target is
//! reached.

use tracing::info;

use crate::data::counts::ReadMappingCounts;
use crate::data::gamete::GameteIdx;
use crate::data::graph::HaplotypeGraph;
use crate::error::Result;

/// One greedy pick with its bookkeeping
#[derive(Clone, Debug, PartialEq)]
pub struct AncestorPick {
    pub gamete: GameteIdx,
    /// New read observations this pick covers
    pub incremental_reads: u64,
    /// Fraction of all coverable reads covered so far
    pub cumulative_coverage: f64,
}

/// Selection parameters
#[derive(Clone, Copy, Debug)]
pub struct AncestorParams {
    /// Maximum gametes to select
    pub max_ancestors: usize,
    /// Stop once this fraction of coverable reads is covered
    pub min_coverage: f64,
}

impl Default for AncestorParams {
    fn default() -> Self {
        Self {
            max_ancestors: 20,
            min_coverage: 1.0,
        }
    }
}

/// Greedy set-cover ancestor selector
pub struct AncestorSelector<'a> {
    graph: &'a HaplotypeGraph,
    params: AncestorParams,
}

impl<'a> AncestorSelector<'a> {
    pub fn new(graph: &'a HaplotypeGraph, params: AncestorParams) -> Self {
        Self { graph, params }
    }

    /// Select ancestors for one sample's read-mapping counts
    ///
    /// A gamete covers an observation `(range, hap set, count)` iff its
    /// haplotype at that range is in the set. Ties break by gamete id
    /// sort order, so selection is deterministic.
    pub fn select(&self, sample: &str, counts: &ReadMappingCounts) -> Result<Vec<AncestorPick>> {
        let grouped = counts.group_by_range(self.graph)?;
        let gametes: Vec<GameteIdx> = self.graph.gametes().indices().collect();

        // Observation pool and, per gamete, the observations it covers
        let mut pool: Vec<(u64, bool)> = Vec::new(); // (count, still uncovered)
        let mut covers: Vec<Vec<usize>> = vec![Vec::new(); gametes.len()];
        for range in grouped.ranges() {
            let observations = grouped.at(range).expect("listed range");
            for (set, count) in observations {
                let obs_id = pool.len();
                let mut coverable = false;
                for &gamete in &gametes {
                    if let Some(hap) = self.graph.hap_of(range, gamete) {
                        if set.binary_search(&hap).is_ok() {
                            covers[gamete.as_usize()].push(obs_id);
                            coverable = true;
                        }
                    }
                }
                pool.push((*count as u64, coverable));
            }
        }

        let total_coverable: u64 = pool
            .iter()
            .filter(|(_, coverable)| *coverable)
            .map(|(count, _)| count)
            .sum();
        if total_coverable == 0 {
            return Ok(Vec::new());
        }

        let mut uncovered: Vec<bool> = pool.iter().map(|(_, c)| *c).collect();
        let mut picks = Vec::new();
        let mut covered_reads = 0u64;
        let mut picked = vec![false; gametes.len()];

        while picks.len() < self.params.max_ancestors {
            // Highest marginal cover; first index wins ties
            let mut best: Option<(GameteIdx, u64)> = None;
            for &gamete in &gametes {
                if picked[gamete.as_usize()] {
                    continue;
                }
                let marginal: u64 = covers[gamete.as_usize()]
                    .iter()
                    .filter(|&&obs| uncovered[obs])
                    .map(|&obs| pool[obs].0)
                    .sum();
                if best.map_or(true, |(_, top)| marginal > top) {
                    best = Some((gamete, marginal));
                }
            }
            let Some((gamete, marginal)) = best else { break };
            if marginal == 0 {
                break;
            }

            picked[gamete.as_usize()] = true;
            for &obs in &covers[gamete.as_usize()] {
                uncovered[obs] = false;
            }
            covered_reads += marginal;
            let cumulative_coverage = covered_reads as f64 / total_coverable as f64;
            picks.push(AncestorPick {
                gamete,
                incremental_reads: marginal,
                cumulative_coverage,
            });

            if cumulative_coverage >= self.params.min_coverage {
                break;
            }
        }

        info!(
            sample,
            ancestors = picks.len(),
            coverage = picks.last().map(|p| p.cumulative_coverage).unwrap_or(0.0),
            "ancestor selection"
        );
        Ok(picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::gamete::SampleGamete;
    use crate::data::graph::HapAssignment;
    use crate::data::range::ReferenceRange;

    /// Six gametes over one range; G1 carries h1, G2 carries h2, the rest
    /// carry h3
    fn six_gamete_graph() -> HaplotypeGraph {
        let mut records = Vec::new();
        for (i, hap) in [(1, "h1"), (2, "h2"), (3, "h3"), (4, "h3"), (5, "h3"), (6, "h3")] {
            records.push(HapAssignment {
                range: ReferenceRange::new("chr1", 0, 100),
                hap: hap.into(),
                gamete: SampleGamete::new(format!("G{i}"), 0),
            });
        }
        HaplotypeGraph::from_assignments(records).unwrap()
    }

    #[test]
    fn test_greedy_cover_stops_at_target() {
        let graph = six_gamete_graph();
        // G1 alone covers 60 of 100 reads; G1 and G2 together cover all
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["h1".into()], 60);
        counts.add_count(vec!["h2".into()], 40);

        let selector = AncestorSelector::new(
            &graph,
            AncestorParams {
                max_ancestors: 6,
                min_coverage: 0.95,
            },
        );
        let picks = selector.select("S", &counts).unwrap();
        assert_eq!(picks.len(), 2);

        let g1 = graph.gametes().index_of(&SampleGamete::new("G1", 0)).unwrap();
        let g2 = graph.gametes().index_of(&SampleGamete::new("G2", 0)).unwrap();
        assert_eq!(picks[0].gamete, g1);
        assert_eq!(picks[0].incremental_reads, 60);
        assert!((picks[0].cumulative_coverage - 0.6).abs() < 1e-12);
        assert_eq!(picks[1].gamete, g2);
        assert!((picks[1].cumulative_coverage - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tie_breaks_by_gamete_order() {
        let graph = six_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        // h3 is carried by G3..G6 equally; the first of them must win
        counts.add_count(vec!["h3".into()], 10);

        let selector = AncestorSelector::new(&graph, AncestorParams::default());
        let picks = selector.select("S", &counts).unwrap();
        assert_eq!(picks.len(), 1);
        let g3 = graph.gametes().index_of(&SampleGamete::new("G3", 0)).unwrap();
        assert_eq!(picks[0].gamete, g3);
    }

    #[test]
    fn test_max_ancestors_budget() {
        let graph = six_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["h1".into()], 1);
        counts.add_count(vec!["h2".into()], 1);
        counts.add_count(vec!["h3".into()], 1);

        let selector = AncestorSelector::new(
            &graph,
            AncestorParams {
                max_ancestors: 2,
                min_coverage: 1.0,
            },
        );
        let picks = selector.select("S", &counts).unwrap();
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn test_empty_counts_select_nothing() {
        let graph = six_gamete_graph();
        let selector = AncestorSelector::new(&graph, AncestorParams::default());
        assert!(selector
            .select("S", &ReadMappingCounts::new())
            .unwrap()
            .is_empty());
    }
}
