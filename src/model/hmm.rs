//! # Viterbi Path Finders
//!
//! Two first-order HMMs over the haplotype graph: a haploid model whose
//! state is a single gamete per reference range, and a diploid model over
//! ordered gamete pairs. Both exploit the uniform switch probability so
//! the max-predecessor per state needs only the self state and the
//! previous column's argmax, and both back-track parent pointers into a
//! path of one node per retained range.

use tracing::debug;

use crate::data::counts::RangeObservations;
use crate::data::gamete::GameteIdx;
use crate::data::graph::{HapIdx, HaplotypeGraph};
use crate::data::range::RangeIdx;
use crate::error::Result;
use crate::model::emissions::{diploid_emission, haploid_emission, HapAtRange};
use crate::model::transitions::{DiploidTransitions, HaploidTransitions};

/// Path-finding parameters
#[derive(Clone, Copy, Debug)]
pub struct PathParams {
    /// Emission binomial success probability
    pub prob_correct: f64,
    /// HMM self-transition probability
    pub prob_same_gamete: f64,
    /// Inbreeding coefficient (diploid transitions only)
    pub inbreeding: f64,
    /// Skip ranges with fewer distinct observed sets than this
    pub min_reads: u32,
    /// Skip ranges with more reads per kilobase than this
    pub max_reads_per_kb: u32,
    /// Skip ranges where every haplotype has identical read support
    pub remove_equal: bool,
    /// Skip ranges carried by fewer gametes than this; 0 disables
    pub min_gametes: u32,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            prob_correct: 0.99,
            prob_same_gamete: 0.99,
            inbreeding: 0.0,
            min_reads: 0,
            max_reads_per_kb: 1000,
            remove_equal: false,
            min_gametes: 1,
        }
    }
}

/// One step of an inferred path: the gamete (or unordered gamete pair)
/// chosen at a reference range
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathNode {
    pub range: RangeIdx,
    pub first: GameteIdx,
    /// Present for diploid paths
    pub second: Option<GameteIdx>,
}

/// Ranges that survive the emission filters, ascending
///
/// A range is retained when it has observations, enough distinct sets,
/// read density within bounds, enough carrying gametes, and (optionally)
/// unequal per-haplotype support.
fn retained_ranges(
    graph: &HaplotypeGraph,
    observations: &RangeObservations,
    params: &PathParams,
) -> Vec<RangeIdx> {
    let mut retained = Vec::new();
    for range in observations.ranges() {
        let obs = observations.at(range).expect("listed range");
        if (obs.len() as u32) < params.min_reads {
            continue;
        }
        if params.min_gametes > 0 && graph.gamete_count(range) < params.min_gametes as usize {
            continue;
        }
        let total_reads: u64 = obs.iter().map(|(_, count)| *count as u64).sum();
        let length = graph.range(range).len().max(1) as u64;
        if total_reads * 1000 / length > params.max_reads_per_kb as u64 {
            debug!(range = %graph.range(range), total_reads, "range over read-density cap");
            continue;
        }
        if params.remove_equal && has_equal_support(graph, range, obs) {
            continue;
        }
        retained.push(range);
    }
    retained
}

/// Whether every haplotype at the range has the same total read support
fn has_equal_support(
    graph: &HaplotypeGraph,
    range: RangeIdx,
    obs: &[(Vec<HapIdx>, u32)],
) -> bool {
    let n_haps = graph.haps(range).len();
    let mut support = vec![0u64; n_haps];
    for (set, count) in obs {
        for hap in set {
            support[hap.as_usize()] += *count as u64;
        }
    }
    support.windows(2).all(|w| w[0] == w[1])
}

/// Argmax with ties going to the smaller index
fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    best
}

/// Haploid Viterbi over single-gamete states
pub struct HaploidPathFinder<'a> {
    graph: &'a HaplotypeGraph,
    candidates: Vec<GameteIdx>,
    params: PathParams,
}

impl<'a> HaploidPathFinder<'a> {
    /// `candidates` restricts the state space; an empty list means every
    /// gamete in the graph
    pub fn new(graph: &'a HaplotypeGraph, candidates: Vec<GameteIdx>, params: PathParams) -> Self {
        let candidates = if candidates.is_empty() {
            graph.gametes().indices().collect()
        } else {
            candidates
        };
        Self {
            graph,
            candidates,
            params,
        }
    }

    /// The most probable gamete sequence, one node per retained range;
    /// an empty path when nothing survives filtering
    pub fn find_path(&self, observations: &RangeObservations) -> Result<Vec<PathNode>> {
        let ranges = retained_ranges(self.graph, observations, &self.params);
        let n = self.candidates.len();
        if ranges.is_empty() || n == 0 {
            return Ok(Vec::new());
        }

        let transitions = HaploidTransitions::new(self.params.prob_same_gamete, n);
        let ln_init = -(n as f64).ln();

        let mut scores = vec![0.0f64; n];
        let mut parents: Vec<Vec<u32>> = Vec::with_capacity(ranges.len());

        for (step, &range) in ranges.iter().enumerate() {
            let obs = observations.at(range).expect("retained range");
            let emissions: Vec<f64> = self
                .candidates
                .iter()
                .map(|&g| {
                    let hap = HapAtRange::from_option(self.graph.hap_of(range, g));
                    haploid_emission(obs, hap, self.params.prob_correct)
                })
                .collect();

            if step == 0 {
                for (state, score) in scores.iter_mut().enumerate() {
                    *score = ln_init + emissions[state];
                }
                continue;
            }

            // Best predecessor is the self state or the previous argmax
            let best_prev = argmax(&scores);
            let mut next = vec![0.0f64; n];
            let mut parent = vec![0u32; n];
            for state in 0..n {
                let stay = scores[state] + transitions.ln_same();
                let switch = scores[best_prev] + transitions.ln_prob(best_prev, state);
                if switch > stay || (switch == stay && best_prev < state) {
                    next[state] = switch + emissions[state];
                    parent[state] = best_prev as u32;
                } else {
                    next[state] = stay + emissions[state];
                    parent[state] = state as u32;
                }
            }
            scores = next;
            parents.push(parent);
        }

        // Back-track from the terminal argmax
        let mut state = argmax(&scores);
        let mut path = Vec::with_capacity(ranges.len());
        for (step, &range) in ranges.iter().enumerate().rev() {
            path.push(PathNode {
                range,
                first: self.candidates[state],
                second: None,
            });
            if step > 0 {
                state = parents[step - 1][state] as usize;
            }
        }
        path.reverse();
        Ok(path)
    }
}

/// Diploid Viterbi over ordered gamete pairs
pub struct DiploidPathFinder<'a> {
    graph: &'a HaplotypeGraph,
    candidates: Vec<GameteIdx>,
    params: PathParams,
}

impl<'a> DiploidPathFinder<'a> {
    pub fn new(graph: &'a HaplotypeGraph, candidates: Vec<GameteIdx>, params: PathParams) -> Self {
        let candidates = if candidates.is_empty() {
            graph.gametes().indices().collect()
        } else {
            candidates
        };
        Self {
            graph,
            candidates,
            params,
        }
    }

    /// Emissions for every ordered pair at one range; the pair is treated
    /// as unordered, so the matrix is symmetric and computed once per
    /// unordered pair
    fn pair_emissions(&self, range: RangeIdx, obs: &[(Vec<HapIdx>, u32)]) -> Vec<f64> {
        let n = self.candidates.len();
        let states: Vec<HapAtRange> = self
            .candidates
            .iter()
            .map(|&g| HapAtRange::from_option(self.graph.hap_of(range, g)))
            .collect();
        let mut emissions = vec![0.0f64; n * n];
        for i in 0..n {
            for j in i..n {
                let ln_like =
                    diploid_emission(obs, states[i], states[j], self.params.prob_correct);
                emissions[i * n + j] = ln_like;
                emissions[j * n + i] = ln_like;
            }
        }
        emissions
    }

    /// The most probable unordered gamete-pair sequence
    pub fn find_path(&self, observations: &RangeObservations) -> Result<Vec<PathNode>> {
        let ranges = retained_ranges(self.graph, observations, &self.params);
        let n = self.candidates.len();
        if ranges.is_empty() || n == 0 {
            return Ok(Vec::new());
        }

        let transitions =
            DiploidTransitions::new(self.params.prob_same_gamete, self.params.inbreeding, n);
        let n_states = transitions.n_states();
        let ln_init = -(n_states as f64).ln();

        let mut scores = vec![0.0f64; n_states];
        let mut parents: Vec<Vec<u32>> = Vec::with_capacity(ranges.len());

        for (step, &range) in ranges.iter().enumerate() {
            let obs = observations.at(range).expect("retained range");
            let emissions = self.pair_emissions(range, obs);

            if step == 0 {
                for (state, score) in scores.iter_mut().enumerate() {
                    *score = ln_init + emissions[state];
                }
                continue;
            }

            let best_prev = argmax(&scores);
            let mut next = vec![0.0f64; n_states];
            let mut parent = vec![0u32; n_states];
            for state in 0..n_states {
                let stay = scores[state] + transitions.ln_prob(state, state);
                let switch = scores[best_prev] + transitions.ln_prob(best_prev, state);
                if switch > stay || (switch == stay && best_prev < state) {
                    next[state] = switch + emissions[state];
                    parent[state] = best_prev as u32;
                } else {
                    next[state] = stay + emissions[state];
                    parent[state] = state as u32;
                }
            }
            scores = next;
            parents.push(parent);
        }

        let mut state = argmax(&scores);
        let mut path = Vec::with_capacity(ranges.len());
        for (step, &range) in ranges.iter().enumerate().rev() {
            let first = self.candidates[state / n];
            let second = self.candidates[state % n];
            let (first, second) = if first <= second {
                (first, second)
            } else {
                (second, first)
            };
            path.push(PathNode {
                range,
                first,
                second: Some(second),
            });
            if step > 0 {
                state = parents[step - 1][state] as usize;
            }
        }
        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::counts::ReadMappingCounts;
    use crate::data::gamete::SampleGamete;
    use crate::data::graph::{HapAssignment, HaplotypeGraph};
    use crate::data::range::ReferenceRange;

    /// Two ranges; gamete X carries hX in both, gamete Y carries hY
    fn two_gamete_graph() -> HaplotypeGraph {
        let mut records = Vec::new();
        for (start, end, hap, sample) in [
            (0u32, 1000u32, "r1hX", "X"),
            (0, 1000, "r1hY", "Y"),
            (1000, 2000, "r2hX", "X"),
            (1000, 2000, "r2hY", "Y"),
        ] {
            records.push(HapAssignment {
                range: ReferenceRange::new("chr1", start, end),
                hap: hap.into(),
                gamete: SampleGamete::new(sample, 0),
            });
        }
        HaplotypeGraph::from_assignments(records).unwrap()
    }

    fn gamete(graph: &HaplotypeGraph, sample: &str) -> GameteIdx {
        graph
            .gametes()
            .index_of(&SampleGamete::new(sample, 0))
            .unwrap()
    }

    #[test]
    fn test_haploid_switch_beats_bad_emissions() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hX".into()], 10);
        counts.add_count(vec!["r2hY".into()], 10);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = HaploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();

        assert_eq!(path.len(), 2);
        assert_eq!(path[0].range, RangeIdx::new(0));
        assert_eq!(path[0].first, gamete(&graph, "X"));
        assert_eq!(path[1].range, RangeIdx::new(1));
        assert_eq!(path[1].first, gamete(&graph, "Y"));
    }

    #[test]
    fn test_haploid_stays_on_consistent_gamete() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hY".into()], 8);
        counts.add_count(vec!["r2hY".into()], 8);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = HaploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        assert!(path.iter().all(|node| node.first == gamete(&graph, "Y")));
    }

    #[test]
    fn test_empty_observations_give_empty_path() {
        let graph = two_gamete_graph();
        let observations = ReadMappingCounts::new().group_by_range(&graph).unwrap();
        let finder = HaploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        assert!(finder.find_path(&observations).unwrap().is_empty());
        let finder = DiploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        assert!(finder.find_path(&observations).unwrap().is_empty());
    }

    #[test]
    fn test_read_density_filter_skips_range() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hX".into()], 10);
        // 3000 reads over 1000 bases is 3000 reads/kb
        counts.add_count(vec!["r2hX".into()], 3000);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = HaploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].range, RangeIdx::new(0));
    }

    #[test]
    fn test_remove_equal_filter() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        // Equal support for both haplotypes of range 1
        counts.add_count(vec!["r1hX".into(), "r1hY".into()], 6);
        counts.add_count(vec!["r2hX".into()], 4);
        let observations = counts.group_by_range(&graph).unwrap();

        let params = PathParams {
            remove_equal: true,
            ..PathParams::default()
        };
        let finder = HaploidPathFinder::new(&graph, Vec::new(), params);
        let path = finder.find_path(&observations).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].range, RangeIdx::new(1));
    }

    #[test]
    fn test_diploid_calls_heterozygous_pair() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        // Both ranges show a balanced mix of X and Y evidence
        counts.add_count(vec!["r1hX".into()], 5);
        counts.add_count(vec!["r1hY".into()], 5);
        counts.add_count(vec!["r2hX".into()], 5);
        counts.add_count(vec!["r2hY".into()], 5);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = DiploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        assert_eq!(path.len(), 2);
        let x = gamete(&graph, "X");
        let y = gamete(&graph, "Y");
        for node in &path {
            assert_eq!((node.first, node.second), (x, Some(y)));
        }
    }

    #[test]
    fn test_diploid_calls_homozygous_pair() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hX".into()], 10);
        counts.add_count(vec!["r2hX".into()], 10);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = DiploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        let x = gamete(&graph, "X");
        for node in &path {
            assert_eq!((node.first, node.second), (x, Some(x)));
        }
    }

    #[test]
    fn test_path_is_in_reference_order() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hX".into()], 3);
        counts.add_count(vec!["r2hX".into()], 3);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = HaploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        assert!(path.windows(2).all(|w| w[0].range < w[1].range));
    }

    #[test]
    fn test_single_read_sample() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hX".into()], 1);
        let observations = counts.group_by_range(&graph).unwrap();

        let finder = HaploidPathFinder::new(&graph, Vec::new(), PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].first, gamete(&graph, "X"));
    }

    #[test]
    fn test_single_candidate_state_space() {
        let graph = two_gamete_graph();
        let mut counts = ReadMappingCounts::new();
        counts.add_count(vec!["r1hY".into()], 5);
        let observations = counts.group_by_range(&graph).unwrap();

        // Restricting to X forces the path onto X despite the evidence
        let finder =
            HaploidPathFinder::new(&graph, vec![gamete(&graph, "X")], PathParams::default());
        let path = finder.find_path(&observations).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].first, gamete(&graph, "X"));
    }
}
