//! # HMM Transition Models
//!
//! Log-space transition probabilities between reference ranges. The
//! haploid model has a self probability and a uniform switch probability;
//! the diploid model works on ordered gamete pairs with an
//! inbreeding-aware category scheme, precomputed as a dense n²×n² matrix.

use crate::model::stats::log_sum_exp;

/// Haploid transitions: stay on the same gamete with `p_same`, otherwise
/// switch uniformly to one of the other `n − 1` gametes
#[derive(Clone, Copy, Debug)]
pub struct HaploidTransitions {
    n: usize,
    ln_same: f64,
    ln_switch: f64,
}

impl HaploidTransitions {
    pub fn new(p_same: f64, n: usize) -> Self {
        debug_assert!(n >= 1);
        if n == 1 {
            // A single state can only transition to itself
            Self {
                n,
                ln_same: 0.0,
                ln_switch: f64::NEG_INFINITY,
            }
        } else {
            Self {
                n,
                ln_same: p_same.ln(),
                ln_switch: ((1.0 - p_same) / (n - 1) as f64).ln(),
            }
        }
    }

    pub fn n_states(&self) -> usize {
        self.n
    }

    pub fn ln_same(&self) -> f64 {
        self.ln_same
    }

    pub fn ln_switch(&self) -> f64 {
        self.ln_switch
    }

    pub fn ln_prob(&self, from: usize, to: usize) -> f64 {
        if from == to {
            self.ln_same
        } else {
            self.ln_switch
        }
    }
}

/// Diploid transitions over ordered gamete pairs
///
/// State `s` encodes the ordered pair `(s / n, s % n)` over the candidate
/// list. From a heterozygous source the category probabilities are
/// `p_same²` / `p_same·s_h` / `s_h²` by matching-coordinate count; from a
/// homozygous source the inbreeding coefficient `f` shifts mass from
/// heterozygous targets onto homozygous ones. The category formulas are
/// renormalized per row so every source is a proper distribution.
#[derive(Clone, Debug)]
pub struct DiploidTransitions {
    n: usize,
    ln_matrix: Vec<f64>,
}

impl DiploidTransitions {
    pub fn new(p_same: f64, inbreeding: f64, n: usize) -> Self {
        debug_assert!(n >= 1);
        let n_states = n * n;
        let q = 1.0 - p_same;
        let s_h = if n > 1 { q / (n - 1) as f64 } else { 0.0 };
        let f = inbreeding;

        let mut ln_matrix = vec![f64::NEG_INFINITY; n_states * n_states];
        let mut row = vec![0.0f64; n_states];
        for src in 0..n_states {
            let (a, b) = (src / n, src % n);
            let homozygous = a == b;
            let mut sum = 0.0f64;
            for (dst, slot) in row.iter_mut().enumerate() {
                let (c, d) = (dst / n, dst % n);
                let prob = if homozygous {
                    if c == a && d == a {
                        p_same * p_same
                    } else if c == d {
                        inbred_double(p_same, s_h, f)
                    } else if c == a || d == a {
                        (1.0 - f) * p_same * s_h
                    } else {
                        (1.0 - f) * s_h * s_h
                    }
                } else {
                    match (c == a) as u8 + (d == b) as u8 {
                        2 => p_same * p_same,
                        1 => p_same * s_h,
                        _ => s_h * s_h,
                    }
                };
                *slot = prob;
                sum += prob;
            }
            for (dst, &prob) in row.iter().enumerate() {
                ln_matrix[src * n_states + dst] = (prob / sum).ln();
            }
        }

        Self { n, ln_matrix }
    }

    /// Number of ordered-pair states
    pub fn n_states(&self) -> usize {
        self.n * self.n
    }

    pub fn ln_prob(&self, from: usize, to: usize) -> f64 {
        self.ln_matrix[from * self.n_states() + to]
    }
}

/// Homozygous source → different homozygous target: an inbreeding-driven
/// joint switch or two independent switches
fn inbred_double(p_same: f64, s_h: f64, f: f64) -> f64 {
    f * p_same * s_h + (1.0 - f) * s_h * s_h
}

/// Row sums of a transition model, for validation
pub fn haploid_row_log_sums(transitions: &HaploidTransitions) -> Vec<f64> {
    let n = transitions.n_states();
    (0..n)
        .map(|src| {
            let terms: Vec<f64> = (0..n).map(|dst| transitions.ln_prob(src, dst)).collect();
            log_sum_exp(&terms)
        })
        .collect()
}

/// Row sums of the diploid matrix, for validation
pub fn diploid_row_log_sums(transitions: &DiploidTransitions) -> Vec<f64> {
    let n = transitions.n_states();
    (0..n)
        .map(|src| {
            let terms: Vec<f64> = (0..n).map(|dst| transitions.ln_prob(src, dst)).collect();
            log_sum_exp(&terms)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haploid_rows_are_distributions() {
        for n in [1usize, 2, 5, 20] {
            let transitions = HaploidTransitions::new(0.99, n);
            for sum in haploid_row_log_sums(&transitions) {
                assert!(sum.abs() < 1e-9, "row sum {sum} for n={n}");
            }
        }
    }

    #[test]
    fn test_diploid_rows_are_distributions() {
        for n in [1usize, 2, 4, 8] {
            for f in [0.0, 0.3, 1.0] {
                let transitions = DiploidTransitions::new(0.99, f, n);
                for (src, sum) in diploid_row_log_sums(&transitions).iter().enumerate() {
                    assert!(
                        sum.abs() < 1e-9,
                        "row sum {sum} for n={n}, f={f}, src={src}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_inbreeding_raises_homozygous_targets() {
        let n = 4;
        let neutral = DiploidTransitions::new(0.99, 0.0, n);
        let inbred = DiploidTransitions::new(0.99, 0.8, n);
        // From (0,0), the inbred model favors (1,1) over the neutral model
        let src = 0;
        let dst_hom = n + 1; // state (1,1)
        let dst_het = 1; // state (0,1)
        assert!(inbred.ln_prob(src, dst_hom) > neutral.ln_prob(src, dst_hom));
        assert!(inbred.ln_prob(src, dst_het) < neutral.ln_prob(src, dst_het));
    }

    #[test]
    fn test_heterozygous_source_ignores_inbreeding() {
        let n = 3;
        let a = DiploidTransitions::new(0.9, 0.0, n);
        let b = DiploidTransitions::new(0.9, 0.7, n);
        // Source (0,1): rows identical regardless of f
        let src = 1;
        for dst in 0..n * n {
            assert!((a.ln_prob(src, dst) - b.ln_prob(src, dst)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_self_transition_dominates() {
        let transitions = DiploidTransitions::new(0.99, 0.0, 5);
        for src in 0..transitions.n_states() {
            for dst in 0..transitions.n_states() {
                if dst != src {
                    assert!(transitions.ln_prob(src, src) > transitions.ln_prob(src, dst));
                }
            }
        }
    }
}
