//! # HMM Emission Models
//!
//! Log-likelihood of one range's read observations given a gamete state.
//! Observations are counts indexed by haplotype *sets* (the haplotypes a
//! read's kmers could not distinguish). A gamete with no haplotype at the
//! range is an explicit `Absent` state, not a sentinel id.

use crate::data::graph::HapIdx;
use crate::model::stats::{ln_binomial_pmf, ln_multinomial_pmf, log_sum_exp};

/// The haplotype a gamete carries at one range, or nothing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HapAtRange {
    Present(HapIdx),
    Absent,
}

impl HapAtRange {
    pub fn from_option(hap: Option<HapIdx>) -> Self {
        match hap {
            Some(h) => Self::Present(h),
            None => Self::Absent,
        }
    }

    /// Whether an observed haplotype set contains this state's haplotype;
    /// an absent haplotype is contained in no set
    #[inline]
    fn in_set(&self, set: &[HapIdx]) -> bool {
        match self {
            Self::Present(h) => set.binary_search(h).is_ok(),
            Self::Absent => false,
        }
    }
}

/// Haploid emission: every read is either consistent with the state's
/// haplotype (probability `prob_correct`) or not
///
/// Each observed set of count `c` contributes the binomial log-pmf of an
/// all-or-nothing split: `c` correct reads when the haplotype is in the
/// set, `0` otherwise. Zero observations yield zero log-likelihood, making
/// all states equally likely locally.
pub fn haploid_emission(
    observations: &[(Vec<HapIdx>, u32)],
    hap: HapAtRange,
    prob_correct: f64,
) -> f64 {
    let mut ln_like = 0.0;
    for (set, count) in observations {
        let count = *count as u64;
        let correct = if hap.in_set(set) { count } else { 0 };
        ln_like += ln_binomial_pmf(count, correct, prob_correct);
    }
    ln_like
}

/// Diploid emission for an unordered haplotype pair
///
/// Homozygous pairs, and pairs where one side is absent ("treat null as
/// the other haplotype"), reduce to a binomial on the reads containing
/// the present haplotype. Distinct pairs partition reads into four
/// classes; reads matching both haplotypes are ambiguous and every split
/// of them is summed as a multinomial with category probabilities
/// `(p/2, p/2, 1−p)`, in log-space.
pub fn diploid_emission(
    observations: &[(Vec<HapIdx>, u32)],
    first: HapAtRange,
    second: HapAtRange,
    prob_correct: f64,
) -> f64 {
    use HapAtRange::{Absent, Present};

    let effective = match (first, second) {
        (Present(a), Present(b)) if a != b => None,
        (Present(a), _) | (_, Present(a)) => Some(Present(a)),
        (Absent, Absent) => Some(Absent),
    };
    if let Some(hap) = effective {
        // Single effective haplotype: binomial on the containing reads
        let mut total = 0u64;
        let mut containing = 0u64;
        for (set, count) in observations {
            total += *count as u64;
            if hap.in_set(set) {
                containing += *count as u64;
            }
        }
        return ln_binomial_pmf(total, containing, prob_correct);
    }

    let (Present(hap_a), Present(hap_b)) = (first, second) else {
        unreachable!("distinct-pair case requires two present haplotypes")
    };

    // Four mutually exclusive read classes
    let mut only_a = 0u64;
    let mut only_b = 0u64;
    let mut both = 0u64;
    let mut neither = 0u64;
    for (set, count) in observations {
        let count = *count as u64;
        match (Present(hap_a).in_set(set), Present(hap_b).in_set(set)) {
            (true, false) => only_a += count,
            (false, true) => only_b += count,
            (true, true) => both += count,
            (false, false) => neither += count,
        }
    }

    let half = prob_correct / 2.0;
    let probs = [half, half, 1.0 - prob_correct];
    let terms: Vec<f64> = (0..=both)
        .map(|i| ln_multinomial_pmf(&[only_a + i, only_b + both - i, neither], &probs))
        .collect();
    log_sum_exp(&terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(entries: &[(&[u32], u32)]) -> Vec<(Vec<HapIdx>, u32)> {
        entries
            .iter()
            .map(|(set, count)| (set.iter().map(|&h| HapIdx::new(h)).collect(), *count))
            .collect()
    }

    #[test]
    fn test_haploid_emission_prefers_supported_hap() {
        let observations = obs(&[(&[0], 10)]);
        let supported = haploid_emission(&observations, HapAtRange::Present(HapIdx::new(0)), 0.99);
        let unsupported = haploid_emission(&observations, HapAtRange::Present(HapIdx::new(1)), 0.99);
        assert!((supported - 10.0 * 0.99f64.ln()).abs() < 1e-10);
        assert!((unsupported - 10.0 * 0.01f64.ln()).abs() < 1e-10);
        assert!(supported > unsupported);
    }

    #[test]
    fn test_haploid_absent_matches_nothing() {
        let observations = obs(&[(&[0], 4), (&[1], 6)]);
        let absent = haploid_emission(&observations, HapAtRange::Absent, 0.99);
        assert!((absent - 10.0 * 0.01f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_zero_observations_are_neutral() {
        assert_eq!(
            haploid_emission(&[], HapAtRange::Present(HapIdx::new(0)), 0.99),
            0.0
        );
        assert_eq!(
            diploid_emission(
                &[],
                HapAtRange::Present(HapIdx::new(0)),
                HapAtRange::Present(HapIdx::new(1)),
                0.99
            ),
            0.0
        );
    }

    #[test]
    fn test_diploid_exchange_symmetry() {
        let observations = obs(&[(&[0], 5), (&[1], 3), (&[0, 1], 4), (&[2], 2)]);
        let a = HapAtRange::Present(HapIdx::new(0));
        let b = HapAtRange::Present(HapIdx::new(1));
        let ab = diploid_emission(&observations, a, b, 0.99);
        let ba = diploid_emission(&observations, b, a, 0.99);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_diploid_null_treated_as_other_haplotype() {
        let observations = obs(&[(&[0], 8), (&[1], 2)]);
        let a = HapAtRange::Present(HapIdx::new(0));
        let half_null = diploid_emission(&observations, a, HapAtRange::Absent, 0.99);
        let homozygous = diploid_emission(&observations, a, a, 0.99);
        assert!((half_null - homozygous).abs() < 1e-12);
        // 8 of 10 reads contain haplotype 0
        assert!((homozygous - ln_binomial_pmf(10, 8, 0.99)).abs() < 1e-12);
    }

    #[test]
    fn test_multinomial_split_beats_homozygous_on_het_data() {
        // {A}:5, {B}:5, {A,B}:4 strongly favors the heterozygous state
        let observations = obs(&[(&[0], 5), (&[1], 5), (&[0, 1], 4)]);
        let a = HapAtRange::Present(HapIdx::new(0));
        let b = HapAtRange::Present(HapIdx::new(1));
        let het = diploid_emission(&observations, a, b, 0.99);
        let hom = diploid_emission(&observations, a, a, 0.99);
        assert!(
            het - hom > 10.0,
            "expected >10 log-unit gap, got {}",
            het - hom
        );
        // The homozygous emission is the binomial at 9 of 14 reads
        assert!((hom - ln_binomial_pmf(14, 9, 0.99)).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_prob_correct() {
        let observations = obs(&[(&[0], 5)]);
        let a = HapAtRange::Present(HapIdx::new(0));
        // With p = 1 every matching read is certain
        assert_eq!(haploid_emission(&observations, a, 1.0), 0.0);
        assert_eq!(
            haploid_emission(&observations, HapAtRange::Present(HapIdx::new(1)), 1.0),
            f64::NEG_INFINITY
        );
    }
}
