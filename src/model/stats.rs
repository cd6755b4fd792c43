//! # Log-Space Probability Primitives
//!
//! Binomial and multinomial log-probabilities for the emission models.
//! Everything is computed and combined in log-space; small factorials are
//! tabulated and larger ones use Stirling's approximation, so counts in
//! the thousands stay finite.

use std::f64::consts::PI;

/// ln(n!) for n in 0..=10
const LN_FACTORIAL: [f64; 11] = [
    0.0,
    0.0,
    0.6931471805599453,
    1.791759469228055,
    3.1780538303479458,
    4.787491742782046,
    6.579251212010101,
    8.525161361065415,
    10.60460290274525,
    12.801827480081469,
    15.104412573075516,
];

/// Natural log of n factorial
///
/// Exact for n ≤ 10; Stirling's approximation
/// `n·ln n + ½·ln(2πn) − n` beyond.
pub fn ln_factorial(n: u64) -> f64 {
    if n <= 10 {
        LN_FACTORIAL[n as usize]
    } else {
        let n = n as f64;
        n * n.ln() + 0.5 * (2.0 * PI * n).ln() - n
    }
}

/// ln of the binomial coefficient C(n, k)
pub fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// `count · ln(p)` that is exactly zero when the count is zero, even for p = 0
#[inline]
fn count_ln(count: u64, p: f64) -> f64 {
    if count == 0 {
        0.0
    } else if p <= 0.0 {
        f64::NEG_INFINITY
    } else {
        count as f64 * p.ln()
    }
}

/// ln P(X = k) for X ~ Binomial(n, p)
///
/// Degenerate probabilities are handled exactly: with p = 1 the pmf is 1
/// at k = n and 0 elsewhere.
pub fn ln_binomial_pmf(n: u64, k: u64, p: f64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_choose(n, k) + count_ln(k, p) + count_ln(n - k, 1.0 - p)
}

/// ln of the multinomial pmf for category counts and probabilities
pub fn ln_multinomial_pmf(counts: &[u64], probs: &[f64]) -> f64 {
    debug_assert_eq!(counts.len(), probs.len());
    let total: u64 = counts.iter().sum();
    let mut ln_p = ln_factorial(total);
    for (&count, &p) in counts.iter().zip(probs) {
        ln_p -= ln_factorial(count);
        ln_p += count_ln(count, p);
    }
    ln_p
}

/// Numerically stable ln(Σ exp(xᵢ))
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_factorial_table_and_stirling() {
        assert_eq!(ln_factorial(0), 0.0);
        assert!((ln_factorial(10) - 15.104412573075516).abs() < 1e-12);
        // Stirling for 20! against the exact value ln(20!) = 42.3356164608...
        assert!((ln_factorial(20) - 42.335616460753485).abs() < 1e-2);
    }

    #[test]
    fn test_binomial_pmf() {
        // Binomial(10, 0.5) at k=5 is 252/1024
        let expected = (252.0f64 / 1024.0).ln();
        assert!((ln_binomial_pmf(10, 5, 0.5) - expected).abs() < 1e-10);
        // Degenerate p = 1
        assert_eq!(ln_binomial_pmf(10, 10, 1.0), 0.0);
        assert_eq!(ln_binomial_pmf(10, 9, 1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_multinomial_reduces_to_binomial() {
        let multi = ln_multinomial_pmf(&[3, 7], &[0.2, 0.8]);
        let bino = ln_binomial_pmf(10, 3, 0.2);
        assert!((multi - bino).abs() < 1e-10);
    }

    #[test]
    fn test_log_sum_exp() {
        let values = [-1000.0, -1000.0];
        let expected = -1000.0 + 2.0f64.ln();
        assert!((log_sum_exp(&values) - expected).abs() < 1e-10);
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_multinomial_normalizes() {
        // Sum of pmf over all splits of 4 into 3 categories is 1
        let probs = [0.3, 0.5, 0.2];
        let mut terms = Vec::new();
        for a in 0..=4u64 {
            for b in 0..=(4 - a) {
                let c = 4 - a - b;
                terms.push(ln_multinomial_pmf(&[a, b, c], &probs));
            }
        }
        assert!((log_sum_exp(&terms)).abs() < 1e-9);
    }
}
