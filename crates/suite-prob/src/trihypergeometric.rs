//! Tri-hypergeometric diluted-margin test.
//!
//! The population holds `N_w` winner ballots, `N_l` loser ballots and
//! `N_u = N - N_w - N_l` ballots for neither. A sample of `n` ballots is
//! drawn without replacement and the test statistic is the sample margin
//! `w - l`. Under the null the p-value is the probability of a sample margin
//! at least as large as the one observed:
//!
//! ```text
//!   p = sum_{ww - ll >= w - l} C(N_w, ww) C(N_l, ll) C(N_u, n - ww - ll) / C(N, n)
//! ```
//!
//! Two evaluation orders are provided. They must agree exactly and are
//! cross-checked in the tests.

use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Zero};

use crate::hypergeometric::{binomial, rational_to_f64_ceil, MarginTestError};
use crate::sample::SampleTally;

/// Population composition under the null hypothesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriHypergeometricParams {
    /// Winner votes in the population, `N_w`.
    pub winner: u64,
    /// Loser votes in the population, `N_l`.
    pub loser: u64,
    /// Total ballots in the population, `N`.
    pub ballots: u64,
}

impl TriHypergeometricParams {
    /// Construct validated parameters; `N_w + N_l` may not exceed `N`.
    pub fn new(winner: u64, loser: u64, ballots: u64) -> Result<Self, MarginTestError> {
        match winner.checked_add(loser) {
            Some(votes) if votes <= ballots => Ok(Self {
                winner,
                loser,
                ballots,
            }),
            _ => Err(MarginTestError::InvalidPopulation {
                winner,
                loser,
                ballots,
                sample: 0,
            }),
        }
    }

    /// Ballots counting for neither candidate, `N_u`.
    pub fn undetermined(&self) -> u64 {
        self.ballots - self.winner - self.loser
    }

    fn check_sample(&self, sample: &SampleTally) -> Result<(), MarginTestError> {
        if sample.size > self.ballots {
            return Err(MarginTestError::InvalidPopulation {
                winner: self.winner,
                loser: self.loser,
                ballots: self.ballots,
                sample: sample.size,
            });
        }
        Ok(())
    }
}

/// Evaluate the p-value by scanning every `(ww, ll)` pair in `[0, n]^2` and
/// keeping those that form a feasible sample with margin `>= w - l`.
pub fn pvalue_pairwise(
    sample: &SampleTally,
    params: &TriHypergeometricParams,
) -> Result<BigRational, MarginTestError> {
    params.check_sample(sample)?;
    let n = sample.size;
    let threshold = sample.margin();
    let undetermined = params.undetermined();

    let mut total = BigInt::zero();
    for ww in 0..=n {
        for ll in 0..=n {
            if ww + ll > n || (ww as i64 - ll as i64) < threshold {
                continue;
            }
            let uu = n - ww - ll;
            if ww > params.winner || ll > params.loser || uu > undetermined {
                continue;
            }
            total += binomial(params.winner, ww)
                * binomial(params.loser, ll)
                * binomial(undetermined, uu);
        }
    }
    Ok(BigRational::new(total, binomial(params.ballots, n)))
}

/// Evaluate the p-value with the winner count fixed in the outer loop.
///
/// For each `ww` only `ll <= ww - (w - l)` can qualify, so the inner sum runs
/// over a prefix. Binomial rows are built once per call.
pub fn pvalue_by_winner(
    sample: &SampleTally,
    params: &TriHypergeometricParams,
) -> Result<BigRational, MarginTestError> {
    params.check_sample(sample)?;
    let n = sample.size;
    let threshold = sample.margin();

    let winner_row = binomial_row(params.winner, n);
    let loser_row = binomial_row(params.loser, n);
    let undetermined_row = binomial_row(params.undetermined(), n);

    let lowest = threshold.max(0) as u64;
    let mut total = BigInt::zero();
    for ww in lowest..=n.min(params.winner) {
        let widest = ((ww as i64 - threshold) as u64).min(n - ww);
        let mut inner = BigInt::zero();
        for ll in 0..=widest {
            inner += &loser_row[ll as usize] * &undetermined_row[(n - ww - ll) as usize];
        }
        total += inner * &winner_row[ww as usize];
    }
    Ok(BigRational::new(total, binomial(params.ballots, n)))
}

/// `[C(population, 0), ..., C(population, len)]`, with zeros past `population`.
fn binomial_row(population: u64, len: u64) -> Vec<BigInt> {
    let mut row = Vec::with_capacity(len as usize + 1);
    let mut current = BigInt::one();
    row.push(current.clone());
    for k in 0..len {
        current = current * BigInt::from(population.saturating_sub(k)) / BigInt::from(k + 1);
        row.push(current.clone());
    }
    row
}

/// Floating-point tri-hypergeometric diluted-margin p-value, rounded up.
///
/// # Parameters
/// - `w`, `l`: Winner and loser votes in the sample.
/// - `n`: Sample size, including undetermined ballots.
/// - `n_w`, `n_l`: Winner and loser totals in the population under the null.
/// - `ballots`: Population size `N`.
pub fn trihyper_pvalue(
    w: u64,
    l: u64,
    n: u64,
    n_w: u64,
    n_l: u64,
    ballots: u64,
) -> Result<f64, MarginTestError> {
    let sample = SampleTally::new(w, l, n)?;
    let params = TriHypergeometricParams::new(n_w, n_l, ballots)?;
    pvalue_by_winner(&sample, &params).map(|p| rational_to_f64_ceil(&p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn both(w: u64, l: u64, n: u64, n_w: u64, n_l: u64, ballots: u64) -> (BigRational, BigRational) {
        let sample = SampleTally::new(w, l, n).unwrap();
        let params = TriHypergeometricParams::new(n_w, n_l, ballots).unwrap();
        (
            pvalue_pairwise(&sample, &params).unwrap(),
            pvalue_by_winner(&sample, &params).unwrap(),
        )
    }

    #[test]
    fn balanced_population_example() {
        // (1,0,2) -> 2, (2,0,1) -> 2, (2,1,0) -> 2, (3,0,0) -> 0; C(6,3) = 20
        let (pairwise, by_winner) = both(2, 1, 3, 2, 2, 6);
        assert_eq!(pairwise, ratio(6, 20));
        assert_eq!(by_winner, ratio(6, 20));
        let p = trihyper_pvalue(2, 1, 3, 2, 2, 6).unwrap();
        assert!((p - 0.3).abs() < 1e-12);
    }

    #[test]
    fn winner_heavy_population_example() {
        // (3,0) -> 10*1*1, (4,0) -> 5*1*2, (4,1) -> 5*2*1, (5,0) -> 1; C(9,5) = 126
        let (pairwise, by_winner) = both(4, 1, 5, 5, 2, 9);
        let expected = ratio(10 + 10 + 10 + 1, 126);
        assert_eq!(pairwise, expected);
        assert_eq!(by_winner, expected);
    }

    #[test]
    fn no_feasible_pair_gives_zero() {
        // A margin of 3 needs three winner ballots; the population has two.
        let (pairwise, by_winner) = both(3, 0, 3, 2, 2, 6);
        assert_eq!(pairwise, BigRational::zero());
        assert_eq!(by_winner, BigRational::zero());
    }

    #[test]
    fn all_loser_sample_is_certain() {
        // Every sample has margin >= -n.
        let (pairwise, by_winner) = both(0, 4, 4, 3, 5, 10);
        assert_eq!(pairwise, BigRational::one());
        assert_eq!(by_winner, BigRational::one());
    }

    #[test]
    fn empty_sample_is_certain() {
        let (pairwise, by_winner) = both(0, 0, 0, 3, 5, 10);
        assert_eq!(pairwise, BigRational::one());
        assert_eq!(by_winner, BigRational::one());
    }

    #[test]
    fn oversized_sample_is_rejected() {
        let sample = SampleTally::new(2, 1, 7).unwrap();
        let params = TriHypergeometricParams::new(2, 2, 6).unwrap();
        assert!(pvalue_pairwise(&sample, &params).is_err());
        assert!(pvalue_by_winner(&sample, &params).is_err());
    }

    #[test]
    fn overfull_population_is_rejected() {
        assert!(TriHypergeometricParams::new(4, 3, 6).is_err());
        assert!(trihyper_pvalue(1, 0, 1, 4, 3, 6).is_err());
    }

    #[test]
    fn binomial_row_matches_binomial() {
        let row = binomial_row(7, 10);
        for (k, value) in row.iter().enumerate() {
            assert_eq!(*value, binomial(7, k as u64), "k={k}");
        }
    }

    use proptest::prelude::*;
    use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence, RngAlgorithm};

    fn prob_proptest_config() -> ProptestConfig {
        ProptestConfig {
            cases: 64,
            source_file: Some(file!()),
            failure_persistence: Some(Box::new(FileFailurePersistence::WithSource(
                "proptest-regressions",
            ))),
            rng_algorithm: RngAlgorithm::ChaCha,
            ..ProptestConfig::default()
        }
    }

    /// Strategy producing `(w, l, n, N_w, N_l, N)` satisfying every
    /// sample/population invariant.
    fn trihyper_strategy() -> impl Strategy<Value = (u64, u64, u64, u64, u64, u64)> {
        (1u64..=40)
            .prop_flat_map(|ballots| (Just(ballots), 0..=ballots, 0..=ballots))
            .prop_flat_map(|(ballots, n_w, n)| {
                (Just(ballots), Just(n_w), 0..=(ballots - n_w), Just(n), 0..=n)
            })
            .prop_flat_map(|(ballots, n_w, n_l, n, w)| {
                (Just(ballots), Just(n_w), Just(n_l), Just(n), Just(w), 0..=(n - w))
            })
            .prop_map(|(ballots, n_w, n_l, n, w, l)| (w, l, n, n_w, n_l, ballots))
    }

    proptest! {
        #![proptest_config(prob_proptest_config())]

        /// Both enumeration orders produce the same exact rational.
        #[test]
        fn enumeration_orders_agree_exactly(
            (w, l, n, n_w, n_l, ballots) in trihyper_strategy()
        ) {
            let (pairwise, by_winner) = both(w, l, n, n_w, n_l, ballots);
            prop_assert!(
                pairwise == by_winner,
                "pairwise={pairwise} by_winner={by_winner} for \
                 w={w}, l={l}, n={n}, N_w={n_w}, N_l={n_l}, N={ballots}"
            );
        }

        /// Tri-hypergeometric p-values lie in [0, 1].
        #[test]
        fn pvalue_in_unit_interval((w, l, n, n_w, n_l, ballots) in trihyper_strategy()) {
            let (_, exact) = both(w, l, n, n_w, n_l, ballots);
            prop_assert!(exact >= BigRational::zero());
            prop_assert!(exact <= BigRational::one());
        }

        /// A larger observed margin never has a larger p-value.
        #[test]
        fn pvalue_non_increasing_in_observed_margin(
            (w, l, n, n_w, n_l, ballots) in trihyper_strategy()
        ) {
            prop_assume!(l > 0);
            let (_, base) = both(w, l, n, n_w, n_l, ballots);
            let (_, stronger) = both(w + 1, l - 1, n, n_w, n_l, ballots);
            prop_assert!(stronger <= base);
        }
    }
}
