use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarginTestError {
    #[error("Invalid parameters: population N={n}, successes K={k}, draws S={s}")]
    InvalidParams { n: u64, k: u64, s: u64 },
    #[error("Invalid sample: {winner} winner and {loser} loser votes in a sample of {size}")]
    InvalidSample { winner: u64, loser: u64, size: u64 },
    #[error(
        "Invalid population: N_w={winner}, N_l={loser} in {ballots} ballots cannot yield a sample of {sample}"
    )]
    InvalidPopulation {
        winner: u64,
        loser: u64,
        ballots: u64,
        sample: u64,
    },
}

/// Parameters for a hypergeometric distribution.
///
/// Models drawing S ballots without replacement from a population of N,
/// where K show a vote for the reported winner. X is the number of winner
/// ballots drawn.
#[derive(Debug, Clone)]
pub struct HypergeometricParams {
    /// Total population size.
    pub n: u64,
    /// Number of successes (winner votes) in the population.
    pub k: u64,
    /// Number of draws.
    pub s: u64,
}

impl HypergeometricParams {
    /// Construct validated hypergeometric parameters.
    ///
    /// # Parameters
    /// - `n`: Population size.
    /// - `k`: Number of successes in the population.
    /// - `s`: Draw count.
    ///
    /// # Returns
    /// Validated parameters or [`MarginTestError::InvalidParams`].
    pub fn new(n: u64, k: u64, s: u64) -> Result<Self, MarginTestError> {
        if k > n || s > n {
            return Err(MarginTestError::InvalidParams { n, k, s });
        }
        Ok(Self { n, k, s })
    }

    /// Minimum possible value of `X`.
    pub fn min_val(&self) -> u64 {
        (self.s + self.k).saturating_sub(self.n)
    }

    /// Maximum possible value of `X`.
    pub fn max_val(&self) -> u64 {
        std::cmp::min(self.k, self.s)
    }
}

/// Exact binomial coefficient C(n, k) using BigInt.
///
/// # Parameters
/// - `n`: Population count.
/// - `k`: Selection count.
///
/// # Returns
/// Exact integer value of `C(n, k)`, zero when `k > n`.
pub fn binomial(n: u64, k: u64) -> BigInt {
    if k > n {
        return BigInt::zero();
    }
    // Use the smaller of k and n-k for efficiency
    let k = std::cmp::min(k, n - k);
    if k == 0 {
        return BigInt::one();
    }
    let mut result = BigInt::one();
    for i in 0..k {
        result *= BigInt::from(n - i);
        result /= BigInt::from(i + 1);
    }
    result
}

/// Exact PMF: P(X = x) = C(K, x) * C(N-K, S-x) / C(N, S).
///
/// # Parameters
/// - `params`: Hypergeometric distribution parameters.
/// - `x`: Query value.
///
/// # Returns
/// Exact probability mass `P(X = x)`.
pub fn pmf(params: &HypergeometricParams, x: u64) -> BigRational {
    if x > params.k || x > params.s {
        return BigRational::zero();
    }
    if params.s - x > params.n - params.k {
        return BigRational::zero();
    }

    let numerator = binomial(params.k, x) * binomial(params.n - params.k, params.s - x);
    let denominator = binomial(params.n, params.s);

    if denominator.is_zero() {
        return BigRational::zero();
    }

    BigRational::new(numerator, denominator)
}

/// Exact survival function: P(X > b) = sum of PMF(x) for x = b+1..max_val.
///
/// # Parameters
/// - `params`: Hypergeometric distribution parameters.
/// - `b`: Threshold value.
///
/// # Returns
/// Exact tail probability `P(X > b)`.
pub fn survival(params: &HypergeometricParams, b: u64) -> BigRational {
    let max_val = params.max_val();
    let mut result = BigRational::zero();
    for x in (b + 1)..=max_val {
        result += pmf(params, x);
    }
    result
}

fn two_candidate_params(
    w: u64,
    l: u64,
    n_w: u64,
    n_l: u64,
) -> Result<HypergeometricParams, MarginTestError> {
    let draws = w + l;
    HypergeometricParams::new(n_w + n_l, n_w, draws).map_err(|_| {
        MarginTestError::InvalidPopulation {
            winner: n_w,
            loser: n_l,
            ballots: n_w + n_l,
            sample: draws,
        }
    })
}

/// Hypergeometric diluted-margin test of `H0: N_w - N_l <= c`.
///
/// Only the `N_w + N_l` ballots with a vote for either candidate form the
/// population; the sample is the `n = w + l` such ballots observed. The
/// p-value is `P(X >= w)`, read off the survival function at `w - 1`.
///
/// # Parameters
/// - `w`, `l`: Winner and loser votes in the sample.
/// - `n_w`, `n_l`: Winner and loser totals in the population under the null.
///
/// # Returns
/// Exact p-value, or [`MarginTestError::InvalidPopulation`] when the sample
/// cannot be drawn from `n_w + n_l` ballots.
pub fn diluted_margin_pvalue(
    w: u64,
    l: u64,
    n_w: u64,
    n_l: u64,
) -> Result<BigRational, MarginTestError> {
    let params = two_candidate_params(w, l, n_w, n_l)?;
    if w == 0 {
        return Ok(BigRational::one());
    }
    Ok(survival(&params, w - 1))
}

/// Same test as [`diluted_margin_pvalue`], evaluated by enumerating every
/// sample `(ww, ll)` with `ww + ll = n` whose margin is at least the observed
/// `w - l` and summing the point masses at `ww`.
pub fn diluted_margin_pvalue_enumerated(
    w: u64,
    l: u64,
    n_w: u64,
    n_l: u64,
) -> Result<BigRational, MarginTestError> {
    let params = two_candidate_params(w, l, n_w, n_l)?;
    let threshold = w as i64 - l as i64;
    let draws = params.s;
    let mut pvalue = BigRational::zero();
    for ww in 0..=draws {
        let ll = draws - ww;
        if ww as i64 - ll as i64 >= threshold {
            pvalue += pmf(&params, ww);
        }
    }
    Ok(pvalue)
}

/// Floating-point hypergeometric diluted-margin p-value, rounded up.
pub fn hyper_pvalue(w: u64, l: u64, n_w: u64, n_l: u64) -> Result<f64, MarginTestError> {
    diluted_margin_pvalue(w, l, n_w, n_l).map(|p| rational_to_f64_ceil(&p))
}

/// Convert a probability held as a BigRational to f64, rounding UP.
///
/// Numerator and denominator are rescaled by a power of two before the
/// division so that ratios of binomials with thousands of digits convert
/// without overflow. Results are clamped to `[0, 1]`.
pub fn rational_to_f64_ceil(r: &BigRational) -> f64 {
    if !r.is_positive() {
        return 0.0;
    }
    let numer = r.numer();
    let denom = r.denom();

    // Scale so the integer quotient carries 64 significant bits.
    let shift = denom.bits() as i64 - numer.bits() as i64 + 64;
    let quotient = if shift >= 0 {
        (numer.clone() << shift as usize) / denom
    } else {
        numer / (denom.clone() << shift.unsigned_abs() as usize)
    };
    let mantissa = quotient.to_f64().unwrap_or(f64::INFINITY);
    let exponent = i32::try_from(shift).unwrap_or(i32::MAX);
    let result = mantissa * 2f64.powi(-exponent);

    if result == 0.0 {
        // Very small positive number
        return f64::MIN_POSITIVE;
    }
    next_up(result).min(1.0)
}

/// Approximate next representable f64 above x (rounding up).
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == f64::NEG_INFINITY {
        return f64::MIN;
    }
    let bits = x.to_bits();
    let next_bits = if x >= 0.0 { bits + 1 } else { bits - 1 };
    f64::from_bits(next_bits)
}
