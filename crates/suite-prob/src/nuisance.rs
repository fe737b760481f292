//! Maximization of the diluted-margin p-value over the nuisance parameter.
//!
//! The composite null `N_w - N_l <= c` leaves the population winner total
//! `N_w` unknown. Substituting `N_l = N_w - c`, the p-value is maximized over
//! every integer `N_w` consistent with the sample and the population size.
//!
//! The objective is only defined on integers. Small ranges are scanned
//! exhaustively. Larger ranges use a bounded golden-section search over the
//! continuous relaxation, where every trial point `x` is evaluated at the nearest
//! integer (halves round away from zero) clamped into range; the best integer
//! found is then polished by integer hill-climbing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hypergeometric::{diluted_margin_pvalue, rational_to_f64_ceil, MarginTestError};
use crate::sample::SampleTally;
use crate::trihypergeometric::{pvalue_by_winner, TriHypergeometricParams};

const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Which exact test is maximized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginDistribution {
    /// Population restricted to winner and loser ballots.
    Hypergeometric,
    /// Population of winner, loser and undetermined ballots.
    TriHypergeometric,
}

/// Bounded 1-D maximizer over the nuisance winner total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuisanceMaximizer {
    pub distribution: MarginDistribution,
    /// Ranges with at most this many integers are scanned exhaustively.
    pub scan_limit: u64,
    /// Golden-section search stops once the bracket is narrower than this.
    pub tolerance: f64,
    /// Upper bound on golden-section iterations.
    pub max_iterations: u32,
}

/// Worst case over the composite null.
#[derive(Debug, Clone, PartialEq)]
pub struct NuisanceMaximum {
    /// Largest p-value found.
    pub pvalue: f64,
    /// Winner total `N_w` attaining it; `None` when no population is feasible.
    pub argmax: Option<u64>,
    /// Distinct integer totals evaluated.
    pub evaluations: usize,
}

impl NuisanceMaximizer {
    pub fn new(distribution: MarginDistribution) -> Self {
        Self {
            distribution,
            scan_limit: 64,
            tolerance: 0.5,
            max_iterations: 200,
        }
    }

    pub fn with_scan_limit(mut self, scan_limit: u64) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    /// Integer range of `N_w` consistent with the null margin.
    ///
    /// The lower end keeps `N_w >= w` and `N_l = N_w - c >= 0` (and, for the
    /// hypergeometric case, `N_w + N_l >= w + l`). The upper end keeps
    /// `N_u = N - N_w - N_l >= u`. Returns `None` when the range is empty.
    pub fn feasible_range(
        &self,
        sample: &SampleTally,
        popsize: u64,
        null_margin: i64,
    ) -> Option<(u64, u64)> {
        let c = null_margin;
        let mut lower = (sample.winner as i64).max(c).max(0);
        if self.distribution == MarginDistribution::Hypergeometric {
            // ceil((w + l + c) / 2); undetermined ballots are not drawn.
            let votes = (sample.winner + sample.loser) as i64;
            lower = lower.max((votes + c + 1).div_euclid(2));
        }
        let upper = (popsize as i64 - sample.undetermined() as i64 + c).div_euclid(2);
        if upper < lower {
            return None;
        }
        Some((lower as u64, upper as u64))
    }

    /// Exact test evaluated at one winner total `N_w`.
    pub fn pvalue_at(
        &self,
        sample: &SampleTally,
        popsize: u64,
        null_margin: i64,
        winner_total: u64,
    ) -> Result<f64, MarginTestError> {
        let loser_total = winner_total as i64 - null_margin;
        if loser_total < 0 {
            return Ok(0.0);
        }
        let loser_total = loser_total as u64;
        let exact = match self.distribution {
            MarginDistribution::Hypergeometric => {
                diluted_margin_pvalue(sample.winner, sample.loser, winner_total, loser_total)?
            }
            MarginDistribution::TriHypergeometric => {
                let params = TriHypergeometricParams::new(winner_total, loser_total, popsize)?;
                pvalue_by_winner(sample, &params)?
            }
        };
        Ok(rational_to_f64_ceil(&exact))
    }

    /// Maximize the p-value over every feasible winner total.
    ///
    /// # Parameters
    /// - `sample`: Observed tally.
    /// - `popsize`: Population size `N`.
    /// - `null_margin`: Largest `N_w - N_l` allowed under the null.
    ///
    /// # Returns
    /// The maximum, or `pvalue = 0` when no population satisfies the null.
    pub fn max_pvalue(
        &self,
        sample: &SampleTally,
        popsize: u64,
        null_margin: i64,
    ) -> Result<NuisanceMaximum, MarginTestError> {
        if sample.size > popsize {
            return Err(MarginTestError::InvalidPopulation {
                winner: sample.winner,
                loser: sample.loser,
                ballots: popsize,
                sample: sample.size,
            });
        }
        let Some((lower, upper)) = self.feasible_range(sample, popsize, null_margin) else {
            debug!(null_margin, popsize, "no population satisfies the null margin");
            return Ok(NuisanceMaximum {
                pvalue: 0.0,
                argmax: None,
                evaluations: 0,
            });
        };

        let mut objective = Objective {
            maximizer: self,
            sample,
            popsize,
            null_margin,
            lower,
            upper,
            cache: BTreeMap::new(),
        };

        if upper - lower < self.scan_limit {
            for winner_total in lower..=upper {
                objective.eval(winner_total)?;
            }
        } else {
            self.golden_section(&mut objective)?;
            objective.climb()?;
        }

        let (argmax, pvalue) = objective.best();
        debug!(
            lower,
            upper,
            argmax,
            pvalue,
            evaluations = objective.cache.len(),
            "maximized margin p-value over nuisance winner total"
        );
        Ok(NuisanceMaximum {
            pvalue,
            argmax: Some(argmax),
            evaluations: objective.cache.len(),
        })
    }

    fn golden_section(&self, objective: &mut Objective<'_>) -> Result<(), MarginTestError> {
        let mut a = objective.lower as f64;
        let mut b = objective.upper as f64;
        objective.eval(objective.lower)?;
        objective.eval(objective.upper)?;

        let mut c = b - INV_PHI * (b - a);
        let mut d = a + INV_PHI * (b - a);
        let mut fc = objective.eval_continuous(c)?;
        let mut fd = objective.eval_continuous(d)?;

        let mut iterations = 0;
        while b - a > self.tolerance && iterations < self.max_iterations {
            iterations += 1;
            if fc >= fd {
                b = d;
                d = c;
                fd = fc;
                c = b - INV_PHI * (b - a);
                fc = objective.eval_continuous(c)?;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + INV_PHI * (b - a);
                fd = objective.eval_continuous(d)?;
            }
        }
        Ok(())
    }
}

/// Memoized objective over integer winner totals in `[lower, upper]`.
struct Objective<'a> {
    maximizer: &'a NuisanceMaximizer,
    sample: &'a SampleTally,
    popsize: u64,
    null_margin: i64,
    lower: u64,
    upper: u64,
    cache: BTreeMap<u64, f64>,
}

impl Objective<'_> {
    fn eval(&mut self, winner_total: u64) -> Result<f64, MarginTestError> {
        if let Some(&pvalue) = self.cache.get(&winner_total) {
            return Ok(pvalue);
        }
        let pvalue = self.maximizer.pvalue_at(
            self.sample,
            self.popsize,
            self.null_margin,
            winner_total,
        )?;
        self.cache.insert(winner_total, pvalue);
        Ok(pvalue)
    }

    fn eval_continuous(&mut self, x: f64) -> Result<f64, MarginTestError> {
        let nearest = (x.round() as u64).clamp(self.lower, self.upper);
        self.eval(nearest)
    }

    /// Move from the best point to a strictly better neighbour until none is.
    fn climb(&mut self) -> Result<(), MarginTestError> {
        let (mut at, mut best) = self.best();
        loop {
            let mut moved = false;
            for neighbour in [at.checked_sub(1), at.checked_add(1)].into_iter().flatten() {
                if neighbour < self.lower || neighbour > self.upper {
                    continue;
                }
                let pvalue = self.eval(neighbour)?;
                if pvalue > best {
                    at = neighbour;
                    best = pvalue;
                    moved = true;
                    break;
                }
            }
            if !moved {
                return Ok(());
            }
        }
    }

    /// Smallest winner total attaining the largest cached p-value.
    fn best(&self) -> (u64, f64) {
        let mut best = (self.lower, f64::NEG_INFINITY);
        for (&winner_total, &pvalue) in &self.cache {
            if pvalue > best.1 {
                best = (winner_total, pvalue);
            }
        }
        best
    }
}
