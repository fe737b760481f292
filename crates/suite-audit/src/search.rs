//! Two-phase search for the smallest sample size meeting a risk limit.
//!
//! The growth phase enlarges the candidate until a trial passes. The
//! bisection phase then narrows the bracket between the last failing and the
//! first passing size until they are adjacent, and returns the passing end.
//! Both phases share one trial budget.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuditError;

/// How the growth phase enlarges the candidate size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Growth {
    Doubling,
    /// Multiply by the factor and round up.
    Geometric(f64),
}

impl Growth {
    /// Next candidate; always strictly larger than `n`.
    pub fn next(&self, n: u64) -> u64 {
        let grown = match self {
            Growth::Doubling => n.saturating_mul(2),
            Growth::Geometric(factor) => (n as f64 * factor).ceil() as u64,
        };
        grown.max(n.saturating_add(1))
    }
}

/// Result of evaluating one candidate size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    pub pvalue: f64,
    /// False when the candidate violates a hard constraint; such a trial
    /// never passes regardless of the risk limit.
    pub admissible: bool,
}

impl Trial {
    pub fn evaluated(pvalue: f64) -> Self {
        Self {
            pvalue,
            admissible: true,
        }
    }

    pub fn rejected() -> Self {
        Self {
            pvalue: 1.0,
            admissible: false,
        }
    }

    /// NaN never passes.
    pub fn passes(&self, risk_limit: f64) -> bool {
        self.admissible && self.pvalue <= risk_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    /// Smallest passing size found.
    pub size: u64,
    /// P-value attained at `size`.
    pub pvalue: f64,
    /// Trials evaluated across both phases.
    pub trials: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwoPhaseSearch {
    /// First size grown from. Assumed failing and never evaluated.
    pub start: u64,
    /// Largest size assumed failing when the first grown candidate passes.
    pub known_failing: u64,
    pub growth: Growth,
    pub risk_limit: f64,
    /// Candidates never exceed this size.
    pub cap: u64,
    pub max_trials: u32,
}

impl TwoPhaseSearch {
    /// Run the search with `trial` evaluating each candidate size.
    ///
    /// # Returns
    /// [`AuditError::SearchExhausted`] when the cap is reached without a
    /// passing trial or the trial budget runs out. Errors from `trial` are
    /// propagated unchanged.
    pub fn run<F>(&self, mut trial: F) -> Result<SearchOutcome, AuditError>
    where
        F: FnMut(u64) -> Result<Trial, AuditError>,
    {
        let mut trials = 0u32;
        let mut low = self.known_failing;
        let mut n = self.start;

        let passing = loop {
            if n >= self.cap {
                return Err(AuditError::SearchExhausted {
                    trials,
                    last_size: n,
                });
            }
            n = self.growth.next(n).min(self.cap);
            let result = self.attempt(&mut trial, &mut trials, n)?;
            if result.passes(self.risk_limit) {
                break result;
            }
            low = n;
        };

        let mut high = n;
        let mut pvalue = passing.pvalue;
        while high - low > 1 {
            let mid = low + (high - low) / 2;
            let result = self.attempt(&mut trial, &mut trials, mid)?;
            if result.passes(self.risk_limit) {
                high = mid;
                pvalue = result.pvalue;
            } else {
                low = mid;
            }
        }

        Ok(SearchOutcome {
            size: high,
            pvalue,
            trials,
        })
    }

    fn attempt<F>(&self, trial: &mut F, trials: &mut u32, n: u64) -> Result<Trial, AuditError>
    where
        F: FnMut(u64) -> Result<Trial, AuditError>,
    {
        if *trials >= self.max_trials {
            return Err(AuditError::SearchExhausted {
                trials: *trials,
                last_size: n,
            });
        }
        *trials += 1;
        let result = trial(n)?;
        if result.pvalue.is_nan() {
            tracing::warn!(n, "trial produced a NaN p-value; treating it as failing");
        }
        debug!(
            n,
            pvalue = result.pvalue,
            admissible = result.admissible,
            trial = *trials,
            "evaluated sample size"
        );
        Ok(result)
    }
}
