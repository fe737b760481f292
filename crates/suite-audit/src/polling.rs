//! Ballot-polling test built on the exact tri-hypergeometric distribution.

use suite_prob::{MarginDistribution, NuisanceMaximizer, SampleTally};

use crate::collaborators::{PollingInput, PollingTest};
use crate::error::AuditError;

/// Worst-case tri-hypergeometric p-value over every population whose
/// winner-minus-loser total is at most the null margin.
///
/// The null margin is rounded down to an integer. The risk limit and the
/// reported totals do not enter the test.
#[derive(Debug, Clone)]
pub struct TriHypergeometricPolling {
    maximizer: NuisanceMaximizer,
}

impl TriHypergeometricPolling {
    pub fn new() -> Self {
        Self::with_maximizer(NuisanceMaximizer::new(MarginDistribution::TriHypergeometric))
    }

    pub fn with_maximizer(maximizer: NuisanceMaximizer) -> Self {
        Self { maximizer }
    }
}

impl Default for TriHypergeometricPolling {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingTest for TriHypergeometricPolling {
    fn pvalue(&self, input: &PollingInput<'_>) -> Result<f64, AuditError> {
        if !input.null_margin.is_finite() {
            return Err(AuditError::InvalidParameter(format!(
                "null margin must be finite, got {}",
                input.null_margin
            )));
        }
        let tally = SampleTally::from_outcomes(input.sample);
        let null_margin = input.null_margin.floor() as i64;
        let maximum = self
            .maximizer
            .max_pvalue(&tally, input.popsize, null_margin)?;
        Ok(maximum.pvalue)
    }
}
