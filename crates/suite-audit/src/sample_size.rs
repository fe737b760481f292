//! Initial sample size estimation for a two-strata audit of one pair.

use serde::Serialize;
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::config::AuditParameters;
use crate::contest::PairPopulation;
use crate::error::AuditError;
use crate::search::{Growth, Trial, TwoPhaseSearch};
use crate::stratum::{projected_sample, Discrepancies};

/// Smallest sample found to meet the risk limit, split by stratum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleSizeEstimate {
    /// Ballots to audit in the CVR stratum.
    pub n1: u64,
    /// Ballots to poll in the no-CVR stratum.
    pub n2: u64,
    /// Attained risk expected at `n1 + n2`.
    pub attained_risk: f64,
    pub trials: u32,
}

impl SampleSizeEstimate {
    pub fn total(&self) -> u64 {
        self.n1 + self.n2
    }
}

/// Splits a total sample size across strata and evaluates the attained risk
/// expected when the audit finds the reported proportions and the expected
/// discrepancy rates.
#[derive(Debug)]
pub struct SampleSizeSearch<'a> {
    population: PairPopulation,
    params: &'a AuditParameters,
    collaborators: Collaborators<'a>,
    ratio: f64,
}

impl<'a> SampleSizeSearch<'a> {
    pub fn new(
        population: PairPopulation,
        params: &'a AuditParameters,
        collaborators: Collaborators<'a>,
    ) -> Result<Self, AuditError> {
        params.validate()?;
        population.validate()?;
        let ratio = params.allocation_ratio(population.strata())?;
        Ok(Self {
            population,
            params,
            collaborators,
            ratio,
        })
    }

    /// Share of each total assigned to the CVR stratum.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Stratum sizes for a total of `n`, never exceeding either stratum.
    pub fn split(&self, n: u64) -> (u64, u64) {
        self.population.strata().split(self.ratio, n)
    }

    /// Attained risk expected for a total sample of `n` ballots.
    pub fn attained_pvalue(&self, n: u64) -> Result<f64, AuditError> {
        let (n1, n2) = self.split(n);
        let discrepancies = Discrepancies::project(&self.params.error_rates, n1);
        let polling_sample = projected_sample(n2, &self.population.nocvr);
        let pvalue = self.collaborators.pair_pvalue(
            &self.population,
            self.params,
            n1,
            discrepancies,
            polling_sample,
        )?;
        debug!(n, n1, n2, pvalue, "expected attained risk");
        Ok(pvalue)
    }

    /// Find the smallest total sample size whose expected attained risk is
    /// within the risk limit.
    ///
    /// # Returns
    /// [`AuditError::SearchExhausted`] when no size up to the total number
    /// of ballots suffices or the trial budget runs out.
    pub fn estimate(&self) -> Result<SampleSizeEstimate, AuditError> {
        let search = TwoPhaseSearch {
            start: self.params.search.initial_sample_size,
            known_failing: 0,
            growth: Growth::Doubling,
            risk_limit: self.params.risk_limit,
            cap: self.population.strata().total(),
            max_trials: self.params.search.max_trials,
        };
        let outcome = search.run(|n| self.attained_pvalue(n).map(Trial::evaluated))?;
        let (n1, n2) = self.split(outcome.size);
        info!(
            n1,
            n2,
            attained_risk = outcome.pvalue,
            trials = outcome.trials,
            "estimated initial sample size"
        );
        Ok(SampleSizeEstimate {
            n1,
            n2,
            attained_risk: outcome.pvalue,
            trials: outcome.trials,
        })
    }
}

/// Estimate the initial sample size for one (winner, loser) pair.
pub fn estimate_n(
    population: PairPopulation,
    params: &AuditParameters,
    collaborators: Collaborators<'_>,
) -> Result<SampleSizeEstimate, AuditError> {
    SampleSizeSearch::new(population, params, collaborators)?.estimate()
}
