//! Escalation sample size estimation once part of the sample has been drawn.
//!
//! Ballots already audited cannot be returned, so no candidate split may
//! fall below the drawn stratum sizes. Each candidate keeps the observed
//! counts and projects only the increment.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::config::AuditParameters;
use crate::contest::PairPopulation;
use crate::error::AuditError;
use crate::sample_size::SampleSizeEstimate;
use crate::search::{Growth, Trial, TwoPhaseSearch};
use crate::stratum::{observed_sample, projected_sample, Discrepancies};

/// What the audit has seen so far for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditState {
    /// Ballots already audited in the CVR stratum.
    pub n1: u64,
    /// Ballots already polled in the no-CVR stratum.
    pub n2: u64,
    pub discrepancies: Discrepancies,
    /// Winner votes in the no-CVR sample.
    pub nocvr_winner: u64,
    /// Loser votes in the no-CVR sample.
    pub nocvr_loser: u64,
}

impl AuditState {
    pub fn validate(&self, population: &PairPopulation) -> Result<(), AuditError> {
        if self.n1 > population.cvr.ballots || self.n2 > population.nocvr.ballots {
            return Err(AuditError::InvalidParameter(format!(
                "drawn sample ({}, {}) exceeds stratum sizes ({}, {})",
                self.n1, self.n2, population.cvr.ballots, population.nocvr.ballots
            )));
        }
        if self.discrepancies.total() > self.n1 {
            return Err(AuditError::InvalidParameter(format!(
                "{} discrepancies recorded in a CVR sample of {} ballots",
                self.discrepancies.total(),
                self.n1
            )));
        }
        if self.nocvr_winner.saturating_add(self.nocvr_loser) > self.n2 {
            return Err(AuditError::InvalidParameter(format!(
                "{} winner and {} loser votes recorded in a no-CVR sample of {} ballots",
                self.nocvr_winner, self.nocvr_loser, self.n2
            )));
        }
        Ok(())
    }

    pub fn total(&self) -> u64 {
        self.n1 + self.n2
    }
}

#[derive(Debug)]
pub struct EscalationSearch<'a> {
    population: PairPopulation,
    state: AuditState,
    params: &'a AuditParameters,
    collaborators: Collaborators<'a>,
    ratio: f64,
}

impl<'a> EscalationSearch<'a> {
    pub fn new(
        population: PairPopulation,
        state: AuditState,
        params: &'a AuditParameters,
        collaborators: Collaborators<'a>,
    ) -> Result<Self, AuditError> {
        params.validate()?;
        population.validate()?;
        state.validate(&population)?;
        let ratio = params.allocation_ratio(population.strata())?;
        Ok(Self {
            population,
            state,
            params,
            collaborators,
            ratio,
        })
    }

    pub fn split(&self, n: u64) -> (u64, u64) {
        self.population.strata().split(self.ratio, n)
    }

    /// Evaluate a total of `n` ballots. Splits that would shrink either
    /// stratum below its drawn size are rejected without evaluation.
    pub fn trial(&self, n: u64) -> Result<Trial, AuditError> {
        let (n1, n2) = self.split(n);
        if n1 < self.state.n1 || n2 < self.state.n2 {
            return Ok(Trial::rejected());
        }

        let increment = Discrepancies::project(&self.params.error_rates, n1 - self.state.n1);
        let discrepancies = self.state.discrepancies + increment;

        let mut polling_sample = observed_sample(
            self.state.nocvr_winner,
            self.state.nocvr_loser,
            self.state.n2,
        )?;
        polling_sample.extend(projected_sample(n2 - self.state.n2, &self.population.nocvr));

        let pvalue = self.collaborators.pair_pvalue(
            &self.population,
            self.params,
            n1,
            discrepancies,
            polling_sample,
        )?;
        debug!(n, n1, n2, pvalue, "expected escalated risk");
        Ok(Trial::evaluated(pvalue))
    }

    /// Find the smallest total at or above the drawn sample whose expected
    /// attained risk is within the risk limit.
    pub fn estimate(&self) -> Result<SampleSizeEstimate, AuditError> {
        let drawn = self.state.total();
        let search = TwoPhaseSearch {
            start: drawn,
            known_failing: drawn,
            growth: Growth::Geometric(self.params.search.escalation_growth),
            risk_limit: self.params.risk_limit,
            cap: self.population.strata().total(),
            max_trials: self.params.search.max_trials,
        };
        let outcome = search.run(|n| self.trial(n))?;
        let (n1, n2) = self.split(outcome.size);
        info!(
            n1,
            n2,
            drawn_n1 = self.state.n1,
            drawn_n2 = self.state.n2,
            attained_risk = outcome.pvalue,
            "estimated escalation sample size"
        );
        Ok(SampleSizeEstimate {
            n1,
            n2,
            attained_risk: outcome.pvalue,
            trials: outcome.trials,
        })
    }
}

/// Estimate the total sample size to escalate to for one (winner, loser)
/// pair, given what has been drawn so far.
pub fn estimate_escalation_n(
    population: PairPopulation,
    state: AuditState,
    params: &AuditParameters,
    collaborators: Collaborators<'_>,
) -> Result<SampleSizeEstimate, AuditError> {
    EscalationSearch::new(population, state, params, collaborators)?.estimate()
}
