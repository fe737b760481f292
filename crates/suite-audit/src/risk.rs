//! Attained risk of every (winner, loser) pair from the samples drawn.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::config::AuditParameters;
use crate::contest::Contest;
use crate::error::AuditError;
use crate::stratum::{observed_sample, Discrepancies};

/// Samples drawn in both strata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservedSample {
    /// Ballots audited in the CVR stratum.
    pub n1: u64,
    /// Ballots polled in the no-CVR stratum.
    pub n2: u64,
    pub discrepancies: Discrepancies,
    /// Votes per candidate in the no-CVR sample.
    pub poll: IndexMap<String, u64>,
}

impl ObservedSample {
    fn poll_votes(&self, candidate: &str) -> Result<u64, AuditError> {
        self.poll.get(candidate).copied().ok_or_else(|| {
            AuditError::InvalidParameter(format!(
                "no polled vote count for candidate '{candidate}'"
            ))
        })
    }
}

/// Compute the attained risk of each pair, keyed `(winner, loser)` in
/// winner-major order. The contest is confirmed when every value is within
/// the risk limit.
pub fn audit_contest(
    contest: &Contest,
    observed: &ObservedSample,
    params: &AuditParameters,
    collaborators: Collaborators<'_>,
) -> Result<IndexMap<(String, String), f64>, AuditError> {
    params.validate()?;
    let strata = contest.strata();
    if observed.n1 > strata.cvr || observed.n2 > strata.nocvr {
        return Err(AuditError::InvalidParameter(format!(
            "observed sample ({}, {}) exceeds stratum sizes ({}, {})",
            observed.n1, observed.n2, strata.cvr, strata.nocvr
        )));
    }

    let mut risks = IndexMap::new();
    for (winner, loser) in contest.pairs() {
        let population = contest.pair_population(winner, loser)?;
        let sample = observed_sample(
            observed.poll_votes(winner)?,
            observed.poll_votes(loser)?,
            observed.n2,
        )?;
        let risk = collaborators.pair_pvalue(
            &population,
            params,
            observed.n1,
            observed.discrepancies,
            sample,
        )?;
        debug!(winner, loser, risk, "attained risk");
        risks.insert((winner.to_string(), loser.to_string()), risk);
    }

    let confirmed = risks.values().all(|&risk| risk <= params.risk_limit);
    info!(pairs = risks.len(), confirmed, "audited contest");
    Ok(risks)
}
