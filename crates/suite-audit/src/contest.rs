//! Reported contest totals, winners, losers and pairwise margins.
//!
//! Candidate order is semantic: candidates are ranked by total votes and ties
//! keep the order in which they were supplied, so the winner set is
//! reproducible. Pairs are visited winner-major in that order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::StratumSizes;
use crate::error::AuditError;

/// A candidate's reported votes in each stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedVotes {
    pub cvr: u64,
    pub nocvr: u64,
}

impl ReportedVotes {
    pub fn new(cvr: u64, nocvr: u64) -> Self {
        Self { cvr, nocvr }
    }

    pub fn total(&self) -> u64 {
        self.cvr + self.nocvr
    }
}

/// Winner votes, loser votes and ballots cast in one stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumVotes {
    pub winner: u64,
    pub loser: u64,
    pub ballots: u64,
}

impl StratumVotes {
    pub fn new(winner: u64, loser: u64, ballots: u64) -> Self {
        Self {
            winner,
            loser,
            ballots,
        }
    }
}

/// Reported totals for one (winner, loser) pair across both strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairPopulation {
    pub cvr: StratumVotes,
    pub nocvr: StratumVotes,
}

impl PairPopulation {
    pub fn new(cvr: StratumVotes, nocvr: StratumVotes) -> Self {
        Self { cvr, nocvr }
    }

    /// `(N_w1 + N_w2) - (N_l1 + N_l2)`.
    pub fn reported_margin(&self) -> i64 {
        (self.cvr.winner + self.nocvr.winner) as i64 - (self.cvr.loser + self.nocvr.loser) as i64
    }

    pub fn strata(&self) -> StratumSizes {
        StratumSizes::new(self.cvr.ballots, self.nocvr.ballots)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        for (name, stratum) in [("CVR", &self.cvr), ("no-CVR", &self.nocvr)] {
            if stratum.winner + stratum.loser > stratum.ballots {
                return Err(AuditError::InvalidParameter(format!(
                    "{name} stratum has {} winner and {} loser votes but only {} ballots",
                    stratum.winner, stratum.loser, stratum.ballots
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Contest {
    candidates: IndexMap<String, ReportedVotes>,
    winners: Vec<String>,
    losers: Vec<String>,
    margins: IndexMap<(String, String), i64>,
    strata: StratumSizes,
}

impl Contest {
    /// Rank candidates and derive winners, losers and pairwise margins.
    ///
    /// # Parameters
    /// - `candidates`: Reported votes per candidate, in canonical order.
    /// - `num_winners`: Number of reported winners.
    /// - `strata`: Ballots cast in each stratum.
    ///
    /// # Returns
    /// [`AuditError::InvalidParameter`] when the number of winners is not in
    /// `1..=candidates` or the reported votes exceed a stratum's ballots.
    pub fn new(
        mut candidates: IndexMap<String, ReportedVotes>,
        num_winners: usize,
        strata: StratumSizes,
    ) -> Result<Self, AuditError> {
        if num_winners == 0 || num_winners > candidates.len() {
            return Err(AuditError::InvalidParameter(format!(
                "invalid number of winners {num_winners} for {} candidates",
                candidates.len()
            )));
        }
        let cvr_votes: u64 = candidates.values().map(|v| v.cvr).sum();
        let nocvr_votes: u64 = candidates.values().map(|v| v.nocvr).sum();
        if cvr_votes > strata.cvr || nocvr_votes > strata.nocvr {
            return Err(AuditError::InvalidParameter(format!(
                "reported votes ({cvr_votes}, {nocvr_votes}) exceed stratum sizes ({}, {})",
                strata.cvr, strata.nocvr
            )));
        }

        // Stable: ties keep input order.
        candidates.sort_by(|_, a, _, b| b.total().cmp(&a.total()));

        let names: Vec<String> = candidates.keys().cloned().collect();
        let (winners, losers) = names.split_at(num_winners);
        let (winners, losers) = (winners.to_vec(), losers.to_vec());

        let mut margins = IndexMap::new();
        for winner in &winners {
            for loser in &losers {
                let margin = candidates[winner].total() as i64 - candidates[loser].total() as i64;
                margins.insert((winner.clone(), loser.clone()), margin);
            }
        }
        margins.sort_by(|_, a, _, b| b.cmp(a));

        Ok(Self {
            candidates,
            winners,
            losers,
            margins,
            strata,
        })
    }

    /// Candidates ranked by total votes.
    pub fn candidates(&self) -> &IndexMap<String, ReportedVotes> {
        &self.candidates
    }

    pub fn winners(&self) -> &[String] {
        &self.winners
    }

    pub fn losers(&self) -> &[String] {
        &self.losers
    }

    /// Pairwise margins, largest first.
    pub fn margins(&self) -> &IndexMap<(String, String), i64> {
        &self.margins
    }

    pub fn strata(&self) -> StratumSizes {
        self.strata
    }

    /// Every (winner, loser) pair, winner-major.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.winners.iter().flat_map(move |winner| {
            self.losers
                .iter()
                .map(move |loser| (winner.as_str(), loser.as_str()))
        })
    }

    pub fn pair_population(&self, winner: &str, loser: &str) -> Result<PairPopulation, AuditError> {
        let votes = |name: &str| {
            self.candidates.get(name).copied().ok_or_else(|| {
                AuditError::InvalidParameter(format!("unknown candidate '{name}'"))
            })
        };
        let (w, l) = (votes(winner)?, votes(loser)?);
        Ok(PairPopulation::new(
            StratumVotes::new(w.cvr, l.cvr, self.strata.cvr),
            StratumVotes::new(w.nocvr, l.nocvr, self.strata.nocvr),
        ))
    }

    pub fn smallest_margin(&self) -> Option<i64> {
        self.margins.values().copied().min()
    }

    /// Smallest margin divided by all ballots cast.
    pub fn diluted_margin(&self) -> Option<f64> {
        let total = self.strata.total();
        if total == 0 {
            return None;
        }
        self.smallest_margin().map(|m| m as f64 / total as f64)
    }
}
