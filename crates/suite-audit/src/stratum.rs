//! Per-stratum p-value functions of the null allocation, and the samples fed
//! to them.

use std::iter;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use suite_prob::BallotOutcome;

use crate::collaborators::{ComparisonInput, ComparisonTest, PollingInput, PollingTest};
use crate::config::ErrorRates;
use crate::contest::StratumVotes;
use crate::error::AuditError;

/// P-value of one stratum as a function of the share `λ` of the reported
/// margin the null hypothesis assigns to it.
pub trait StratumPValue {
    fn pvalue(&self, null_allocation: f64) -> Result<f64, AuditError>;
}

/// A stratum that has not been sampled. Its p-value is 1 for every
/// allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralStratum;

impl StratumPValue for NeutralStratum {
    fn pvalue(&self, _null_allocation: f64) -> Result<f64, AuditError> {
        Ok(1.0)
    }
}

pub struct ComparisonStratum<'a> {
    test: &'a dyn ComparisonTest,
    input: ComparisonInput,
}

impl<'a> ComparisonStratum<'a> {
    pub fn new(test: &'a dyn ComparisonTest, input: ComparisonInput) -> Self {
        Self { test, input }
    }
}

impl StratumPValue for ComparisonStratum<'_> {
    fn pvalue(&self, null_allocation: f64) -> Result<f64, AuditError> {
        self.test.pvalue(&self.input, null_allocation)
    }
}

pub struct PollingStratum<'a> {
    test: &'a dyn PollingTest,
    sample: Vec<BallotOutcome>,
    votes: StratumVotes,
    alpha: f64,
    reported_margin: i64,
}

impl<'a> PollingStratum<'a> {
    pub fn new(
        test: &'a dyn PollingTest,
        sample: Vec<BallotOutcome>,
        votes: StratumVotes,
        alpha: f64,
        reported_margin: i64,
    ) -> Self {
        Self {
            test,
            sample,
            votes,
            alpha,
            reported_margin,
        }
    }

    /// `(N_w2 - N_l2) - λ * reported_margin`.
    pub fn null_margin(&self, null_allocation: f64) -> f64 {
        (self.votes.winner as f64 - self.votes.loser as f64)
            - null_allocation * self.reported_margin as f64
    }
}

impl StratumPValue for PollingStratum<'_> {
    fn pvalue(&self, null_allocation: f64) -> Result<f64, AuditError> {
        self.test.pvalue(&PollingInput {
            sample: &self.sample,
            popsize: self.votes.ballots,
            alpha: self.alpha,
            winner_votes: self.votes.winner,
            loser_votes: self.votes.loser,
            null_margin: self.null_margin(null_allocation),
        })
    }
}

/// Discrepancy counts in the comparison stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Discrepancies {
    pub o1: u64,
    pub o2: u64,
    pub u1: u64,
    pub u2: u64,
}

impl Discrepancies {
    /// Expected counts over `n` ballots. Overstatements round up and
    /// understatements round down.
    pub fn project(rates: &ErrorRates, n: u64) -> Self {
        let n = n as f64;
        Self {
            o1: (rates.o1 * n).ceil() as u64,
            o2: (rates.o2 * n).ceil() as u64,
            u1: (rates.u1 * n).floor() as u64,
            u2: (rates.u2 * n).floor() as u64,
        }
    }

    pub fn total(&self) -> u64 {
        self.o1 + self.o2 + self.u1 + self.u2
    }
}

impl Add for Discrepancies {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            o1: self.o1 + other.o1,
            o2: self.o2 + other.o2,
            u1: self.u1 + other.u1,
            u2: self.u2 + other.u2,
        }
    }
}

/// `floor(n * part / whole)` without intermediate overflow.
fn proportional(n: u64, part: u64, whole: u64) -> u64 {
    (n as u128 * part as u128 / whole as u128) as u64
}

/// Sample of size `n` in the proportions reported for the stratum: losers,
/// then winners, then undetermined ballots, each count rounded down and the
/// remainder padded with undetermined ballots.
pub fn projected_sample(n: u64, votes: &StratumVotes) -> Vec<BallotOutcome> {
    let (losers, winners) = if votes.ballots == 0 {
        (0, 0)
    } else {
        (
            proportional(n, votes.loser, votes.ballots),
            proportional(n, votes.winner, votes.ballots),
        )
    };
    outcomes(winners, losers, n)
}

/// Sample holding the observed winner and loser votes, padded with
/// undetermined ballots to size `n`.
pub fn observed_sample(winner: u64, loser: u64, n: u64) -> Result<Vec<BallotOutcome>, AuditError> {
    if winner.saturating_add(loser) > n {
        return Err(AuditError::InvalidParameter(format!(
            "sample of {n} ballots cannot hold {winner} winner and {loser} loser votes"
        )));
    }
    Ok(outcomes(winner, loser, n))
}

fn outcomes(winner: u64, loser: u64, n: u64) -> Vec<BallotOutcome> {
    let undetermined = n.saturating_sub(winner + loser);
    iter::repeat(BallotOutcome::Loser)
        .take(loser as usize)
        .chain(iter::repeat(BallotOutcome::Winner).take(winner as usize))
        .chain(iter::repeat(BallotOutcome::Undetermined).take(undetermined as usize))
        .collect()
}
