use serde::{Deserialize, Serialize};

use crate::hypergeometric::MarginTestError;

/// Outcome of a single hand-counted ballot with respect to one
/// (winner, loser) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BallotOutcome {
    /// Vote for the reported loser.
    Loser,
    /// Vote for the reported winner.
    Winner,
    /// Vote for neither candidate (other candidate, undervote, overvote).
    Undetermined,
}

/// Counts of winner, loser and undetermined ballots in a sample drawn
/// without replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleTally {
    /// Ballots showing a vote for the reported winner.
    pub winner: u64,
    /// Ballots showing a vote for the reported loser.
    pub loser: u64,
    /// Total ballots in the sample.
    pub size: u64,
}

impl SampleTally {
    /// Construct a validated tally.
    ///
    /// # Returns
    /// [`MarginTestError::InvalidSample`] when `winner + loser > size`.
    pub fn new(winner: u64, loser: u64, size: u64) -> Result<Self, MarginTestError> {
        match winner.checked_add(loser) {
            Some(votes) if votes <= size => Ok(Self {
                winner,
                loser,
                size,
            }),
            _ => Err(MarginTestError::InvalidSample {
                winner,
                loser,
                size,
            }),
        }
    }

    /// A sample that contains only winner and loser ballots.
    pub fn two_candidate(winner: u64, loser: u64) -> Self {
        Self {
            winner,
            loser,
            size: winner + loser,
        }
    }

    /// Tally a sequence of ballot outcomes.
    pub fn from_outcomes(outcomes: &[BallotOutcome]) -> Self {
        let mut tally = Self {
            winner: 0,
            loser: 0,
            size: outcomes.len() as u64,
        };
        for outcome in outcomes {
            match outcome {
                BallotOutcome::Winner => tally.winner += 1,
                BallotOutcome::Loser => tally.loser += 1,
                BallotOutcome::Undetermined => {}
            }
        }
        tally
    }

    /// Ballots in the sample that count for neither candidate.
    pub fn undetermined(&self) -> u64 {
        self.size - self.winner - self.loser
    }

    /// Observed sample margin `w - l`.
    pub fn margin(&self) -> i64 {
        self.winner as i64 - self.loser as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_from_outcomes_counts_each_kind() {
        let outcomes = [
            BallotOutcome::Winner,
            BallotOutcome::Loser,
            BallotOutcome::Undetermined,
            BallotOutcome::Winner,
        ];
        let tally = SampleTally::from_outcomes(&outcomes);
        assert_eq!(tally.winner, 2);
        assert_eq!(tally.loser, 1);
        assert_eq!(tally.size, 4);
        assert_eq!(tally.undetermined(), 1);
        assert_eq!(tally.margin(), 1);
    }

    #[test]
    fn tally_rejects_votes_beyond_sample_size() {
        assert!(SampleTally::new(3, 2, 4).is_err());
        assert!(SampleTally::new(u64::MAX, 1, u64::MAX).is_err());
        assert!(SampleTally::new(3, 1, 4).is_ok());
    }

    #[test]
    fn empty_tally_has_zero_margin() {
        let tally = SampleTally::from_outcomes(&[]);
        assert_eq!(tally.size, 0);
        assert_eq!(tally.margin(), 0);
        assert_eq!(tally.undetermined(), 0);
    }

    #[test]
    fn loser_heavy_sample_has_negative_margin() {
        let tally = SampleTally::two_candidate(1, 4);
        assert_eq!(tally.size, 5);
        assert_eq!(tally.margin(), -3);
    }
}
