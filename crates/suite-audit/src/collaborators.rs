//! Interfaces to the statistical procedures this crate drives but does not
//! implement: the ballot-comparison p-value, the sequential ballot-polling
//! test, the cross-stratum combining function and its continuity modulus.
//!
//! Collaborator failures surface as [`AuditError::Collaborator`] and are
//! propagated unchanged.

use suite_prob::{BallotOutcome, SampleTally};

use crate::config::AuditParameters;
use crate::contest::{PairPopulation, StratumVotes};
use crate::error::AuditError;
use crate::stratum::{
    ComparisonStratum, Discrepancies, NeutralStratum, PollingStratum, StratumPValue,
};

/// Arguments of the ballot-comparison p-value in the CVR stratum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonInput {
    /// Ballots audited in the stratum.
    pub n: u64,
    pub gamma: f64,
    pub discrepancies: Discrepancies,
    /// Reported margin between the pair across both strata.
    pub reported_margin: i64,
    /// Ballots cast in the stratum.
    pub ballots: u64,
}

pub trait ComparisonTest {
    /// P-value for the null that the stratum contributes at most
    /// `null_lambda` of the reported margin.
    fn pvalue(&self, input: &ComparisonInput, null_lambda: f64) -> Result<f64, AuditError>;
}

/// Arguments of the sequential ballot-polling test in the no-CVR stratum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingInput<'a> {
    pub sample: &'a [BallotOutcome],
    pub popsize: u64,
    pub alpha: f64,
    /// Reported winner votes in the stratum.
    pub winner_votes: u64,
    /// Reported loser votes in the stratum.
    pub loser_votes: u64,
    /// Largest winner-minus-loser total allowed under the null.
    pub null_margin: f64,
}

pub trait PollingTest {
    fn pvalue(&self, input: &PollingInput<'_>) -> Result<f64, AuditError>;
}

/// Bound on the change of the combined statistic as the null allocation
/// moves by `delta`.
pub trait Modulus {
    fn bound(&self, delta: f64) -> f64;
}

impl<F> Modulus for F
where
    F: Fn(f64) -> f64,
{
    fn bound(&self, delta: f64) -> f64 {
        self(delta)
    }
}

/// Arguments of the modulus builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulusParams {
    pub n1: u64,
    pub n2: u64,
    /// Winner ballots in the polling sample.
    pub n_w2: u64,
    /// Loser ballots in the polling sample.
    pub n_l2: u64,
    /// Ballots cast in the CVR stratum.
    pub cvr_ballots: u64,
    pub reported_margin: i64,
    pub gamma: f64,
}

pub trait ModulusBuilder {
    fn build(&self, params: &ModulusParams) -> Result<Box<dyn Modulus>, AuditError>;
}

/// Everything the combining function needs for one pair.
pub struct CombinationRequest<'a> {
    pub cvr: StratumVotes,
    pub nocvr: StratumVotes,
    /// CVR stratum first, then no-CVR.
    pub pvalue_funs: [&'a dyn StratumPValue; 2],
    /// Grid step over null allocations.
    pub stepsize: f64,
    pub modulus: &'a dyn Modulus,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedPValue {
    /// Combined p-value maximized over null allocations.
    pub max_pvalue: f64,
    /// Allocation attaining the maximum, when the combiner reports one.
    pub allocation: Option<f64>,
}

pub trait CombiningFunction {
    fn maximize(&self, request: &CombinationRequest<'_>) -> Result<CombinedPValue, AuditError>;
}

/// The collaborator set used by the searches and the risk evaluator.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub comparison: &'a dyn ComparisonTest,
    pub polling: &'a dyn PollingTest,
    pub combiner: &'a dyn CombiningFunction,
    pub modulus: &'a dyn ModulusBuilder,
}

impl<'a> Collaborators<'a> {
    pub fn new(
        comparison: &'a dyn ComparisonTest,
        polling: &'a dyn PollingTest,
        combiner: &'a dyn CombiningFunction,
        modulus: &'a dyn ModulusBuilder,
    ) -> Self {
        Self {
            comparison,
            polling,
            combiner,
            modulus,
        }
    }

    /// Attained risk for one pair: the combining function maximized over
    /// null allocations, given `n1` audited CVR ballots with `discrepancies`
    /// and the polling-stratum sample. An unsampled stratum contributes the
    /// neutral p-value 1.
    pub(crate) fn pair_pvalue(
        &self,
        population: &PairPopulation,
        params: &AuditParameters,
        n1: u64,
        discrepancies: Discrepancies,
        polling_sample: Vec<BallotOutcome>,
    ) -> Result<f64, AuditError> {
        let reported_margin = population.reported_margin();
        let tally = SampleTally::from_outcomes(&polling_sample);
        let modulus = self.modulus.build(&ModulusParams {
            n1,
            n2: tally.size,
            n_w2: tally.winner,
            n_l2: tally.loser,
            cvr_ballots: population.cvr.ballots,
            reported_margin,
            gamma: params.gamma,
        })?;

        let cvr: Box<dyn StratumPValue + 'a> = if n1 == 0 {
            Box::new(NeutralStratum)
        } else {
            Box::new(ComparisonStratum::new(
                self.comparison,
                ComparisonInput {
                    n: n1,
                    gamma: params.gamma,
                    discrepancies,
                    reported_margin,
                    ballots: population.cvr.ballots,
                },
            ))
        };
        let nocvr: Box<dyn StratumPValue + 'a> = if tally.size == 0 {
            Box::new(NeutralStratum)
        } else {
            Box::new(PollingStratum::new(
                self.polling,
                polling_sample,
                population.nocvr,
                params.risk_limit,
                reported_margin,
            ))
        };

        let request = CombinationRequest {
            cvr: population.cvr,
            nocvr: population.nocvr,
            pvalue_funs: [cvr.as_ref(), nocvr.as_ref()],
            stepsize: params.lambda_step,
            modulus: modulus.as_ref(),
            alpha: params.risk_limit,
        };
        Ok(self.combiner.maximize(&request)?.max_pvalue)
    }
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
