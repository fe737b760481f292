#![allow(dead_code)]

use std::cell::RefCell;

use indexmap::IndexMap;
use suite_audit::{
    AuditError, BallotOutcome, CombinationRequest, CombinedPValue, CombiningFunction,
    ComparisonInput, ComparisonTest, Contest, Modulus, ModulusBuilder, ModulusParams,
    PairPopulation, PollingInput, PollingTest, ReportedVotes, StratumSizes, StratumVotes,
};

/// `min(1, (1 - margin / 2N)^n * 2^(o1 + 2 o2))`: shrinks with every clean
/// ballot and doubles with every overstated vote.
pub struct FakeComparison;

impl ComparisonTest for FakeComparison {
    fn pvalue(&self, input: &ComparisonInput, _null_lambda: f64) -> Result<f64, AuditError> {
        let per_ballot = 1.0 - input.reported_margin as f64 / (2.0 * input.ballots as f64);
        let overstated = input.discrepancies.o1 + 2 * input.discrepancies.o2;
        let p = per_ballot.powi(input.n as i32) * 2f64.powi(overstated as i32);
        Ok(p.min(1.0))
    }
}

/// `0.9^max(w - l, 0)` over the sample.
pub struct FakePolling;

impl PollingTest for FakePolling {
    fn pvalue(&self, input: &PollingInput<'_>) -> Result<f64, AuditError> {
        let margin = input
            .sample
            .iter()
            .map(|outcome| match outcome {
                BallotOutcome::Winner => 1i32,
                BallotOutcome::Loser => -1,
                BallotOutcome::Undetermined => 0,
            })
            .sum::<i32>();
        Ok(0.9f64.powi(margin.max(0)))
    }
}

/// Fisher's combination of two p-values, `q (1 - ln q)` with `q = p1 p2`,
/// maximized over an allocation grid on `[0, 1]`.
pub struct FisherCombiner;

pub fn fisher(q: f64) -> f64 {
    if q >= 1.0 {
        1.0
    } else if q <= 0.0 {
        0.0
    } else {
        q * (1.0 - q.ln())
    }
}

impl CombiningFunction for FisherCombiner {
    fn maximize(&self, request: &CombinationRequest<'_>) -> Result<CombinedPValue, AuditError> {
        let steps = (1.0 / request.stepsize).round() as usize;
        let mut best = CombinedPValue {
            max_pvalue: 0.0,
            allocation: None,
        };
        for i in 0..=steps {
            let lambda = (i as f64 * request.stepsize).min(1.0);
            let [cvr, nocvr] = request.pvalue_funs;
            let combined = fisher(cvr.pvalue(lambda)? * nocvr.pvalue(lambda)?);
            if best.allocation.is_none() || combined > best.max_pvalue {
                best = CombinedPValue {
                    max_pvalue: combined,
                    allocation: Some(lambda),
                };
            }
        }
        Ok(best)
    }
}

/// Remembers every modulus request.
#[derive(Default)]
pub struct RecordingModulus {
    pub calls: RefCell<Vec<ModulusParams>>,
}

impl ModulusBuilder for RecordingModulus {
    fn build(&self, params: &ModulusParams) -> Result<Box<dyn Modulus>, AuditError> {
        self.calls.borrow_mut().push(*params);
        Ok(Box::new(|delta: f64| delta))
    }
}

pub struct FailingComparison;

impl ComparisonTest for FailingComparison {
    fn pvalue(&self, _input: &ComparisonInput, _null_lambda: f64) -> Result<f64, AuditError> {
        Err(AuditError::Collaborator("comparison test unavailable".into()))
    }
}

/// 10,000 ballots per stratum; the winner has 5,500 and the loser 4,000
/// votes in each.
pub fn example_population() -> PairPopulation {
    PairPopulation::new(
        StratumVotes::new(5_500, 4_000, 10_000),
        StratumVotes::new(5_500, 4_000, 10_000),
    )
}

pub fn example_contest() -> Contest {
    let candidates: IndexMap<String, ReportedVotes> = [
        ("Loser", ReportedVotes::new(4_000, 4_000)),
        ("Winner", ReportedVotes::new(5_500, 5_500)),
        ("Minor", ReportedVotes::new(300, 200)),
    ]
    .into_iter()
    .map(|(name, votes)| (name.to_string(), votes))
    .collect();
    Contest::new(candidates, 1, StratumSizes::new(10_000, 10_000))
        .unwrap_or_else(|e| panic!("example contest is valid: {e}"))
}
