//! Sample size search and attained-risk evaluation for stratified
//! risk-limiting audits (SUITE).
//!
//! Ballots are split into a CVR stratum audited by ballot comparison and a
//! no-CVR stratum audited by ballot polling. Per-stratum p-values are
//! combined across allocations of the reported margin between the strata.
//! The statistical procedures themselves are supplied through the traits in
//! [`collaborators`]; [`polling::TriHypergeometricPolling`] is one exact
//! implementation of the polling test.

pub mod collaborators;
pub mod config;
pub mod contest;
pub mod error;
pub mod escalation;
pub mod polling;
pub mod risk;
pub mod sample_size;
pub mod search;
pub mod stratum;

pub use collaborators::{
    Collaborators, CombinationRequest, CombinedPValue, CombiningFunction, ComparisonInput,
    ComparisonTest, Modulus, ModulusBuilder, ModulusParams, PollingInput, PollingTest,
};
pub use config::{AuditParameters, ErrorRates, SearchLimits, StratumSizes};
pub use contest::{Contest, PairPopulation, ReportedVotes, StratumVotes};
pub use error::AuditError;
pub use escalation::{estimate_escalation_n, AuditState, EscalationSearch};
pub use polling::TriHypergeometricPolling;
pub use risk::{audit_contest, ObservedSample};
pub use sample_size::{estimate_n, SampleSizeEstimate, SampleSizeSearch};
pub use search::{Growth, SearchOutcome, Trial, TwoPhaseSearch};
pub use stratum::{
    ComparisonStratum, Discrepancies, NeutralStratum, PollingStratum, StratumPValue,
};
pub use suite_prob::BallotOutcome;
