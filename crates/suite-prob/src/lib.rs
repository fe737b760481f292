//! Exact diluted-margin tests for risk-limiting audits.
//!
//! Hypergeometric and tri-hypergeometric tail probabilities are computed in
//! exact rational arithmetic and maximized over the unknown population split
//! allowed by a composite null hypothesis.

pub mod hypergeometric;
pub mod nuisance;
pub mod sample;
pub mod trihypergeometric;

pub use hypergeometric::{hyper_pvalue, HypergeometricParams, MarginTestError};
pub use nuisance::{MarginDistribution, NuisanceMaximizer, NuisanceMaximum};
pub use sample::{BallotOutcome, SampleTally};
pub use trihypergeometric::{trihyper_pvalue, TriHypergeometricParams};
