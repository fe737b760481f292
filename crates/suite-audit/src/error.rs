use suite_prob::MarginTestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Margin test error: {0}")]
    MarginTest(#[from] MarginTestError),
    #[error("Collaborator error: {0}")]
    Collaborator(String),
    #[error("Sample size search exhausted after {trials} trials (last size tried: {last_size})")]
    SearchExhausted { trials: u32, last_size: u64 },
}
