//! Audit parameters.
//!
//! Every field has a default, so a JSON document only needs the values that
//! differ from them:
//!
//! ```json
//! { "risk_limit": 0.1, "error_rates": { "o1": 0.001 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Expected discrepancy rates in the comparison stratum, as fractions of
/// audited ballots.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorRates {
    /// One-vote overstatements.
    pub o1: f64,
    /// Two-vote overstatements.
    pub o2: f64,
    /// One-vote understatements.
    pub u1: f64,
    /// Two-vote understatements.
    pub u2: f64,
}

/// Bounds on the sample size searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Starting point of the doubling phase; never evaluated itself.
    pub initial_sample_size: u64,
    /// Growth factor of the escalation search.
    pub escalation_growth: f64,
    /// Hard cap on risk evaluations per search.
    pub max_trials: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            initial_sample_size: 5,
            escalation_growth: 1.1,
            max_trials: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditParameters {
    pub risk_limit: f64,
    /// Error-bound inflation factor for the comparison stratum (Lindeman & Stark).
    pub gamma: f64,
    /// Grid step used by the combining function over null allocations.
    pub lambda_step: f64,
    pub error_rates: ErrorRates,
    /// Share of the sample drawn from the comparison stratum. Defaults to
    /// that stratum's share of the ballots.
    pub n_ratio: Option<f64>,
    pub search: SearchLimits,
}

impl Default for AuditParameters {
    fn default() -> Self {
        Self {
            risk_limit: 0.05,
            gamma: 1.03905,
            lambda_step: 0.05,
            error_rates: ErrorRates::default(),
            n_ratio: None,
            search: SearchLimits::default(),
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), AuditError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AuditError::InvalidParameter(format!(
            "{name} must be between 0 and 1, got {value}"
        )));
    }
    Ok(())
}

impl AuditParameters {
    /// Parse parameters from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        let params: Self = serde_json::from_str(json).map_err(|e| {
            AuditError::InvalidParameter(format!("malformed audit parameters: {e}"))
        })?;
        params.validate()?;
        Ok(params)
    }

    /// Check the parameter contract. Violations are fatal.
    pub fn validate(&self) -> Result<(), AuditError> {
        check_unit("risk_limit", self.risk_limit)?;
        if self.lambda_step.is_nan() || self.lambda_step <= 0.0 {
            return Err(AuditError::InvalidParameter(format!(
                "lambda_step must be a positive number, got {}",
                self.lambda_step
            )));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(AuditError::InvalidParameter(format!(
                "gamma must be a positive number, got {}",
                self.gamma
            )));
        }
        let rates = &self.error_rates;
        for (name, rate) in [
            ("o1_rate", rates.o1),
            ("o2_rate", rates.o2),
            ("u1_rate", rates.u1),
            ("u2_rate", rates.u2),
        ] {
            check_unit(name, rate)?;
        }
        if let Some(ratio) = self.n_ratio {
            check_unit("n_ratio", ratio)?;
        }
        if self.search.initial_sample_size == 0 {
            return Err(AuditError::InvalidParameter(
                "initial_sample_size must be positive".into(),
            ));
        }
        let growth = self.search.escalation_growth;
        if growth.is_nan() || growth <= 1.0 {
            return Err(AuditError::InvalidParameter(format!(
                "escalation_growth must exceed 1, got {growth}"
            )));
        }
        if self.search.max_trials == 0 {
            return Err(AuditError::InvalidParameter(
                "max_trials must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Share of the sample allocated to the comparison stratum.
    pub fn allocation_ratio(&self, strata: StratumSizes) -> Result<f64, AuditError> {
        if let Some(ratio) = self.n_ratio {
            return Ok(ratio);
        }
        let total = strata.total();
        if total == 0 {
            return Err(AuditError::InvalidParameter(
                "cannot allocate a sample over two empty strata".into(),
            ));
        }
        Ok(strata.cvr as f64 / total as f64)
    }
}

/// Ballots cast in the comparison (CVR) and polling (no-CVR) strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumSizes {
    pub cvr: u64,
    pub nocvr: u64,
}

impl StratumSizes {
    pub fn new(cvr: u64, nocvr: u64) -> Self {
        Self { cvr, nocvr }
    }

    /// Build from an untyped list, which must hold exactly two strata.
    pub fn from_slice(sizes: &[u64]) -> Result<Self, AuditError> {
        match sizes {
            [cvr, nocvr] => Ok(Self::new(*cvr, *nocvr)),
            _ => Err(AuditError::InvalidParameter(format!(
                "there must be two strata, got {}",
                sizes.len()
            ))),
        }
    }

    pub fn total(&self) -> u64 {
        self.cvr + self.nocvr
    }

    /// Split `n` ballots with `n1 = ceil(ratio * n)` and `n2 = n - n1`,
    /// shifted so neither stratum is asked for more ballots than it holds.
    /// Totals above the number of ballots cast are reduced to it.
    pub fn split(&self, ratio: f64, n: u64) -> (u64, u64) {
        let n = n.min(self.total());
        let n1 = ((ratio * n as f64).ceil() as u64)
            .min(n)
            .min(self.cvr)
            .max(n.saturating_sub(self.nocvr));
        (n1, n - n1)
    }
}
