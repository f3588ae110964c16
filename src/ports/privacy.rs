//! Differential Privacy port: Trait for the noise primitives.
//!
//! This trait abstracts the noise source from the aggregation logic.

use crate::domain::GroupKey;

/// Errors that can occur during differential privacy operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DpError {
    #[error("Invalid epsilon: {0}")]
    InvalidEpsilon(f64),

    #[error("Invalid delta: {0}")]
    InvalidDelta(f64),

    #[error("Invalid sensitivity: {0}")]
    InvalidSensitivity(f64),

    #[error("Invalid clamp bounds: [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("Category space has {0} distinct members, need at least 2")]
    CategorySpaceTooSmall(usize),

    #[error("Cannot aggregate an empty group")]
    EmptyGroup,

    #[error(
        "Privacy budget exceeded for scope '{scope}': requested {requested}, spent {spent} of cap {cap}"
    )]
    BudgetExceeded {
        scope: String,
        requested: f64,
        spent: f64,
        cap: f64,
    },

    #[error("DP RNG unavailable")]
    RngUnavailable,

    #[error("Budget ledger unavailable")]
    LedgerUnavailable,
}

/// Trait for differential privacy noise primitives.
///
/// Implementations provide the raw mechanisms; budget accounting is NOT
/// performed here. Callers charge a [`crate::domain::BudgetLedger`]
/// explicitly before drawing noise, so every epsilon spent is visible in
/// one place.
pub trait DifferentialPrivacy: Send + Sync {
    /// Add Laplace noise to a single value.
    ///
    /// Draws one sample from Laplace(0, sensitivity / epsilon) and returns
    /// `value + noise`. No clamping is applied here: clamping after noising
    /// biases the release and must be an explicit caller decision.
    ///
    /// # Arguments
    /// * `value` - The true value to protect
    /// * `sensitivity` - Maximum change from one record's data
    /// * `epsilon` - Privacy budget for this query
    ///
    /// # Errors
    /// Returns error if `sensitivity` or `epsilon` is non-positive or
    /// non-finite, or if the RNG lock is poisoned.
    fn add_laplace_noise(&self, value: f64, sensitivity: f64, epsilon: f64) -> Result<f64, DpError>;

    /// Perturb a categorical value via two-outcome randomized response.
    ///
    /// With probability `p = exp(epsilon) / (1 + exp(epsilon))` the true
    /// category is returned unchanged; otherwise a value is drawn uniformly
    /// from `category_space` excluding the true category.
    ///
    /// No debiasing is performed: tallies built on this output are biased
    /// estimators of the true frequencies, and a consumer wanting unbiased
    /// counts must correct for `p` and the uniform resampling itself.
    ///
    /// # Errors
    /// Returns error if `epsilon` is non-positive or non-finite, or if the
    /// category space holds fewer than 2 distinct members.
    fn perturb_category(
        &self,
        true_category: &GroupKey,
        category_space: &[GroupKey],
        epsilon: f64,
    ) -> Result<GroupKey, DpError>;

    /// The retention probability `exp(epsilon) / (1 + exp(epsilon))` used by
    /// [`perturb_category`](Self::perturb_category) for the given epsilon.
    fn retention_probability(&self, epsilon: f64) -> f64 {
        let e = epsilon.exp();
        e / (1.0 + e)
    }
}
