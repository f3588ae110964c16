//! Per-metric differential privacy parameters.

use serde::{Deserialize, Serialize};

use crate::ports::DpError;

/// Configuration consumed by every mechanism invocation for one metric.
///
/// Immutable once constructed; build one instance per metric/query type.
/// `sensitivity` is the default per-record influence for direct mechanism
/// calls; the bounded aggregator derives its own sensitivity from the clamp
/// bounds instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrivacyParameters {
    /// Privacy-loss budget for one query (smaller = more private, noisier)
    epsilon: f64,

    /// Slack for approximate DP; 0 for the pure mechanisms here
    delta: f64,

    /// Maximum single-record influence on the true statistic
    sensitivity: f64,

    /// Lower clamp bound applied before the raw statistic
    lower_bound: f64,

    /// Upper clamp bound applied before the raw statistic
    upper_bound: f64,
}

impl PrivacyParameters {
    /// Create validated parameters.
    ///
    /// # Errors
    /// Returns error if `epsilon <= 0`, `delta < 0`, `sensitivity <= 0`,
    /// any field is non-finite, or `lower_bound >= upper_bound`.
    pub fn new(
        epsilon: f64,
        delta: f64,
        sensitivity: f64,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Self, DpError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(DpError::InvalidEpsilon(epsilon));
        }
        if !delta.is_finite() || delta < 0.0 {
            return Err(DpError::InvalidDelta(delta));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(DpError::InvalidSensitivity(sensitivity));
        }
        if !lower_bound.is_finite() || !upper_bound.is_finite() || lower_bound >= upper_bound {
            return Err(DpError::InvalidBounds {
                lower: lower_bound,
                upper: upper_bound,
            });
        }

        Ok(Self {
            epsilon,
            delta,
            sensitivity,
            lower_bound,
            upper_bound,
        })
    }

    /// Pure-DP parameters (`delta = 0`) with sensitivity equal to the clamp
    /// range, the common case for bounded sums.
    ///
    /// # Errors
    /// Same validation as [`new`](Self::new).
    pub fn pure(epsilon: f64, lower_bound: f64, upper_bound: f64) -> Result<Self, DpError> {
        Self::new(epsilon, 0.0, upper_bound - lower_bound, lower_bound, upper_bound)
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[must_use]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    #[must_use]
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    #[must_use]
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    #[must_use]
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    /// Width of the clamp range.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Clamp a value into `[lower_bound, upper_bound]`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower_bound, self.upper_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_parameters() {
        let params = PrivacyParameters::new(1.0, 1e-5, 1.0, 1.0, 3.0).expect("Should validate");
        assert!((params.range() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_epsilon() {
        assert!(matches!(
            PrivacyParameters::new(0.0, 0.0, 1.0, 0.0, 1.0),
            Err(DpError::InvalidEpsilon(_))
        ));
        assert!(matches!(
            PrivacyParameters::new(f64::NAN, 0.0, 1.0, 0.0, 1.0),
            Err(DpError::InvalidEpsilon(_))
        ));
    }

    #[test]
    fn test_rejects_negative_delta() {
        assert!(matches!(
            PrivacyParameters::new(1.0, -1e-9, 1.0, 0.0, 1.0),
            Err(DpError::InvalidDelta(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        assert!(matches!(
            PrivacyParameters::new(1.0, 0.0, 1.0, 3.0, 1.0),
            Err(DpError::InvalidBounds { .. })
        ));
        assert!(matches!(
            PrivacyParameters::new(1.0, 0.0, 1.0, 1.0, 1.0),
            Err(DpError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_clamp() {
        let params = PrivacyParameters::pure(1.0, 1.0, 3.0).expect("Should validate");
        assert!((params.clamp(5.0) - 3.0).abs() < f64::EPSILON);
        assert!((params.clamp(0.0) - 1.0).abs() < f64::EPSILON);
        assert!((params.clamp(2.5) - 2.5).abs() < f64::EPSILON);
    }
}
