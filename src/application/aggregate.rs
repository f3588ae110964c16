//! Bounded aggregation service: exact and noisy sums/means.
//!
//! Clamps inputs into the configured bounds, computes the exact statistic,
//! charges the budget ledger, then draws calibrated Laplace noise. The
//! charge happens strictly before the draw so a rejected query never
//! consumes entropy or releases anything.

use std::sync::Arc;

use crate::domain::{
    AggregateResult, BudgetLedger, GroupKey, Mechanism, PrivacyParameters, StatKind,
};
use crate::ports::{DifferentialPrivacy, DpError};

/// Service computing paired (raw, private) bounded statistics.
pub struct BoundedAggregator<D>
where
    D: DifferentialPrivacy,
{
    privacy: Arc<D>,
}

impl<D> BoundedAggregator<D>
where
    D: DifferentialPrivacy,
{
    /// Create a new aggregator over the given noise source.
    pub fn new(privacy: Arc<D>) -> Self {
        Self { privacy }
    }

    /// Aggregate one group's values.
    ///
    /// Every input is clamped into `[lower_bound, upper_bound]` before the
    /// exact statistic; non-finite inputs are dropped with a warning. The
    /// noise sensitivity is derived from the clamp range: the full range
    /// for a sum, range/n for a mean (n is public).
    ///
    /// When `lower_bound >= 0` the statistic is semantically non-negative
    /// (counts, durations, severity codes) and the noisy release is floored
    /// at zero. The floor biases the release and is applied here, after the
    /// mechanism, never inside it.
    ///
    /// # Errors
    /// Returns `EmptyGroup` when no usable values remain, `BudgetExceeded`
    /// when the ledger refuses the charge, and parameter errors from the
    /// mechanism.
    pub fn aggregate(
        &self,
        group_key: GroupKey,
        values: &[f64],
        params: &PrivacyParameters,
        kind: StatKind,
        ledger: &BudgetLedger,
        scope: &str,
    ) -> Result<AggregateResult, DpError> {
        let clamped: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .map(|v| params.clamp(v))
            .collect();

        let dropped = values.len() - clamped.len();
        if dropped > 0 {
            tracing::warn!("Group '{group_key}': dropped {dropped} non-finite values");
        }

        let n = clamped.len();
        if n == 0 {
            return Err(DpError::EmptyGroup);
        }

        let sum: f64 = clamped.iter().sum();
        let (raw_value, sensitivity) = match kind {
            StatKind::Sum => (sum, params.range()),
            StatKind::Mean => (sum / n as f64, params.range() / n as f64),
        };

        ledger.charge(scope, params.epsilon())?;

        let noisy = self
            .privacy
            .add_laplace_noise(raw_value, sensitivity, params.epsilon())?;
        let private_value = if params.lower_bound() >= 0.0 {
            noisy.max(0.0)
        } else {
            noisy
        };

        Ok(AggregateResult {
            group_key,
            raw_value,
            private_value,
            noise_scale: sensitivity / params.epsilon(),
            mechanism: Mechanism::Laplace,
            epsilon: params.epsilon(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::chacha::ChaChaAdapter;

    fn aggregator() -> BoundedAggregator<ChaChaAdapter> {
        BoundedAggregator::new(Arc::new(ChaChaAdapter::new()))
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(2000.0);
        // Severity 5 with bounds [1, 3] contributes 3, and 0 contributes 1.
        let params = PrivacyParameters::pure(1000.0, 1.0, 3.0).expect("Should validate");

        let result = agg
            .aggregate(
                GroupKey::new("g"),
                &[1.0, 2.0, 5.0, 0.0],
                &params,
                StatKind::Sum,
                &ledger,
                "injuries",
            )
            .expect("Should aggregate");

        assert!((result.raw_value - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_large_epsilon_tracks_raw_sum() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(2000.0);
        let params = PrivacyParameters::pure(1000.0, 1.0, 3.0).expect("Should validate");

        let result = agg
            .aggregate(
                GroupKey::new("g"),
                &[1.0, 2.0, 3.0],
                &params,
                StatKind::Sum,
                &ledger,
                "injuries",
            )
            .expect("Should aggregate");

        assert!((result.raw_value - 6.0).abs() < f64::EPSILON);
        // Laplace scale is 2/1000; deviation beyond 0.5 is vanishingly rare.
        assert!((result.private_value - 6.0).abs() < 0.5);
        assert!((result.noise_scale - 0.002).abs() < 1e-12);
        assert_eq!(result.mechanism, Mechanism::Laplace);
    }

    #[test]
    fn test_mean_sensitivity_shrinks_with_group_size() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(10.0);
        let params = PrivacyParameters::pure(1.0, 0.0, 10.0).expect("Should validate");

        let result = agg
            .aggregate(
                GroupKey::new("g"),
                &[1.0, 2.0, 3.0, 4.0],
                &params,
                StatKind::Mean,
                &ledger,
                "injuries",
            )
            .expect("Should aggregate");

        assert!((result.raw_value - 2.5).abs() < f64::EPSILON);
        // Range 10 over n=4 at epsilon 1.
        assert!((result.noise_scale - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_group_fails_without_charging() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(10.0);
        let params = PrivacyParameters::pure(1.0, 1.0, 3.0).expect("Should validate");

        let err = agg
            .aggregate(
                GroupKey::new("g"),
                &[],
                &params,
                StatKind::Mean,
                &ledger,
                "injuries",
            )
            .expect_err("Empty group must fail");
        assert!(matches!(err, DpError::EmptyGroup));
        assert!((ledger.spent("injuries") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_budget_exceeded_propagates() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(0.5);
        let params = PrivacyParameters::pure(1.0, 1.0, 3.0).expect("Should validate");

        let err = agg
            .aggregate(
                GroupKey::new("g"),
                &[1.0, 2.0],
                &params,
                StatKind::Sum,
                &ledger,
                "injuries",
            )
            .expect_err("Charge must fail");
        assert!(matches!(err, DpError::BudgetExceeded { .. }));
        assert!((ledger.spent("injuries") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_negative_statistic_is_floored() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(50.0);
        // Tiny epsilon: the Laplace scale dwarfs the raw sum, so roughly
        // half the unfloored draws would be negative.
        let params = PrivacyParameters::pure(0.01, 0.0, 3.0).expect("Should validate");

        let mut floored = 0usize;
        for _ in 0..50 {
            let result = agg
                .aggregate(
                    GroupKey::new("g"),
                    &[1.0],
                    &params,
                    StatKind::Sum,
                    &ledger,
                    "injuries",
                )
                .expect("Should aggregate");
            assert!(result.private_value >= 0.0);
            if result.private_value == 0.0 {
                floored += 1;
            }
        }
        assert!(floored > 0, "Expected at least one floored release");
    }

    #[test]
    fn test_signed_bounds_skip_the_floor() {
        let agg = aggregator();
        let ledger = BudgetLedger::new(50.0);
        let params = PrivacyParameters::pure(0.01, -3.0, 3.0).expect("Should validate");

        let negative = (0..200).any(|_| {
            agg.aggregate(
                GroupKey::new("g"),
                &[0.0],
                &params,
                StatKind::Sum,
                &ledger,
                "injuries",
            )
            .expect("Should aggregate")
            .private_value
                < 0.0
        });
        assert!(negative, "Signed statistic must not be floored");
    }
}
