//! ChaCha20 noise adapter: Implementation of DifferentialPrivacy.
//!
//! Provides the Laplace mechanism and two-outcome randomized response on a
//! CSPRNG. Budget accounting is NOT done here; callers charge the ledger
//! explicitly before every draw.
//!
//! # Mutex Behavior
//!
//! The RNG lives behind a `Mutex` for thread-safe access. A poisoned mutex
//! (from a panic in another thread) fails closed by returning an error:
//! releasing a statistic without its noise draw would break the privacy
//! guarantee.

use std::sync::{Arc, Mutex};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::domain::GroupKey;
use crate::ports::{DifferentialPrivacy, DpError};

/// ChaCha20-backed noise source.
///
/// # Security
///
/// - CSPRNG seeded from OS entropy; a predictable noise stream would let an
///   observer subtract the noise back out
/// - Shared safely across workers through the internal mutex, so concurrent
///   group aggregations never see correlated draws
pub struct ChaChaAdapter {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl ChaChaAdapter {
    /// Create a new adapter seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::from_entropy())),
        }
    }

    #[cfg(test)]
    fn with_test_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::from_seed(seed))),
        }
    }

    /// Sample from Laplace(0, scale) via inverse CDF.
    fn sample_laplace(&self, scale: f64) -> Result<f64, DpError> {
        let mut rng = self.rng.lock().map_err(|_| DpError::RngUnavailable)?;

        // IMPORTANT: avoid exact endpoints that would yield ln(0) => +/-inf.
        let mut u01: f64 = rng.gen(); // [0, 1)
        if u01 == 0.0 {
            u01 = f64::MIN_POSITIVE;
        }
        let u: f64 = u01 - 0.5; // (-0.5, 0.5)

        let inner: f64 = 1.0 - 2.0 * u.abs();
        Ok(-scale * u.signum() * inner.ln())
    }
}

impl Default for ChaChaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DifferentialPrivacy for ChaChaAdapter {
    fn add_laplace_noise(&self, value: f64, sensitivity: f64, epsilon: f64) -> Result<f64, DpError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            tracing::error!("Invalid epsilon: {epsilon}. Refusing to release statistic.");
            return Err(DpError::InvalidEpsilon(epsilon));
        }

        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            tracing::error!("Invalid sensitivity: {sensitivity}. Refusing to release statistic.");
            return Err(DpError::InvalidSensitivity(sensitivity));
        }

        let scale = sensitivity / epsilon;
        let noise = self.sample_laplace(scale)?;
        Ok(value + noise)
    }

    fn perturb_category(
        &self,
        true_category: &GroupKey,
        category_space: &[GroupKey],
        epsilon: f64,
    ) -> Result<GroupKey, DpError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            tracing::error!("Invalid epsilon: {epsilon}. Refusing to perturb category.");
            return Err(DpError::InvalidEpsilon(epsilon));
        }

        // Deduplicate while preserving order so uniform draws are uniform
        // over categories, not over however often each one was listed.
        let mut distinct: Vec<&GroupKey> = Vec::with_capacity(category_space.len());
        for key in category_space {
            if !distinct.contains(&key) {
                distinct.push(key);
            }
        }
        if distinct.len() < 2 {
            return Err(DpError::CategorySpaceTooSmall(distinct.len()));
        }

        let alternatives: Vec<&GroupKey> = distinct
            .iter()
            .copied()
            .filter(|k| *k != true_category)
            .collect();
        if alternatives.is_empty() {
            return Err(DpError::CategorySpaceTooSmall(1));
        }

        let p = self.retention_probability(epsilon);
        let mut rng = self.rng.lock().map_err(|_| DpError::RngUnavailable)?;

        if rng.gen::<f64>() < p {
            Ok(true_category.clone())
        } else {
            let idx = rng.gen_range(0..alternatives.len());
            Ok(alternatives[idx].clone())
        }
    }
}
