//! Released aggregate types: the paired (raw, private) output of a query.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::GroupKey;

/// The mechanism that produced a private value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mechanism {
    /// Additive Laplace(0, sensitivity/epsilon) noise
    Laplace,
    /// Two-outcome randomized response over a finite category space
    RandomizedResponse,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Laplace => write!(f, "laplace"),
            Self::RandomizedResponse => write!(f, "randomized-response"),
        }
    }
}

/// Bounded statistic computed by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatKind {
    Sum,
    Mean,
}

/// Query issued against grouped records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Bounded sum of a numeric metric per group
    Sum,
    /// Bounded mean of a numeric metric per group
    Mean,
    /// Per-category tally after randomized response over the group keys
    CategoryCount,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Mean => write!(f, "mean"),
            Self::CategoryCount => write!(f, "category-count"),
        }
    }
}

/// One group's released pair of values.
///
/// Immutable after creation. `raw_value` is the exact (clamped) statistic
/// and must never leave the trust boundary; `private_value` is the release.
/// `noise_scale` lets consumers report uncertainty: the Laplace scale `b`
/// for numeric queries, the retention probability `p` for randomized
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Group this aggregate describes
    pub group_key: GroupKey,

    /// Exact statistic over the clamped inputs
    pub raw_value: f64,

    /// Differentially private counterpart
    pub private_value: f64,

    /// Laplace scale `b`, or retention probability for randomized response
    pub noise_scale: f64,

    /// Mechanism that produced `private_value`
    pub mechanism: Mechanism,

    /// Epsilon charged for this release
    pub epsilon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mechanism_display() {
        assert_eq!(Mechanism::Laplace.to_string(), "laplace");
        assert_eq!(
            Mechanism::RandomizedResponse.to_string(),
            "randomized-response"
        );
    }

    #[test]
    fn test_result_serializes() {
        let result = AggregateResult {
            group_key: GroupKey::new("minor"),
            raw_value: 4.0,
            private_value: 3.2,
            noise_scale: 2.0,
            mechanism: Mechanism::Laplace,
            epsilon: 1.0,
        };

        let json = serde_json::to_string(&result).expect("Should serialize");
        let back: AggregateResult = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(back.group_key, result.group_key);
        assert!((back.private_value - result.private_value).abs() < f64::EPSILON);
    }
}
