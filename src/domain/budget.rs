//! Privacy-budget ledger: cumulative epsilon accounting per scope.
//!
//! Issuing several queries against the same records composes their privacy
//! loss; a release pipeline that picks a fresh epsilon per category without
//! shared accounting silently degrades the dataset's overall guarantee.
//! Every mechanism invocation charges this ledger before drawing noise.
//!
//! # Mutex Behavior
//!
//! All entries live behind a single `Mutex`; each charge is one
//! increment-and-check critical section. A poisoned mutex fails closed by
//! returning an error: over-releasing is the failure mode to prevent.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::ports::DpError;

/// Scale factor for fixed-point epsilon arithmetic.
/// Epsilon is stored as (epsilon * EPSILON_SCALE) so repeated charges
/// accumulate exactly instead of drifting in IEEE 754.
const EPSILON_SCALE: f64 = 1_000_000_000.0;

fn scale(epsilon: f64) -> u64 {
    (epsilon * EPSILON_SCALE).round().max(0.0) as u64
}

fn unscale(scaled: u64) -> f64 {
    scaled as f64 / EPSILON_SCALE
}

#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    spent_scaled: u64,
    cap_scaled: u64,
}

/// Final spend snapshot for one scope, suitable for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSpend {
    pub scope: String,
    pub spent: f64,
    pub cap: f64,
}

/// Tracks cumulative epsilon spent per logical dataset/query scope.
///
/// Scopes are caller-defined identifiers; the ledger imposes no structure
/// on them beyond equality. Entries are created lazily with the default
/// cap, never decremented, and live for the duration of the analysis run.
#[derive(Debug)]
pub struct BudgetLedger {
    default_cap_scaled: u64,
    entries: Mutex<HashMap<String, LedgerEntry>>,
}

impl BudgetLedger {
    /// Create a ledger whose lazily-created scopes get `default_cap`.
    ///
    /// A non-finite or non-positive cap is treated as zero: every charge
    /// against such a scope fails, which is the safe direction for a
    /// misconfigured budget.
    #[must_use]
    pub fn new(default_cap: f64) -> Self {
        let cap_scaled = if default_cap.is_finite() && default_cap > 0.0 {
            scale(default_cap)
        } else {
            tracing::error!("Invalid default epsilon cap: {default_cap}; all charges will fail");
            0
        };

        Self {
            default_cap_scaled: cap_scaled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Override the cap for one scope. Takes effect for the scope's future
    /// charges; an existing spend above the new cap is kept (never
    /// decremented) and simply blocks further charges.
    ///
    /// # Errors
    /// Returns error if the ledger lock is poisoned.
    pub fn set_cap(&self, scope: &str, cap: f64) -> Result<(), DpError> {
        let cap_scaled = if cap.is_finite() && cap > 0.0 {
            scale(cap)
        } else {
            0
        };

        let mut entries = self.entries.lock().map_err(|_| DpError::LedgerUnavailable)?;
        entries
            .entry(scope.to_string())
            .and_modify(|e| e.cap_scaled = cap_scaled)
            .or_insert(LedgerEntry {
                spent_scaled: 0,
                cap_scaled,
            });
        Ok(())
    }

    /// Charge `epsilon` against `scope`.
    ///
    /// The entry is looked up (or lazily created with the default cap); if
    /// the charge would push the spend over the cap the entry is left
    /// unchanged and the failure reports the current spend for diagnosis.
    ///
    /// # Errors
    /// Returns `InvalidEpsilon` for a non-positive or non-finite epsilon,
    /// `BudgetExceeded` when the cap would be breached, and
    /// `LedgerUnavailable` on a poisoned lock.
    pub fn charge(&self, scope: &str, epsilon: f64) -> Result<(), DpError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(DpError::InvalidEpsilon(epsilon));
        }
        let requested_scaled = scale(epsilon);

        let mut entries = self.entries.lock().map_err(|_| DpError::LedgerUnavailable)?;
        let entry = entries
            .entry(scope.to_string())
            .or_insert(LedgerEntry {
                spent_scaled: 0,
                cap_scaled: self.default_cap_scaled,
            });

        if entry.cap_scaled.saturating_sub(entry.spent_scaled) < requested_scaled {
            let exceeded = DpError::BudgetExceeded {
                scope: scope.to_string(),
                requested: epsilon,
                spent: unscale(entry.spent_scaled),
                cap: unscale(entry.cap_scaled),
            };
            tracing::warn!("{exceeded}");
            return Err(exceeded);
        }

        entry.spent_scaled += requested_scaled;
        Ok(())
    }

    /// Whether a charge of `epsilon` against `scope` would currently succeed.
    #[must_use]
    pub fn can_charge(&self, scope: &str, epsilon: f64) -> bool {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return false;
        }
        let requested_scaled = scale(epsilon);
        match self.entries.lock() {
            Ok(entries) => {
                let (spent, cap) = entries
                    .get(scope)
                    .map_or((0, self.default_cap_scaled), |e| {
                        (e.spent_scaled, e.cap_scaled)
                    });
                cap.saturating_sub(spent) >= requested_scaled
            }
            Err(_) => false,
        }
    }

    /// Total epsilon spent so far for `scope` (zero for unknown scopes).
    #[must_use]
    pub fn spent(&self, scope: &str) -> f64 {
        match self.entries.lock() {
            Ok(entries) => entries.get(scope).map_or(0.0, |e| unscale(e.spent_scaled)),
            Err(_) => 0.0,
        }
    }

    /// Remaining budget for `scope` (the default cap for unknown scopes).
    #[must_use]
    pub fn remaining(&self, scope: &str) -> f64 {
        match self.entries.lock() {
            Ok(entries) => {
                let (spent, cap) = entries
                    .get(scope)
                    .map_or((0, self.default_cap_scaled), |e| {
                        (e.spent_scaled, e.cap_scaled)
                    });
                unscale(cap.saturating_sub(spent))
            }
            Err(_) => 0.0,
        }
    }

    /// Spend snapshot for every scope touched so far, sorted by scope name.
    #[must_use]
    pub fn spend_report(&self) -> Vec<ScopeSpend> {
        match self.entries.lock() {
            Ok(entries) => {
                let mut report: Vec<ScopeSpend> = entries
                    .iter()
                    .map(|(scope, e)| ScopeSpend {
                        scope: scope.clone(),
                        spent: unscale(e.spent_scaled),
                        cap: unscale(e.cap_scaled),
                    })
                    .collect();
                report.sort_by(|a, b| a.scope.cmp(&b.scope));
                report
            }
            Err(_) => Vec::new(),
        }
    }
}
