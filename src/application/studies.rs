//! The standard injury analysis battery.
//!
//! Replays the original release set (counts by injury type, severity
//! statistics, durations by age group, participation around injuries)
//! through one shared ledger, so repeated queries against the same tables
//! compose instead of each pretending to a fresh budget.

use std::sync::Arc;

use crate::application::AggregationPipeline;
use crate::domain::{BudgetLedger, GroupedRecords, PrivacyParameters, QueryKind};
use crate::ports::{DifferentialPrivacy, InjuryDataset, StudyRelease, StudyReport};
use crate::Result;

/// Ledger scope for queries over the injuries table (and its joins).
const SCOPE_INJURIES: &str = "injuries";

/// Ledger scope for queries over the appearances table.
const SCOPE_APPEARANCES: &str = "appearances";

/// Epsilons, clamp bounds and caps for the battery.
///
/// Defaults follow the original analysis settings; every field can be
/// overridden via `VEILSTAT_*` environment variables (best-effort: invalid
/// values are ignored and the default kept).
#[derive(Debug, Clone)]
pub struct StudyConfig {
    /// Epsilon for the randomized-response injury count release
    pub epsilon_injury_type: f64,

    /// Epsilon per group for severity sum/mean releases
    pub epsilon_severity: f64,

    /// Epsilon per group for the duration-by-age release
    pub epsilon_duration: f64,

    /// Epsilon per group for appearance-count releases
    pub epsilon_participation: f64,

    /// Epsilon per group for goal/assist releases
    pub epsilon_performance: f64,

    /// Clamp bounds for severity codes
    pub severity_bounds: (f64, f64),

    /// Clamp bounds for injury durations in days
    pub duration_bounds: (f64, f64),

    /// Clamp bounds for per-player appearance counts
    pub appearance_bounds: (f64, f64),

    /// Clamp bounds for per-player goal/assist tallies
    pub performance_bounds: (f64, f64),

    /// Default epsilon cap for every ledger scope
    pub epsilon_cap: f64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            epsilon_injury_type: 0.1,
            epsilon_severity: 1.0,
            epsilon_duration: 0.2,
            epsilon_participation: 0.3,
            epsilon_performance: 0.4,
            severity_bounds: (1.0, 3.0),
            duration_bounds: (0.0, 365.0),
            appearance_bounds: (0.0, 60.0),
            performance_bounds: (0.0, 30.0),
            epsilon_cap: 50.0,
        }
    }
}

impl StudyConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - VEILSTAT_DP_CAP
    /// - VEILSTAT_EPS_INJURY_TYPE
    /// - VEILSTAT_EPS_SEVERITY
    /// - VEILSTAT_EPS_DURATION
    /// - VEILSTAT_EPS_PARTICIPATION
    /// - VEILSTAT_EPS_PERFORMANCE
    #[must_use]
    pub fn from_env_or_default() -> Self {
        let mut cfg = Self::default();

        let overrides: [(&str, &mut f64); 6] = [
            ("VEILSTAT_DP_CAP", &mut cfg.epsilon_cap),
            ("VEILSTAT_EPS_INJURY_TYPE", &mut cfg.epsilon_injury_type),
            ("VEILSTAT_EPS_SEVERITY", &mut cfg.epsilon_severity),
            ("VEILSTAT_EPS_DURATION", &mut cfg.epsilon_duration),
            ("VEILSTAT_EPS_PARTICIPATION", &mut cfg.epsilon_participation),
            ("VEILSTAT_EPS_PERFORMANCE", &mut cfg.epsilon_performance),
        ];

        for (var, slot) in overrides {
            if let Ok(v) = std::env::var(var) {
                if let Ok(x) = v.trim().parse::<f64>() {
                    if x.is_finite() && x > 0.0 {
                        *slot = x;
                    }
                }
            }
        }

        cfg
    }
}

/// Runs the full battery and assembles the report.
pub struct StudyRunner<D>
where
    D: DifferentialPrivacy,
{
    pipeline: AggregationPipeline<D>,
    config: StudyConfig,
}

impl<D> StudyRunner<D>
where
    D: DifferentialPrivacy,
{
    pub fn new(privacy: Arc<D>, config: StudyConfig) -> Self {
        Self {
            pipeline: AggregationPipeline::new(privacy),
            config,
        }
    }

    /// Run every study against one shared ledger.
    ///
    /// # Errors
    /// The battery is all-or-nothing: any study failure (budget, empty
    /// group, parameters) aborts the run.
    pub fn run_all(&self, dataset: &InjuryDataset, ledger: &BudgetLedger) -> Result<StudyReport> {
        let cfg = &self.config;
        let by_type = dataset.by_injury_type();
        let by_age = dataset.by_age_group();
        let by_player = dataset.participation_by_player();

        let mut studies = Vec::new();

        studies.push(self.run_study(
            "injury_counts_by_type",
            &by_type,
            "injury_type",
            QueryKind::CategoryCount,
            cfg.epsilon_injury_type,
            cfg.severity_bounds,
            SCOPE_INJURIES,
            ledger,
        )?);
        studies.push(self.run_study(
            "total_severity_by_injury_type",
            &by_type,
            "severity",
            QueryKind::Sum,
            cfg.epsilon_severity,
            cfg.severity_bounds,
            SCOPE_INJURIES,
            ledger,
        )?);
        studies.push(self.run_study(
            "mean_severity_by_injury_type",
            &by_type,
            "severity",
            QueryKind::Mean,
            cfg.epsilon_severity,
            cfg.severity_bounds,
            SCOPE_INJURIES,
            ledger,
        )?);
        studies.push(self.run_study(
            "mean_days_injured_by_age_group",
            &by_age,
            "days_injured",
            QueryKind::Mean,
            cfg.epsilon_duration,
            cfg.duration_bounds,
            SCOPE_INJURIES,
            ledger,
        )?);

        for metric in ["appearances_before", "appearances_after"] {
            studies.push(self.run_study(
                &format!("{metric}_injury_by_player"),
                &by_player,
                metric,
                QueryKind::Sum,
                cfg.epsilon_participation,
                cfg.appearance_bounds,
                SCOPE_APPEARANCES,
                ledger,
            )?);
        }
        for metric in ["goals_before", "goals_after", "assists_before", "assists_after"] {
            studies.push(self.run_study(
                &format!("{metric}_injury_by_player"),
                &by_player,
                metric,
                QueryKind::Sum,
                cfg.epsilon_performance,
                cfg.performance_bounds,
                SCOPE_APPEARANCES,
                ledger,
            )?);
        }

        Ok(StudyReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            studies,
            budget: ledger.spend_report(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_study(
        &self,
        name: &str,
        grouped: &GroupedRecords,
        metric: &str,
        kind: QueryKind,
        epsilon: f64,
        bounds: (f64, f64),
        scope: &str,
        ledger: &BudgetLedger,
    ) -> Result<StudyRelease> {
        let params = PrivacyParameters::pure(epsilon, bounds.0, bounds.1)?;
        let results = self
            .pipeline
            .run(grouped, metric, kind, &params, ledger, scope)?;

        tracing::info!(
            "Study '{name}' ({kind}, ε={epsilon}): {} groups released, scope '{scope}' spend {:.3}",
            results.len(),
            ledger.spent(scope)
        );

        Ok(StudyRelease {
            name: name.to_string(),
            kind,
            metric: metric.to_string(),
            epsilon,
            scope: scope.to_string(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::chacha::ChaChaAdapter;
    use crate::domain::{AttrValue, Record};

    fn injury(injury_type: &str, severity: f64, days: f64, age_group: &str) -> Record {
        let mut record = Record::new();
        record
            .set("injury_type", AttrValue::text(injury_type))
            .set("severity", AttrValue::number(severity))
            .set("severity_label", AttrValue::text("minor"))
            .set("days_injured", AttrValue::number(days))
            .set("age_group", AttrValue::text(age_group));
        record
    }

    fn participation(player: &str) -> Record {
        let mut record = Record::new();
        record.set("player_id", AttrValue::text(player));
        for metric in [
            "appearances_before",
            "appearances_after",
            "goals_before",
            "goals_after",
            "assists_before",
            "assists_after",
        ] {
            record.set(metric, AttrValue::number(2.0));
        }
        record
    }

    fn sample_dataset() -> InjuryDataset {
        InjuryDataset {
            injuries: vec![
                injury("hamstring", 1.0, 10.0, "18-24"),
                injury("hamstring", 2.0, 20.0, "18-24"),
                injury("knee", 3.0, 60.0, "30-34"),
            ],
            participation: vec![participation("p1"), participation("p2")],
        }
    }

    #[test]
    fn test_battery_releases_every_study() {
        let runner = StudyRunner::new(Arc::new(ChaChaAdapter::new()), StudyConfig::default());
        let ledger = BudgetLedger::new(StudyConfig::default().epsilon_cap);

        let report = runner
            .run_all(&sample_dataset(), &ledger)
            .expect("Battery should run");

        assert_eq!(report.studies.len(), 10);
        for study in &report.studies {
            assert!(!study.results.is_empty(), "{} released nothing", study.name);
        }

        // Severity sums: hamstring 1+2=3, knee 3.
        let severity = &report.studies[1];
        assert_eq!(severity.name, "total_severity_by_injury_type");
        let raw: Vec<f64> = severity.results.iter().map(|r| r.raw_value).collect();
        assert_eq!(raw, vec![3.0, 3.0]);

        // Both scopes were charged and reported.
        assert_eq!(report.budget.len(), 2);
        assert!(ledger.spent(SCOPE_INJURIES) > 0.0);
        assert!(ledger.spent(SCOPE_APPEARANCES) > 0.0);
    }

    #[test]
    fn test_battery_respects_shared_budget() {
        let runner = StudyRunner::new(Arc::new(ChaChaAdapter::new()), StudyConfig::default());
        // Room for the count release and little else.
        let ledger = BudgetLedger::new(0.5);

        let err = runner
            .run_all(&sample_dataset(), &ledger)
            .expect_err("Cap must abort the battery");
        assert!(matches!(
            err,
            crate::VeilstatError::Privacy(crate::ports::DpError::BudgetExceeded { .. })
        ));
    }

    #[test]
    fn test_env_overrides_are_best_effort() {
        // Not set: defaults survive.
        let cfg = StudyConfig::from_env_or_default();
        assert!((cfg.epsilon_injury_type - 0.1).abs() < f64::EPSILON);
        assert!((cfg.epsilon_cap - 50.0).abs() < f64::EPSILON);
    }
}
