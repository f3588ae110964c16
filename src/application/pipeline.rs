//! Aggregation pipeline: one query across all groups.
//!
//! Produces one paired (raw, private) result per group. The run is
//! all-or-nothing: a half-released set of noisy statistics with an
//! inconsistent budget has no well-defined guarantee, so the first failing
//! group aborts the query and prior results are discarded.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::BoundedAggregator;
use crate::domain::{
    AggregateResult, BudgetLedger, GroupKey, GroupedRecords, Mechanism, PrivacyParameters,
    QueryKind, StatKind,
};
use crate::ports::{DifferentialPrivacy, DpError};

/// Service running one query over grouped records.
pub struct AggregationPipeline<D>
where
    D: DifferentialPrivacy,
{
    privacy: Arc<D>,
    aggregator: BoundedAggregator<D>,
}

impl<D> AggregationPipeline<D>
where
    D: DifferentialPrivacy,
{
    /// Create a new pipeline over the given noise source.
    pub fn new(privacy: Arc<D>) -> Self {
        let aggregator = BoundedAggregator::new(Arc::clone(&privacy));
        Self { privacy, aggregator }
    }

    /// Run `kind` over every group, extracting `metric` from each record.
    ///
    /// Group iteration order is not part of the contract. For sums and
    /// means each group charges the ledger once; for category counts the
    /// whole query charges once (every record's label is perturbed locally
    /// under the same epsilon, and records are disjoint across groups).
    ///
    /// # Errors
    /// The first `EmptyGroup` or `BudgetExceeded` aborts the run; prior
    /// groups' results are discarded, not returned.
    pub fn run(
        &self,
        grouped: &GroupedRecords,
        metric: &str,
        kind: QueryKind,
        params: &PrivacyParameters,
        ledger: &BudgetLedger,
        scope: &str,
    ) -> Result<Vec<AggregateResult>, DpError> {
        let results = match kind {
            QueryKind::Sum => self.run_bounded(grouped, metric, StatKind::Sum, params, ledger, scope),
            QueryKind::Mean => self.run_bounded(grouped, metric, StatKind::Mean, params, ledger, scope),
            QueryKind::CategoryCount => self.run_category_count(grouped, params, ledger, scope),
        }?;

        tracing::debug!(
            "Query {kind} on '{metric}' over {} groups released under scope '{scope}'",
            results.len()
        );
        Ok(results)
    }

    fn run_bounded(
        &self,
        grouped: &GroupedRecords,
        metric: &str,
        kind: StatKind,
        params: &PrivacyParameters,
        ledger: &BudgetLedger,
        scope: &str,
    ) -> Result<Vec<AggregateResult>, DpError> {
        let mut results = Vec::with_capacity(grouped.len());

        for (key, records) in grouped {
            let values: Vec<f64> = records.iter().filter_map(|r| r.number(metric)).collect();
            let missing = records.len() - values.len();
            if missing > 0 {
                tracing::warn!(
                    "Group '{key}': {missing} records without numeric '{metric}', skipped"
                );
            }

            let result =
                self.aggregator
                    .aggregate(key.clone(), &values, params, kind, ledger, scope)?;
            results.push(result);
        }

        Ok(results)
    }

    /// Tally group membership after pushing every record's label through
    /// randomized response over the space of group keys.
    fn run_category_count(
        &self,
        grouped: &GroupedRecords,
        params: &PrivacyParameters,
        ledger: &BudgetLedger,
        scope: &str,
    ) -> Result<Vec<AggregateResult>, DpError> {
        let space: Vec<GroupKey> = grouped.keys().cloned().collect();
        if space.len() < 2 {
            return Err(DpError::CategorySpaceTooSmall(space.len()));
        }

        ledger.charge(scope, params.epsilon())?;

        let mut tallies: BTreeMap<&GroupKey, f64> = grouped.keys().map(|k| (k, 0.0)).collect();
        for (key, records) in grouped {
            for _ in records {
                let reported = self
                    .privacy
                    .perturb_category(key, &space, params.epsilon())?;
                if let Some(count) = tallies.get_mut(&reported) {
                    *count += 1.0;
                }
            }
        }

        let retention = self.privacy.retention_probability(params.epsilon());
        let results = grouped
            .iter()
            .map(|(key, records)| AggregateResult {
                group_key: key.clone(),
                raw_value: records.len() as f64,
                private_value: tallies.get(key).copied().unwrap_or(0.0),
                noise_scale: retention,
                mechanism: Mechanism::RandomizedResponse,
                epsilon: params.epsilon(),
            })
            .collect();

        Ok(results)
    }
}
