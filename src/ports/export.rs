//! Export port: Trait for the collaborator that consumes releases.
//!
//! The pipeline produces paired (raw, private) results; rendering and
//! persistence of those results happen behind this boundary.

use serde::{Deserialize, Serialize};

use crate::domain::{AggregateResult, QueryKind, ScopeSpend};

/// Errors that can occur while writing a report.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One study's released results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRelease {
    /// Human-readable study name
    pub name: String,

    /// Query kind that produced the results
    pub kind: QueryKind,

    /// Metric attribute the query aggregated
    pub metric: String,

    /// Epsilon charged per mechanism invocation
    pub epsilon: f64,

    /// Ledger scope the study charged
    pub scope: String,

    /// One result per group
    pub results: Vec<AggregateResult>,
}

/// A full analysis run: every study's releases plus the final budget state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyReport {
    /// RFC 3339 timestamp of the run
    pub generated_at: String,

    /// Released studies, in execution order
    pub studies: Vec<StudyRelease>,

    /// Final epsilon spend per ledger scope
    pub budget: Vec<ScopeSpend>,
}

/// Trait for the export collaborator.
pub trait ReleaseSink {
    /// Write a complete report.
    ///
    /// # Errors
    /// Returns error if the sink cannot be written.
    fn write(&self, report: &StudyReport) -> Result<(), ExportError>;
}
