//! JSON report sink: Implementation of ReleaseSink.
//!
//! Writes the full study report (releases plus final budget state) as
//! pretty-printed JSON for downstream chart/report tooling.

use std::path::PathBuf;

use crate::ports::{ExportError, ReleaseSink, StudyReport};

/// File-backed JSON report sink.
pub struct JsonReportSink {
    path: PathBuf,
}

impl JsonReportSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReleaseSink for JsonReportSink {
    fn write(&self, report: &StudyReport) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&self.path, json).map_err(|source| ExportError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        tracing::info!(
            "Wrote {} studies to {}",
            report.studies.len(),
            self.path.display()
        );
        Ok(())
    }
}
