//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and its collaborators (noise source, ingestion,
//! export).

mod export;
mod ingest;
mod privacy;

pub use export::{ExportError, ReleaseSink, StudyRelease, StudyReport};
pub use ingest::{IngestError, InjuryDataset, RecordSource};
pub use privacy::{DifferentialPrivacy, DpError};
