//! # Veilstat
//!
//! Privacy-preserving statistical releases over sports-injury records.
//!
//! This crate provides:
//! - Laplace and randomized-response mechanisms for differential privacy
//! - A privacy-budget ledger tracking cumulative epsilon per scope
//! - An aggregation pipeline producing paired (raw, private) releases
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (PrivacyParameters, Record, AggregateResult, BudgetLedger)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (ChaCha20 noise, CSV ingestion, JSON report)
//! - `application`: Use cases orchestrating domain and ports

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub use domain::{AggregateResult, BudgetLedger, GroupKey, Mechanism, PrivacyParameters, Record};

/// Result type for Veilstat operations
pub type Result<T> = std::result::Result<T, VeilstatError>;

/// Main error type for Veilstat
#[derive(Debug, thiserror::Error)]
pub enum VeilstatError {
    #[error("Differential privacy failure: {0}")]
    Privacy(#[from] ports::DpError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] ports::IngestError),

    #[error("Export failed: {0}")]
    Export(#[from] ports::ExportError),

    #[error("Invalid study configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
