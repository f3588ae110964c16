//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `chacha`: ChaCha20-backed noise source for the DP mechanisms
//! - `csv`: CSV ingestion (injuries, players, appearances tables)
//! - `report`: JSON report sink
//! - `sanitize`: PII filtering for logs

pub mod chacha;
pub mod csv;
pub mod report;
pub mod sanitize;
