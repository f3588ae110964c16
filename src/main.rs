//! Veilstat: Privacy-Preserving Injury Statistics
//!
//! Main entry point: loads the source tables, runs the study battery and
//! writes the release report.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use veilstat::adapters::chacha::ChaChaAdapter;
use veilstat::adapters::csv::CsvRecordSource;
use veilstat::adapters::report::JsonReportSink;
use veilstat::adapters::sanitize::SanitizingMakeWriter;
use veilstat::application::{StudyConfig, StudyRunner};
use veilstat::domain::BudgetLedger;
use veilstat::ports::{RecordSource, ReleaseSink};

fn main() -> Result<()> {
    // All log output flows through the sanitizing writer so a stray record
    // in a warning never leaks player data to the sink.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(SanitizingMakeWriter::new(std::io::stdout)),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| "data".to_string());
    let out_path = args.next().unwrap_or_else(|| "releases.json".to_string());

    tracing::info!("Starting veilstat over '{data_dir}'");

    let config = StudyConfig::from_env_or_default();
    let ledger = BudgetLedger::new(config.epsilon_cap);

    let dataset = CsvRecordSource::new(&data_dir)
        .load()
        .context("loading source tables")?;

    let runner = StudyRunner::new(Arc::new(ChaChaAdapter::new()), config);
    let report = runner
        .run_all(&dataset, &ledger)
        .context("running the study battery")?;

    for spend in &report.budget {
        tracing::info!(
            "Scope '{}': spent ε = {:.3} of cap {:.3}",
            spend.scope,
            spend.spent,
            spend.cap
        );
    }

    JsonReportSink::new(&out_path)
        .write(&report)
        .context("writing the release report")?;

    tracing::info!("Veilstat run complete: {out_path}");
    Ok(())
}
