//! Ledger Report
//!
//! Reads one CSV trade ledger and prints its PnL summary and chart series as
//! JSON on stdout. Logs go to stderr.

mod config;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use ledger_core::charts::ChartData;
use ledger_core::{aggregate, normalize, RawTable, SummaryReport};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "ledger-report", version, about = "Summarize a CSV trade ledger")]
struct Cli {
    /// Path to the ledger CSV file
    file: PathBuf,
}

#[derive(Debug, Serialize)]
struct Report {
    summary: SummaryReport,
    charts: ChartData,
    synthesized_columns: Vec<String>,
    invalid_cells: BTreeMap<String, usize>,
}

fn main() -> anyhow::Result<()> {
    // Stdout carries the report only
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("ledger_report=info,ledger_core=warn")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;
    let options = config.analysis.ingest_options()?;

    tracing::info!(
        file = %cli.file.display(),
        fee_mode = %options.fee_mode,
        "Reading ledger"
    );

    let table = RawTable::from_path(&cli.file)
        .with_context(|| format!("Failed to read ledger: {}", cli.file.display()))?;
    let ledger = normalize(&table, &options)
        .with_context(|| format!("Failed to normalize ledger: {}", cli.file.display()))?;
    drop(table);

    let summary = aggregate(&ledger.rows, Utc::now().date_naive());
    let charts = ChartData::build(&ledger.rows, &summary, config.analysis.histogram_bins);

    tracing::info!(
        total_trades = summary.total_trades,
        excluded_rows = summary.excluded_rows,
        net_pnl = summary.net_pnl,
        "Ledger summarized"
    );

    let report = Report {
        summary,
        charts,
        synthesized_columns: ledger.synthesized_columns,
        invalid_cells: ledger.invalid_cells,
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;

    Ok(())
}
