use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use ledger_core::{analyze, FeeMode, IngestOptions, LedgerAnalysis, LedgerShape};
use std::time::Instant;

use super::dto::*;
use crate::error::{AppError, AppResult};
use crate::AppState;

pub async fn health_check() -> Json<HealthResponse> {
    tracing::debug!("Processing health check request");

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Merge request overrides onto the configured analysis defaults
fn resolve_options(state: &AppState, query: &AnalyzeQuery) -> AppResult<(IngestOptions, NaiveDate)> {
    let defaults = &state.config.analysis;
    let mut options = defaults.ingest_options().map_err(AppError::Config)?;

    if let Some(mode) = &query.fee_mode {
        let percent = query.fee_percent.unwrap_or(defaults.fee_percent);
        options.fee_mode = FeeMode::parse(mode, percent)
            .ok_or_else(|| AppError::InvalidParam(format!("Invalid fee_mode: {}", mode)))?;
    } else if let (FeeMode::Percentage { .. }, Some(percent)) = (options.fee_mode, query.fee_percent) {
        options.fee_mode = FeeMode::Percentage { default_percent: percent };
    }

    if let Some(shape) = &query.shape {
        options.shape = Some(
            LedgerShape::from_str(shape)
                .ok_or_else(|| AppError::InvalidParam(format!("Invalid shape: {}", shape)))?,
        );
    }

    if let Some(apply_leverage) = query.apply_leverage {
        options.apply_leverage = apply_leverage;
    }

    let reference_date = match &query.reference_date {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            AppError::InvalidParam(format!("Invalid reference_date (expected YYYY-MM-DD): {}", date))
        })?,
        None => Utc::now().date_naive(),
    };

    Ok((options, reference_date))
}

/// Histogram bin count for a request, bounded by `analysis.max_histogram_bins`
fn resolve_bins(state: &AppState, query: &AnalyzeQuery) -> AppResult<usize> {
    let defaults = &state.config.analysis;
    let bins = query.bins.unwrap_or(defaults.histogram_bins);

    if bins > defaults.max_histogram_bins {
        return Err(AppError::InvalidParam(format!(
            "bins must be at most {}: {}",
            defaults.max_histogram_bins, bins
        )));
    }

    Ok(bins)
}

fn run_analysis(state: &AppState, query: &AnalyzeQuery, body: &Bytes) -> AppResult<LedgerAnalysis> {
    if body.is_empty() {
        return Err(AppError::EmptyUpload);
    }

    let (options, reference_date) = resolve_options(state, query)?;
    tracing::debug!(
        fee_mode = %options.fee_mode,
        shape = ?options.shape,
        reference_date = %reference_date,
        bytes = body.len(),
        "Analyzing ledger upload"
    );

    Ok(analyze(body, &options, reference_date)?)
}

pub async fn summarize_ledger(
    State(state): State<AppState>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    body: Bytes,
) -> AppResult<Json<SummaryResponse>> {
    let start = Instant::now();
    tracing::info!(bytes = body.len(), "Processing ledger summary request");

    let Query(query) = query?;
    let bins = resolve_bins(&state, &query)?;
    let analysis = run_analysis(&state, &query, &body)?;
    let charts = analysis.charts(bins);

    let LedgerAnalysis { ledger, summary } = analysis;

    let duration = start.elapsed().as_millis();
    tracing::info!(
        duration_ms = %duration,
        shape = %ledger.shape,
        total_trades = summary.total_trades,
        excluded_rows = summary.excluded_rows,
        net_pnl = summary.net_pnl,
        "Ledger summary computed"
    );

    Ok(Json(SummaryResponse {
        shape: ledger.shape,
        fee_mode: ledger.fee_mode,
        summary,
        charts,
        synthesized_columns: ledger.synthesized_columns,
        invalid_cells: ledger.invalid_cells,
    }))
}

pub async fn ledger_rows(
    State(state): State<AppState>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    body: Bytes,
) -> AppResult<Json<RowsResponse>> {
    let start = Instant::now();
    tracing::info!(bytes = body.len(), "Processing ledger rows request");

    let Query(query) = query?;
    let ledger = run_analysis(&state, &query, &body)?.ledger;
    let excluded_rows = ledger.excluded_count();

    let duration = start.elapsed().as_millis();
    tracing::info!(
        duration_ms = %duration,
        rows = ledger.rows.len(),
        excluded_rows = excluded_rows,
        "Ledger rows normalized"
    );

    Ok(Json(RowsResponse {
        shape: ledger.shape,
        headers: ledger.headers,
        total_rows: ledger.rows.len(),
        excluded_rows,
        rows: ledger.rows,
    }))
}
