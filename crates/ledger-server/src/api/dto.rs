use std::collections::BTreeMap;

use ledger_core::charts::ChartData;
use ledger_core::{FeeMode, LedgerShape, NormalizedRow, SummaryReport};
use serde::{Deserialize, Serialize};

// ============================================================================
// Query parameters shared by the ledger endpoints
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// YYYY-MM-DD, defaults to today (UTC)
    pub reference_date: Option<String>,
    /// "absolute" or "percentage"
    pub fee_mode: Option<String>,
    pub fee_percent: Option<f64>,
    /// "account" or "position", detected from the columns when absent
    pub shape: Option<String>,
    pub apply_leverage: Option<bool>,
    /// Histogram bin count
    pub bins: Option<usize>,
}

// ============================================================================
// POST /api/v1/ledger/summary
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub shape: LedgerShape,
    pub fee_mode: FeeMode,
    pub summary: SummaryReport,
    pub charts: ChartData,
    pub synthesized_columns: Vec<String>,
    pub invalid_cells: BTreeMap<String, usize>,
}

// ============================================================================
// POST /api/v1/ledger/rows
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub shape: LedgerShape,
    pub headers: Vec<String>,
    pub total_rows: usize,
    pub excluded_rows: usize,
    pub rows: Vec<NormalizedRow>,
}

// ============================================================================
// Health check
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
