//! Ledger data models
//!
//! A ledger moves through three shapes: the typed [`RawRow`] produced by
//! schema normalization, the [`NormalizedRow`] carrying derived economics, and
//! the immutable [`SummaryReport`] aggregated from a collection of rows.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Classifiers
// =============================================================================

/// Direction of a position-based ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl Side {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Some(Side::Long),
            "short" | "sell" => Some(Side::Short),
            _ => None,
        }
    }
}

/// The two input shapes a ledger can take.
///
/// Account ledgers report realized profit per row; position ledgers carry
/// entry/exit prices and a side from which profit is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerShape {
    Account,
    Position,
}

impl fmt::Display for LedgerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerShape::Account => write!(f, "account"),
            LedgerShape::Position => write!(f, "position"),
        }
    }
}

impl LedgerShape {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "account" | "ledger" => Some(LedgerShape::Account),
            "position" | "positions" => Some(LedgerShape::Position),
            _ => None,
        }
    }
}

/// How trading fees are expressed in a ledger. Chosen once per ledger by the
/// caller and never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FeeMode {
    /// Fees are currency amounts taken from the `fee` column.
    Absolute,
    /// Fees are a percentage of entry notional. The row's `fee_percent` cell
    /// wins over `default_percent` when present.
    Percentage { default_percent: f64 },
}

impl Default for FeeMode {
    fn default() -> Self {
        FeeMode::Absolute
    }
}

impl FeeMode {
    /// Build a fee mode from its name (`absolute` / `percentage`) and the
    /// percentage used when a row carries none
    pub fn parse(mode: &str, default_percent: f64) -> Option<Self> {
        match mode.trim().to_lowercase().as_str() {
            "absolute" | "abs" => Some(FeeMode::Absolute),
            "percentage" | "percent" | "pct" => Some(FeeMode::Percentage { default_percent }),
            _ => None,
        }
    }
}

impl fmt::Display for FeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeMode::Absolute => write!(f, "absolute"),
            FeeMode::Percentage { default_percent } => write!(f, "percentage({})", default_percent),
        }
    }
}

/// Why a row is left out of aggregate denominators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// A status column is present and the row is not closed
    NotClosed,
    /// Account row whose realized profit is missing or invalid
    MissingProfit,
    /// Position row with no recognizable side
    MissingSide,
    /// Position row missing entry price, exit price or quantity
    MissingPrice,
}

/// Sign classification of a profit figure. Exactly zero is breakeven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
}

impl Outcome {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Outcome::Win
        } else if value < 0.0 {
            Outcome::Loss
        } else {
            Outcome::Breakeven
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One ledger entry after column resolution and cell coercion.
///
/// Numeric fields are `None` when the column is absent or the cell could not
/// be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// 0-based position in the ledger, header excluded
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub symbol: Option<String>,
    pub side: Option<Side>,
    pub status: Option<String>,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub leverage: Option<f64>,
    pub realized_profit: Option<f64>,
    pub fee: Option<f64>,
    pub fee_percent: Option<f64>,
    pub funding_fee: Option<f64>,
    pub liquidation_fee: Option<f64>,
    pub amount: Option<f64>,
    pub balance: Option<f64>,
}

/// A ledger entry with derived economics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub symbol: Option<String>,
    pub side: Option<Side>,
    pub status: Option<String>,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub leverage: Option<f64>,
    pub balance: Option<f64>,

    /// Profit before costs. Derived from prices for position ledgers.
    pub realized_profit: f64,
    pub fee: f64,
    pub funding_fee: f64,
    pub liquidation_fee: f64,
    /// `fee + funding_fee + liquidation_fee`
    pub trading_cost: f64,
    /// `realized_profit - trading_cost`
    pub adjusted_profit: f64,
    /// Traded amount, always non-negative
    pub volume: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusion: Option<ExclusionReason>,
}

impl NormalizedRow {
    pub fn is_included(&self) -> bool {
        self.exclusion.is_none()
    }

    /// Calendar date (UTC) used for daily bucketing
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Profit net of the trading fee only
    pub fn pnl(&self) -> f64 {
        self.realized_profit - self.fee
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::of(self.adjusted_profit)
    }
}

/// The full result of normalizing one uploaded ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedLedger {
    pub shape: LedgerShape,
    pub fee_mode: FeeMode,
    /// Header names as they appeared in the upload
    pub headers: Vec<String>,
    pub rows: Vec<NormalizedRow>,
    /// Required numeric columns that were absent and defaulted to zero
    pub synthesized_columns: Vec<String>,
    /// Count of cells per canonical column that failed coercion
    pub invalid_cells: BTreeMap<String, usize>,
}

impl NormalizedLedger {
    pub fn excluded_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_included()).count()
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Profit and volume over one time window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub pnl: f64,
    pub volume: f64,
    /// `pnl / volume * 100`, zero when volume is zero
    pub pnl_percent: f64,
    pub trades: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlWindows {
    pub today: WindowSummary,
    pub seven_day: WindowSummary,
    pub thirty_day: WindowSummary,
    pub lifetime: WindowSummary,
}

/// Adjusted profit summed over one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub pnl: f64,
    pub volume: f64,
    pub trades: usize,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub trades: usize,
    pub net_pnl: f64,
    pub volume: f64,
    pub win_rate: f64,
}

/// Immutable aggregate of a normalized ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub reference_date: NaiveDate,

    // Counts
    pub total_trades: usize,
    pub excluded_rows: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub winning_days: usize,
    pub losing_days: usize,
    pub breakeven_days: usize,

    // Totals
    pub total_profit: f64,
    /// Signed, so zero or negative
    pub total_loss: f64,
    pub net_pnl: f64,
    pub trading_volume: f64,

    // Cost breakdown
    pub total_realized_profit: f64,
    pub total_fee: f64,
    pub total_funding_fee: f64,
    pub total_liquidation_fee: f64,
    pub total_trading_cost: f64,

    // Ratios
    pub win_rate: f64,
    pub average_profit: f64,
    pub average_loss: f64,
    pub profit_loss_ratio: f64,
    pub largest_win: f64,
    pub largest_loss: f64,

    pub windows: PnlWindows,
    pub daily: Vec<DailyPnl>,
    pub by_symbol: Vec<SymbolSummary>,

    pub latest_balance: Option<f64>,
    pub first_trade_at: Option<DateTime<Utc>>,
    pub last_trade_at: Option<DateTime<Utc>>,
}
