//! Schema normalization
//!
//! Resolves arbitrary header spellings onto canonical ledger fields, coerces
//! cells into typed [`RawRow`] values and hands each row to the economics
//! deriver. Invalid numeric cells are recovered as missing; an unparseable
//! timestamp in the bucketing column rejects the whole ledger unless the row
//! is marked as not closed and another timestamp can stand in for it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::economics::{derive, is_closed_status, DeriveContext};
use crate::error::{LedgerError, LedgerResult};
use crate::ingest::RawTable;
use crate::models::{FeeMode, LedgerShape, NormalizedLedger, RawRow, Side};

/// Canonical ledger fields and the header spellings that map onto them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Timestamp,
    OpenedAt,
    Symbol,
    Side,
    Status,
    EntryPrice,
    ExitPrice,
    Quantity,
    Leverage,
    RealizedProfit,
    Fee,
    FeePercent,
    FundingFee,
    LiquidationFee,
    Amount,
    Balance,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Timestamp,
        Field::OpenedAt,
        Field::Symbol,
        Field::Side,
        Field::Status,
        Field::EntryPrice,
        Field::ExitPrice,
        Field::Quantity,
        Field::Leverage,
        Field::RealizedProfit,
        Field::Fee,
        Field::FeePercent,
        Field::FundingFee,
        Field::LiquidationFee,
        Field::Amount,
        Field::Balance,
    ];

    /// Numeric columns that are synthesized as zero when absent
    pub const ZERO_DEFAULTED: [Field; 5] = [
        Field::RealizedProfit,
        Field::Amount,
        Field::Fee,
        Field::FundingFee,
        Field::LiquidationFee,
    ];

    /// Canonical aliases in priority order
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Timestamp => &[
                "closed",
                "time(utc)",
                "trade_time",
                "close_time",
                "time",
                "timestamp",
                "date",
                "datetime",
                "opened",
            ],
            Field::OpenedAt => &["opened", "open_time"],
            Field::Symbol => &["symbol", "pair", "contract", "instrument"],
            Field::Side => &["side", "position_side", "direction", "position"],
            Field::Status => &["status"],
            Field::EntryPrice => &["entry_price", "open_price", "avg_entry_price"],
            Field::ExitPrice => &["exit_price", "close_price", "avg_close_price"],
            Field::Quantity => &["quantity", "qty", "size"],
            Field::Leverage => &["leverage"],
            Field::RealizedProfit => &["realized_profit", "realized_pnl", "closing_pnl", "pnl", "profit"],
            Field::Fee => &["fee", "fees", "commission"],
            Field::FeePercent => &["fee_percent", "fee%", "fee_%", "fee_(%)", "fee_pct", "fee_rate"],
            Field::FundingFee => &["funding_fee", "funding"],
            Field::LiquidationFee => &["liquidation_fee", "liquidation"],
            Field::Amount => &["amount", "closed_vol.", "closed_vol", "volume", "traded_amount"],
            Field::Balance => &["balance", "wallet_balance", "account_balance"],
        }
    }

    /// Name used when reporting synthesized or invalid columns
    pub fn canonical_name(&self) -> &'static str {
        self.aliases()[0]
    }
}

/// Trim, lower-case and replace whitespace runs with a single underscore
pub fn canonical_column_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Field → column index, resolved once per ledger
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    columns: BTreeMap<Field, usize>,
    timestamp_fallbacks: Vec<usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let canonical: Vec<String> = headers.iter().map(|h| canonical_column_name(h)).collect();
        let mut columns = BTreeMap::new();

        for field in Field::ALL {
            let found = field
                .aliases()
                .iter()
                .find_map(|alias| canonical.iter().position(|c| c == alias));
            if let Some(index) = found {
                columns.insert(field, index);
            }
        }

        // Every other column spelled like a timestamp, in alias priority order
        let timestamp_fallbacks = Field::Timestamp
            .aliases()
            .iter()
            .filter_map(|alias| canonical.iter().position(|c| c == alias))
            .filter(|index| Some(index) != columns.get(&Field::Timestamp))
            .collect();

        // A single "opened" column serves as the bucketing timestamp, not both.
        if columns.get(&Field::OpenedAt).is_some()
            && columns.get(&Field::OpenedAt) == columns.get(&Field::Timestamp)
        {
            columns.remove(&Field::OpenedAt);
        }

        Self {
            columns,
            timestamp_fallbacks,
        }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Columns other than the bucketing timestamp that also hold a timestamp
    pub fn timestamp_fallbacks(&self) -> &[usize] {
        &self.timestamp_fallbacks
    }
}

/// Caller-supplied ingestion choices
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Force a ledger shape instead of detecting it from the columns
    pub shape: Option<LedgerShape>,
    pub fee_mode: FeeMode,
    /// Multiply gross position PnL by the row's leverage
    pub apply_leverage: bool,
}

impl IngestOptions {
    /// Pick the ledger shape: forced, or `Position` when price columns exist
    pub fn resolve_shape(&self, columns: &ColumnMap) -> LedgerShape {
        self.shape.unwrap_or_else(|| {
            if columns.has(Field::EntryPrice) || columns.has(Field::ExitPrice) {
                LedgerShape::Position
            } else {
                LedgerShape::Account
            }
        })
    }
}

/// Parse a numeric cell. Thousands separators, a trailing `%` and a trailing
/// unit after whitespace (`"12.5 USDT"`) are tolerated.
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }

    let head = trimmed.split_whitespace().next().unwrap_or(trimmed);
    let cleaned: String = head
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp cell. Naive values are taken as UTC.
pub fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }

    // Epoch seconds or milliseconds
    if s.chars().all(|c| c.is_ascii_digit()) {
        let value: i64 = s.parse().ok()?;
        return match s.len() {
            10 => DateTime::from_timestamp(value, 0),
            13 => DateTime::from_timestamp_millis(value),
            _ => None,
        };
    }

    None
}

/// Normalize a raw table into typed rows with derived economics
pub fn normalize(table: &RawTable, options: &IngestOptions) -> LedgerResult<NormalizedLedger> {
    let columns = ColumnMap::resolve(&table.headers);
    let shape = options.resolve_shape(&columns);

    let timestamp_column = columns.get(Field::Timestamp).ok_or_else(|| {
        LedgerError::Schema(format!(
            "Ledger has no timestamp column (expected one of: {})",
            Field::Timestamp.aliases().join(", ")
        ))
    })?;

    if shape == LedgerShape::Position {
        if !columns.has(Field::Side) {
            return Err(LedgerError::Schema(
                "Position ledger has no side column (expected one of: side, position_side, direction, position)"
                    .to_string(),
            ));
        }
    } else if matches!(options.fee_mode, FeeMode::Percentage { .. }) {
        return Err(LedgerError::Schema(
            "Percentage fee mode requires a position ledger with entry prices".to_string(),
        ));
    }

    if matches!(options.fee_mode, FeeMode::Percentage { .. }) && columns.has(Field::Fee) {
        tracing::warn!("Percentage fee mode: ignoring absolute fee column");
    }

    let synthesized_columns: Vec<String> = Field::ZERO_DEFAULTED
        .iter()
        .filter(|f| !columns.has(**f))
        .map(|f| f.canonical_name().to_string())
        .collect();

    if !synthesized_columns.is_empty() {
        tracing::debug!(columns = ?synthesized_columns, "Synthesized zero-valued columns");
    }

    let ctx = DeriveContext {
        shape,
        fee_mode: options.fee_mode,
        apply_leverage: options.apply_leverage,
        has_amount: columns.has(Field::Amount),
        has_status: columns.has(Field::Status),
    };

    if table.is_empty() {
        tracing::debug!("Ledger has a header but no rows");
    }

    let mut invalid_cells: BTreeMap<String, usize> = BTreeMap::new();
    let mut rows = Vec::with_capacity(table.records.len());

    for (index, record) in table.records.iter().enumerate() {
        let mut coercer = CellCoercer {
            record,
            columns: &columns,
            invalid_cells: &mut invalid_cells,
        };

        let opened_at = coercer.timestamp(Field::OpenedAt);
        let status = coercer.text(Field::Status);

        let raw_ts = record.get(timestamp_column).map(String::as_str).unwrap_or("");
        let timestamp = match parse_timestamp(raw_ts) {
            Some(ts) => Some(ts),
            // Open positions carry no close time; bucket them by another timestamp
            None if columns.has(Field::Status) && !is_closed_status(status.as_deref()) => {
                let fallback = opened_at.or_else(|| {
                    columns
                        .timestamp_fallbacks()
                        .iter()
                        .find_map(|i| record.get(*i).and_then(|c| parse_timestamp(c)))
                });
                if fallback.is_some() {
                    tracing::debug!(row = index, status = ?status, "Unclosed row bucketed by fallback timestamp");
                }
                fallback
            }
            None => None,
        };
        let timestamp = timestamp.ok_or_else(|| LedgerError::Parse {
            row: index + 1,
            column: table.headers[timestamp_column].clone(),
            value: raw_ts.to_string(),
        })?;

        let raw = RawRow {
            index,
            timestamp,
            opened_at,
            symbol: coercer.text(Field::Symbol),
            side: coercer.text(Field::Side).as_deref().and_then(Side::from_str),
            status,
            entry_price: coercer.number(Field::EntryPrice),
            exit_price: coercer.number(Field::ExitPrice),
            quantity: coercer.number(Field::Quantity),
            leverage: coercer.number(Field::Leverage),
            realized_profit: coercer.number(Field::RealizedProfit),
            fee: coercer.number(Field::Fee),
            fee_percent: coercer.number(Field::FeePercent),
            funding_fee: coercer.number(Field::FundingFee),
            liquidation_fee: coercer.number(Field::LiquidationFee),
            amount: coercer.number(Field::Amount),
            balance: coercer.number(Field::Balance),
        };

        tracing::trace!(row = index, timestamp = %raw.timestamp, "Row coerced");
        rows.push(derive(&raw, &ctx));
    }

    for (column, count) in &invalid_cells {
        tracing::warn!(column = %column, count = %count, "Unparseable cells treated as missing");
    }

    let ledger = NormalizedLedger {
        shape,
        fee_mode: options.fee_mode,
        headers: table.headers.clone(),
        rows,
        synthesized_columns,
        invalid_cells,
    };

    tracing::debug!(
        shape = %ledger.shape,
        fee_mode = %ledger.fee_mode,
        rows = ledger.rows.len(),
        excluded = ledger.excluded_count(),
        "Ledger normalized"
    );

    Ok(ledger)
}

/// Reads typed values out of one record, tallying coercion failures
struct CellCoercer<'a> {
    record: &'a [String],
    columns: &'a ColumnMap,
    invalid_cells: &'a mut BTreeMap<String, usize>,
}

impl CellCoercer<'_> {
    fn cell(&self, field: Field) -> Option<&str> {
        self.columns
            .get(field)
            .and_then(|i| self.record.get(i))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    fn text(&self, field: Field) -> Option<String> {
        self.cell(field).map(str::to_string)
    }

    fn number(&mut self, field: Field) -> Option<f64> {
        let cell = self.cell(field)?;
        let value = parse_number(cell);
        if value.is_none() {
            self.record_invalid(field);
        }
        value
    }

    fn timestamp(&mut self, field: Field) -> Option<DateTime<Utc>> {
        let cell = self.cell(field)?;
        let value = parse_timestamp(cell);
        if value.is_none() {
            self.record_invalid(field);
        }
        value
    }

    fn record_invalid(&mut self, field: Field) {
        *self
            .invalid_cells
            .entry(field.canonical_name().to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExclusionReason;

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_canonical_column_name() {
        assert_eq!(canonical_column_name(" Closing PNL "), "closing_pnl");
        assert_eq!(canonical_column_name("Time(UTC)"), "time(utc)");
        assert_eq!(canonical_column_name("Funding   Fee"), "funding_fee");
        assert_eq!(canonical_column_name("Closed Vol."), "closed_vol.");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number(" -1,234.50 "), Some(-1234.5));
        assert_eq!(parse_number("0.1%"), Some(0.1));
        assert_eq!(parse_number("3.2 USDT"), Some(3.2));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T16:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("03/05/2024 14:30"), Some(expected));
        assert_eq!(parse_timestamp("1709649000"), Some(expected));
        assert_eq!(parse_timestamp("1709649000000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("12345"), None);
    }

    #[test]
    fn test_column_aliases_resolve() {
        let headers: Vec<String> = ["Opened", "Closed", "Closing PNL", "Closed Vol.", "Status"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let columns = ColumnMap::resolve(&headers);

        assert_eq!(columns.get(Field::Timestamp), Some(1));
        assert_eq!(columns.get(Field::OpenedAt), Some(0));
        assert_eq!(columns.get(Field::RealizedProfit), Some(2));
        assert_eq!(columns.get(Field::Amount), Some(3));
        assert_eq!(columns.get(Field::Status), Some(4));
    }

    #[test]
    fn test_lone_opened_column_is_the_timestamp() {
        let headers = vec!["Opened".to_string(), "PNL".to_string()];
        let columns = ColumnMap::resolve(&headers);
        assert_eq!(columns.get(Field::Timestamp), Some(0));
        assert_eq!(columns.get(Field::OpenedAt), None);
    }

    #[test]
    fn test_missing_columns_are_synthesized() {
        let ledger = normalize(
            &table("Time(UTC),Realized Profit\n2024-01-01 00:00:00,10\n"),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(ledger.shape, LedgerShape::Account);
        assert_eq!(
            ledger.synthesized_columns,
            vec!["amount", "fee", "funding_fee", "liquidation_fee"]
        );
        assert_eq!(ledger.rows[0].trading_cost, 0.0);
        assert_eq!(ledger.rows[0].adjusted_profit, 10.0);
    }

    #[test]
    fn test_invalid_numeric_cells_are_counted_not_fatal() {
        let ledger = normalize(
            &table("time,realized_profit,fee\n2024-01-01,abc,1\n2024-01-02,5,oops\n"),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(ledger.invalid_cells.get("realized_profit"), Some(&1));
        assert_eq!(ledger.invalid_cells.get("fee"), Some(&1));
        assert_eq!(ledger.rows.len(), 2);
        assert_eq!(ledger.rows[0].exclusion, Some(ExclusionReason::MissingProfit));
        assert_eq!(ledger.rows[1].adjusted_profit, 5.0);
    }

    #[test]
    fn test_unparseable_timestamp_rejects_ledger() {
        let err = normalize(
            &table("time,realized_profit\n2024-01-01,1\nnot a date,2\n"),
            &IngestOptions::default(),
        )
        .unwrap_err();

        match err {
            LedgerError::Parse { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "time");
                assert_eq!(value, "not a date");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_open_position_without_close_time_uses_opened_at() {
        let ledger = normalize(
            &table(
                "Symbol,Opened,Closed,Closing PNL,Closed Vol.,Status\n\
                 BTCUSDT,2024-06-20 10:00:00,2024-06-30 09:00:00,120.5,2400,Closed\n\
                 SOLUSDT,2024-06-29 10:00:00,,0,0,Open\n",
            ),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(ledger.rows.len(), 2);
        assert_eq!(ledger.rows[1].exclusion, Some(ExclusionReason::NotClosed));
        assert_eq!(
            ledger.rows[1].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 29, 10, 0, 0).unwrap()
        );
        assert!(ledger.rows[0].is_included());
    }

    #[test]
    fn test_open_row_falls_back_to_other_timestamp_column() {
        let ledger = normalize(
            &table("time(utc),timestamp,realized_profit,status\n,2024-06-01,3,open\n"),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(
            ledger.rows[0].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(ledger.rows[0].exclusion, Some(ExclusionReason::NotClosed));
    }

    #[test]
    fn test_closed_row_without_close_time_is_parse_error() {
        let err = normalize(
            &table("Opened,Closed,Closing PNL,Status\n2024-06-20 10:00:00,,5,Closed\n"),
            &IngestOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Parse { row: 1, .. }));

        let err = normalize(
            &table("Opened,Closed,Closing PNL\n2024-06-20 10:00:00,,5\n"),
            &IngestOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Parse { row: 1, .. }));
    }

    #[test]
    fn test_fee_percent_header_spellings() {
        for header in ["Fee (%)", "Fee %", "Fee%"] {
            let headers = vec!["time".to_string(), header.to_string()];
            assert_eq!(ColumnMap::resolve(&headers).get(Field::FeePercent), Some(1), "{header}");
        }
    }

    #[test]
    fn test_missing_timestamp_column_is_schema_error() {
        let err = normalize(&table("realized_profit\n1\n"), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, LedgerError::Schema(_)));
    }

    #[test]
    fn test_position_ledger_requires_side() {
        let err = normalize(
            &table("time,entry_price,exit_price,quantity\n2024-01-01,1,2,1\n"),
            &IngestOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Schema(_)));
    }

    #[test]
    fn test_percentage_mode_rejected_for_account_ledger() {
        let options = IngestOptions {
            fee_mode: FeeMode::Percentage { default_percent: 0.1 },
            ..Default::default()
        };
        let err = normalize(&table("time,realized_profit\n2024-01-01,1\n"), &options).unwrap_err();
        assert!(matches!(err, LedgerError::Schema(_)));
    }

    #[test]
    fn test_forced_shape_overrides_detection() {
        let options = IngestOptions {
            shape: Some(LedgerShape::Account),
            ..Default::default()
        };
        let ledger = normalize(
            &table("time,entry_price,realized_profit\n2024-01-01,100,7\n"),
            &options,
        )
        .unwrap();
        assert_eq!(ledger.shape, LedgerShape::Account);
        assert_eq!(ledger.rows[0].adjusted_profit, 7.0);
    }
}
