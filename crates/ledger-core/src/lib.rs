//! # Ledger Core
//!
//! Trade-ledger PnL aggregation engine.
//!
//! A ledger flows through one pipeline: CSV bytes are read into a
//! [`RawTable`], normalized into typed rows with derived economics, and
//! aggregated into an immutable [`SummaryReport`]. Every stage is a pure
//! function of its input, so a presentation layer can call it as often as it
//! re-renders.

pub mod aggregate;
pub mod charts;
pub mod economics;
pub mod error;
pub mod ingest;
pub mod models;
pub mod schema;

pub use aggregate::aggregate;
pub use charts::ChartData;
pub use error::*;
pub use ingest::RawTable;
pub use models::*;
pub use schema::{normalize, IngestOptions};

use chrono::NaiveDate;

/// A normalized ledger together with its summary
#[derive(Debug, Clone)]
pub struct LedgerAnalysis {
    pub ledger: NormalizedLedger,
    pub summary: SummaryReport,
}

impl LedgerAnalysis {
    pub fn charts(&self, bins: usize) -> ChartData {
        ChartData::build(&self.ledger.rows, &self.summary, bins)
    }
}

/// Ingest, normalize and aggregate one uploaded ledger
pub fn analyze(
    bytes: &[u8],
    options: &IngestOptions,
    reference_date: NaiveDate,
) -> LedgerResult<LedgerAnalysis> {
    let table = RawTable::from_csv_bytes(bytes)?;
    let ledger = normalize(&table, options)?;
    let summary = aggregate(&ledger.rows, reference_date);

    Ok(LedgerAnalysis { ledger, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_position_ledger_scenario() {
        let csv = "\
Trade Time,Symbol,Side,Entry Price,Exit Price,Quantity,Fee%
2024-06-29 09:00:00,BTCUSDT,Long,50000,55000,1,0.1
2024-06-29 15:00:00,BTCUSDT,Short,50000,45000,1,0.1
";
        let options = IngestOptions {
            fee_mode: FeeMode::Percentage { default_percent: 0.0 },
            ..Default::default()
        };
        let analysis = analyze(csv.as_bytes(), &options, reference()).unwrap();
        let summary = &analysis.summary;

        assert_eq!(analysis.ledger.shape, LedgerShape::Position);
        assert!((analysis.ledger.rows[0].pnl() - 4950.0).abs() < EPS);
        assert!((analysis.ledger.rows[1].pnl() - 4950.0).abs() < EPS);
        assert!((summary.total_profit - 9900.0).abs() < EPS);
        assert_eq!(summary.total_loss, 0.0);
        assert_eq!(summary.win_rate, 100.0);
        assert_eq!(summary.average_loss, 0.0);
        assert_eq!(summary.profit_loss_ratio, 0.0);
    }

    #[test]
    fn test_account_ledger_scenario() {
        let csv = "\
Time(UTC),Realized Profit,Fee,Funding Fee,Liquidation Fee
2024-06-30 08:00:00,-100,5,2,0
";
        let analysis = analyze(csv.as_bytes(), &IngestOptions::default(), reference()).unwrap();
        let summary = &analysis.summary;

        assert!((analysis.ledger.rows[0].adjusted_profit + 107.0).abs() < EPS);
        assert!((summary.total_loss + 107.0).abs() < EPS);
        assert_eq!(summary.total_profit, 0.0);
        assert_eq!(summary.win_rate, 0.0);
    }

    #[test]
    fn test_binance_position_history_export() {
        let csv = "\
\u{feff}Symbol,Opened,Closed,Closing PNL,Closed Vol.,Status
BTCUSDT,2024-06-20 10:00:00,2024-06-30 09:00:00,120.5,2400,Closed
ETHUSDT,2024-06-25 10:00:00,2024-06-28 11:00:00,-40,800,Closed
SOLUSDT,2024-06-29 10:00:00,2024-06-30 10:00:00,15,300,Open
";
        let analysis = analyze(csv.as_bytes(), &IngestOptions::default(), reference()).unwrap();
        let summary = &analysis.summary;

        assert_eq!(analysis.ledger.rows.len(), 3);
        assert_eq!(
            analysis.ledger.rows[2].exclusion,
            Some(ExclusionReason::NotClosed)
        );
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.excluded_rows, 1);
        assert!((summary.windows.today.pnl - 120.5).abs() < EPS);
        assert!((summary.trading_volume - 3200.0).abs() < EPS);
        assert!((summary.win_rate - 50.0).abs() < EPS);
        assert!(analysis.ledger.rows[0].opened_at.is_some());
    }

    #[test]
    fn test_optional_fee_columns_default_to_zero() {
        let without = "time,realized_profit,fee\n2024-06-01,50,1\n2024-06-02,-20,1\n";
        let with_zeros = "time,realized_profit,fee,funding_fee,liquidation_fee\n2024-06-01,50,1,0,0\n2024-06-02,-20,1,0,0\n";

        let a = analyze(without.as_bytes(), &IngestOptions::default(), reference()).unwrap();
        let b = analyze(with_zeros.as_bytes(), &IngestOptions::default(), reference()).unwrap();

        assert_eq!(a.summary.total_profit, b.summary.total_profit);
        assert_eq!(a.summary.total_loss, b.summary.total_loss);
        assert_eq!(a.ledger.synthesized_columns, vec!["amount", "funding_fee", "liquidation_fee"]);
    }

    #[test]
    fn test_summary_serializes_for_presentation() {
        let csv = "time,realized_profit\n2024-06-30,10\n";
        let analysis = analyze(csv.as_bytes(), &IngestOptions::default(), reference()).unwrap();
        let json = serde_json::to_value(&analysis.summary).unwrap();

        assert_eq!(json["total_trades"], 1);
        assert_eq!(json["reference_date"], "2024-06-30");
        assert_eq!(json["daily"][0]["outcome"], "win");
        assert_eq!(analysis.charts(10).cumulative_pnl.len(), 1);
    }
}
