//! Chart series
//!
//! Plain value series for a presentation layer: a profit distribution
//! histogram, a cumulative PnL time series and a profit/cost breakdown.
//! Nothing here renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::percent;
use crate::models::{NormalizedRow, SummaryReport};

/// Upper bound on histogram bins; larger requests are clamped
pub const MAX_HISTOGRAM_BINS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativePoint {
    pub timestamp: DateTime<Utc>,
    pub pnl: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownSlice {
    pub label: String,
    pub value: f64,
    /// Share of the sum of all slices
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub profit_histogram: Vec<HistogramBin>,
    pub cumulative_pnl: Vec<CumulativePoint>,
    pub fee_breakdown: Vec<BreakdownSlice>,
}

impl ChartData {
    pub fn build(rows: &[NormalizedRow], report: &SummaryReport, bins: usize) -> Self {
        Self {
            profit_histogram: profit_histogram(rows, bins),
            cumulative_pnl: cumulative_pnl(rows),
            fee_breakdown: fee_breakdown(report),
        }
    }
}

/// Equal-width histogram of adjusted profit over included rows. `bins` is
/// clamped to [`MAX_HISTOGRAM_BINS`].
pub fn profit_histogram(rows: &[NormalizedRow], bins: usize) -> Vec<HistogramBin> {
    let bins = bins.min(MAX_HISTOGRAM_BINS);
    let values: Vec<f64> = rows
        .iter()
        .filter(|r| r.is_included())
        .map(|r| r.adjusted_profit)
        .collect();

    if bins == 0 || values.is_empty() {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for value in values {
        // The maximum lands in the last bin
        let index = (((value - min) / width).floor() as usize).min(bins - 1);
        histogram[index].count += 1;
    }

    histogram
}

/// Running total of adjusted profit over included rows in time order.
/// Rows sharing a timestamp keep their ledger order.
pub fn cumulative_pnl(rows: &[NormalizedRow]) -> Vec<CumulativePoint> {
    let mut included: Vec<&NormalizedRow> = rows.iter().filter(|r| r.is_included()).collect();
    included.sort_by_key(|r| r.timestamp);

    let mut running = 0.0;
    included
        .into_iter()
        .map(|r| {
            running += r.adjusted_profit;
            CumulativePoint {
                timestamp: r.timestamp,
                pnl: r.adjusted_profit,
                cumulative: running,
            }
        })
        .collect()
}

/// Profit, loss and cost components as non-zero slices
pub fn fee_breakdown(report: &SummaryReport) -> Vec<BreakdownSlice> {
    let components = [
        ("profit", report.total_profit),
        ("loss", report.total_loss.abs()),
        ("fee", report.total_fee.abs()),
        ("funding_fee", report.total_funding_fee.abs()),
        ("liquidation_fee", report.total_liquidation_fee.abs()),
    ];

    let total: f64 = components.iter().map(|(_, v)| v).sum();

    components
        .iter()
        .filter(|(_, value)| *value != 0.0)
        .map(|(label, value)| BreakdownSlice {
            label: label.to_string(),
            value: *value,
            percent: percent(*value, total),
        })
        .collect()
}
