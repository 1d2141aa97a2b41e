//! Ledger aggregation
//!
//! [`aggregate`] is a pure function from a row collection and a reference
//! date to a [`SummaryReport`]. Only included rows feed totals, counts and
//! windows. Every ratio with a zero denominator is defined as zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{
    DailyPnl, NormalizedRow, Outcome, PnlWindows, SummaryReport, SymbolSummary, WindowSummary,
};

/// Time windows reported in a summary, in days before the reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Today,
    SevenDay,
    ThirtyDay,
    Lifetime,
}

impl TimeWindow {
    pub fn to_days(&self) -> Option<i64> {
        match self {
            TimeWindow::Today => Some(0),
            TimeWindow::SevenDay => Some(7),
            TimeWindow::ThirtyDay => Some(30),
            TimeWindow::Lifetime => None,
        }
    }

    /// Whether `date` falls in `[reference - window, reference]`
    pub fn contains(&self, date: NaiveDate, reference: NaiveDate) -> bool {
        match self.to_days() {
            Some(days) => date <= reference && date >= reference - Duration::days(days),
            None => true,
        }
    }
}

/// `numerator / denominator`, or zero when the denominator is zero
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Percentage of `part` over `whole`, zero when `whole` is zero
pub fn percent(part: f64, whole: f64) -> f64 {
    ratio(part, whole) * 100.0
}

fn count_ratio(numerator: usize, denominator: usize) -> f64 {
    ratio(numerator as f64, denominator as f64)
}

/// Sum adjusted profit and volume over the included rows inside `window`
pub fn window_summary(
    rows: &[NormalizedRow],
    window: TimeWindow,
    reference: NaiveDate,
) -> WindowSummary {
    let mut summary = WindowSummary::default();

    for row in rows
        .iter()
        .filter(|r| r.is_included() && window.contains(r.date(), reference))
    {
        summary.pnl += row.adjusted_profit;
        summary.volume += row.volume;
        summary.trades += 1;
    }

    summary.pnl_percent = percent(summary.pnl, summary.volume);
    summary
}

/// Adjusted profit bucketed by calendar date, ascending
pub fn daily_pnl(rows: &[NormalizedRow]) -> Vec<DailyPnl> {
    let mut buckets: BTreeMap<NaiveDate, (f64, f64, usize)> = BTreeMap::new();

    for row in rows.iter().filter(|r| r.is_included()) {
        let bucket = buckets.entry(row.date()).or_insert((0.0, 0.0, 0));
        bucket.0 += row.adjusted_profit;
        bucket.1 += row.volume;
        bucket.2 += 1;
    }

    buckets
        .into_iter()
        .map(|(date, (pnl, volume, trades))| DailyPnl {
            date,
            pnl,
            volume,
            trades,
            outcome: Outcome::of(pnl),
        })
        .collect()
}

/// Per-symbol rollup, ascending by symbol. Rows without a symbol are skipped.
pub fn symbol_breakdown(rows: &[NormalizedRow]) -> Vec<SymbolSummary> {
    #[derive(Default)]
    struct Acc {
        trades: usize,
        wins: usize,
        net_pnl: f64,
        volume: f64,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();

    for row in rows.iter().filter(|r| r.is_included()) {
        let Some(symbol) = row.symbol.as_deref() else {
            continue;
        };
        let acc = groups.entry(symbol).or_default();
        acc.trades += 1;
        acc.net_pnl += row.adjusted_profit;
        acc.volume += row.volume;
        if row.outcome() == Outcome::Win {
            acc.wins += 1;
        }
    }

    groups
        .into_iter()
        .map(|(symbol, acc)| SymbolSummary {
            symbol: symbol.to_string(),
            trades: acc.trades,
            net_pnl: acc.net_pnl,
            volume: acc.volume,
            win_rate: count_ratio(acc.wins, acc.trades) * 100.0,
        })
        .collect()
}

/// Aggregate a row collection into a summary as of `reference_date`
pub fn aggregate(rows: &[NormalizedRow], reference_date: NaiveDate) -> SummaryReport {
    let mut total_trades = 0;
    let mut winning_trades = 0;
    let mut losing_trades = 0;
    let mut breakeven_trades = 0;

    let mut total_profit = 0.0;
    let mut total_loss = 0.0;
    let mut trading_volume = 0.0;
    let mut total_realized_profit = 0.0;
    let mut total_fee = 0.0;
    let mut total_funding_fee = 0.0;
    let mut total_liquidation_fee = 0.0;
    let mut total_trading_cost = 0.0;
    let mut largest_win: f64 = 0.0;
    let mut largest_loss: f64 = 0.0;

    let mut first_trade_at = None;
    let mut last_trade_at = None;
    let mut latest_balance: Option<(DateTime<Utc>, f64)> = None;

    for row in rows.iter().filter(|r| r.is_included()) {
        total_trades += 1;

        let profit = row.adjusted_profit;
        match row.outcome() {
            Outcome::Win => {
                winning_trades += 1;
                total_profit += profit;
                largest_win = largest_win.max(profit);
            }
            Outcome::Loss => {
                losing_trades += 1;
                total_loss += profit;
                largest_loss = largest_loss.min(profit);
            }
            Outcome::Breakeven => breakeven_trades += 1,
        }

        trading_volume += row.volume;
        total_realized_profit += row.realized_profit;
        total_fee += row.fee;
        total_funding_fee += row.funding_fee;
        total_liquidation_fee += row.liquidation_fee;
        total_trading_cost += row.trading_cost;

        if first_trade_at.map_or(true, |t| row.timestamp < t) {
            first_trade_at = Some(row.timestamp);
        }
        if last_trade_at.map_or(true, |t| row.timestamp > t) {
            last_trade_at = Some(row.timestamp);
        }
        if let Some(balance) = row.balance {
            // Ties keep the later row in ledger order
            if latest_balance.map_or(true, |(t, _)| row.timestamp >= t) {
                latest_balance = Some((row.timestamp, balance));
            }
        }
    }

    let daily = daily_pnl(rows);
    let count_days = |outcome: Outcome| daily.iter().filter(|d| d.outcome == outcome).count();
    let (winning_days, losing_days, breakeven_days) = (
        count_days(Outcome::Win),
        count_days(Outcome::Loss),
        count_days(Outcome::Breakeven),
    );

    let average_profit = ratio(total_profit, winning_trades as f64);
    let average_loss = ratio(total_loss, losing_trades as f64);

    let report = SummaryReport {
        reference_date,
        total_trades,
        excluded_rows: rows.len() - total_trades,
        winning_trades,
        losing_trades,
        breakeven_trades,
        winning_days,
        losing_days,
        breakeven_days,
        total_profit,
        total_loss,
        net_pnl: total_profit + total_loss,
        trading_volume,
        total_realized_profit,
        total_fee,
        total_funding_fee,
        total_liquidation_fee,
        total_trading_cost,
        win_rate: count_ratio(winning_trades, total_trades) * 100.0,
        average_profit,
        average_loss,
        profit_loss_ratio: ratio(average_profit, average_loss).abs(),
        largest_win,
        largest_loss,
        windows: PnlWindows {
            today: window_summary(rows, TimeWindow::Today, reference_date),
            seven_day: window_summary(rows, TimeWindow::SevenDay, reference_date),
            thirty_day: window_summary(rows, TimeWindow::ThirtyDay, reference_date),
            lifetime: window_summary(rows, TimeWindow::Lifetime, reference_date),
        },
        daily,
        by_symbol: symbol_breakdown(rows),
        latest_balance: latest_balance.map(|(_, b)| b),
        first_trade_at,
        last_trade_at,
    };

    tracing::debug!(
        reference_date = %reference_date,
        total_trades = report.total_trades,
        excluded_rows = report.excluded_rows,
        net_pnl = report.net_pnl,
        win_rate = report.win_rate,
        "Ledger aggregated"
    );

    report
}
