//! Per-row economics
//!
//! Turns a coerced [`RawRow`] into a [`NormalizedRow`]: profit for position
//! ledgers, fee in the ledger's fee mode, trading cost, adjusted profit and
//! traded volume. Missing cost components count as zero.

use crate::models::{ExclusionReason, FeeMode, LedgerShape, NormalizedRow, RawRow, Side};

/// Ledger-wide facts the deriver needs for every row
#[derive(Debug, Clone, Copy)]
pub struct DeriveContext {
    pub shape: LedgerShape,
    pub fee_mode: FeeMode,
    pub apply_leverage: bool,
    pub has_amount: bool,
    pub has_status: bool,
}

/// Gross PnL of a closed position: `(exit - entry) * qty` for longs, the
/// reverse for shorts.
pub fn position_pnl(side: Side, entry_price: f64, exit_price: f64, quantity: f64) -> f64 {
    match side {
        Side::Long => (exit_price - entry_price) * quantity,
        Side::Short => (entry_price - exit_price) * quantity,
    }
}

/// Fee charged as a percentage of entry notional
pub fn percentage_fee(entry_price: f64, quantity: f64, fee_percent: f64) -> f64 {
    entry_price * quantity * fee_percent / 100.0
}

/// Whether a status cell marks a closed position. A missing cell is not closed.
pub fn is_closed_status(status: Option<&str>) -> bool {
    status.map_or(false, |s| s.trim().eq_ignore_ascii_case("closed"))
}

fn exclusion_for(raw: &RawRow, ctx: &DeriveContext) -> Option<ExclusionReason> {
    if ctx.has_status && !is_closed_status(raw.status.as_deref()) {
        return Some(ExclusionReason::NotClosed);
    }

    match ctx.shape {
        LedgerShape::Account if raw.realized_profit.is_none() => Some(ExclusionReason::MissingProfit),
        LedgerShape::Account => None,
        LedgerShape::Position if raw.side.is_none() => Some(ExclusionReason::MissingSide),
        LedgerShape::Position
            if raw.entry_price.is_none() || raw.exit_price.is_none() || raw.quantity.is_none() =>
        {
            Some(ExclusionReason::MissingPrice)
        }
        LedgerShape::Position => None,
    }
}

fn realized_profit(raw: &RawRow, ctx: &DeriveContext) -> f64 {
    match ctx.shape {
        LedgerShape::Account => raw.realized_profit.unwrap_or(0.0),
        LedgerShape::Position => {
            let (Some(side), Some(entry), Some(exit), Some(qty)) =
                (raw.side, raw.entry_price, raw.exit_price, raw.quantity)
            else {
                return 0.0;
            };

            let gross = position_pnl(side, entry, exit, qty);
            if ctx.apply_leverage {
                gross * raw.leverage.filter(|l| *l > 0.0).unwrap_or(1.0)
            } else {
                gross
            }
        }
    }
}

fn fee(raw: &RawRow, ctx: &DeriveContext) -> f64 {
    match ctx.fee_mode {
        FeeMode::Absolute => raw.fee.unwrap_or(0.0),
        FeeMode::Percentage { default_percent } => match (raw.entry_price, raw.quantity) {
            (Some(entry), Some(qty)) => {
                percentage_fee(entry, qty, raw.fee_percent.unwrap_or(default_percent))
            }
            _ => 0.0,
        },
    }
}

fn volume(raw: &RawRow, ctx: &DeriveContext) -> f64 {
    let amount = match (ctx.shape, ctx.has_amount) {
        (LedgerShape::Position, false) => match (raw.entry_price, raw.quantity) {
            (Some(entry), Some(qty)) => entry * qty,
            _ => 0.0,
        },
        _ => raw.amount.unwrap_or(0.0),
    };
    amount.abs()
}

/// Derive the economics of one row
pub fn derive(raw: &RawRow, ctx: &DeriveContext) -> NormalizedRow {
    let realized_profit = realized_profit(raw, ctx);
    let fee = fee(raw, ctx);
    let funding_fee = raw.funding_fee.unwrap_or(0.0);
    let liquidation_fee = raw.liquidation_fee.unwrap_or(0.0);
    let trading_cost = fee + funding_fee + liquidation_fee;

    NormalizedRow {
        index: raw.index,
        timestamp: raw.timestamp,
        opened_at: raw.opened_at,
        symbol: raw.symbol.clone(),
        side: raw.side,
        status: raw.status.clone(),
        entry_price: raw.entry_price,
        exit_price: raw.exit_price,
        quantity: raw.quantity,
        leverage: raw.leverage,
        balance: raw.balance,
        realized_profit,
        fee,
        funding_fee,
        liquidation_fee,
        trading_cost,
        adjusted_profit: realized_profit - trading_cost,
        volume: volume(raw, ctx),
        exclusion: exclusion_for(raw, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn account_ctx() -> DeriveContext {
        DeriveContext {
            shape: LedgerShape::Account,
            fee_mode: FeeMode::Absolute,
            apply_leverage: false,
            has_amount: true,
            has_status: false,
        }
    }

    fn position_ctx(fee_mode: FeeMode) -> DeriveContext {
        DeriveContext {
            shape: LedgerShape::Position,
            fee_mode,
            apply_leverage: false,
            has_amount: false,
            has_status: false,
        }
    }

    fn position(side: Side, entry: f64, exit: f64, qty: f64) -> RawRow {
        RawRow {
            side: Some(side),
            entry_price: Some(entry),
            exit_price: Some(exit),
            quantity: Some(qty),
            ..Default::default()
        }
    }

    #[test]
    fn test_position_pnl_long_and_short() {
        assert!((position_pnl(Side::Long, 50000.0, 55000.0, 1.0) - 5000.0).abs() < EPS);
        assert!((position_pnl(Side::Short, 50000.0, 45000.0, 1.0) - 5000.0).abs() < EPS);
        assert!((position_pnl(Side::Short, 100.0, 110.0, 2.0) + 20.0).abs() < EPS);
    }

    #[test]
    fn test_percentage_fee_mode() {
        let ctx = position_ctx(FeeMode::Percentage { default_percent: 0.1 });

        let long = derive(&position(Side::Long, 50000.0, 55000.0, 1.0), &ctx);
        assert!((long.fee - 50.0).abs() < EPS);
        assert!((long.pnl() - 4950.0).abs() < EPS);
        assert!((long.adjusted_profit - 4950.0).abs() < EPS);

        let short = derive(&position(Side::Short, 50000.0, 45000.0, 1.0), &ctx);
        assert!((short.adjusted_profit - 4950.0).abs() < EPS);
    }

    #[test]
    fn test_row_fee_percent_overrides_default() {
        let ctx = position_ctx(FeeMode::Percentage { default_percent: 0.1 });
        let mut raw = position(Side::Long, 100.0, 110.0, 10.0);
        raw.fee_percent = Some(0.5);
        raw.fee = Some(999.0);

        let row = derive(&raw, &ctx);
        assert!((row.fee - 5.0).abs() < EPS);
        assert!((row.adjusted_profit - 95.0).abs() < EPS);
    }

    #[test]
    fn test_absolute_fee_mode_on_positions() {
        let ctx = position_ctx(FeeMode::Absolute);
        let mut raw = position(Side::Long, 100.0, 110.0, 10.0);
        raw.fee = Some(3.0);
        raw.funding_fee = Some(1.5);

        let row = derive(&raw, &ctx);
        assert!((row.trading_cost - 4.5).abs() < EPS);
        assert!((row.adjusted_profit - 95.5).abs() < EPS);
        assert!((row.volume - 1000.0).abs() < EPS);
    }

    #[test]
    fn test_leverage_scaling_is_opt_in() {
        let mut raw = position(Side::Long, 100.0, 110.0, 1.0);
        raw.leverage = Some(5.0);

        let plain = derive(&raw, &position_ctx(FeeMode::Absolute));
        assert!((plain.realized_profit - 10.0).abs() < EPS);

        let mut ctx = position_ctx(FeeMode::Absolute);
        ctx.apply_leverage = true;
        let scaled = derive(&raw, &ctx);
        assert!((scaled.realized_profit - 50.0).abs() < EPS);

        raw.leverage = Some(0.0);
        let zero = derive(&raw, &ctx);
        assert!((zero.realized_profit - 10.0).abs() < EPS);
    }

    #[test]
    fn test_account_adjusted_profit() {
        let raw = RawRow {
            realized_profit: Some(-100.0),
            fee: Some(5.0),
            funding_fee: Some(2.0),
            liquidation_fee: Some(0.0),
            amount: Some(-250.0),
            ..Default::default()
        };

        let row = derive(&raw, &account_ctx());
        assert!((row.trading_cost - 7.0).abs() < EPS);
        assert!((row.adjusted_profit + 107.0).abs() < EPS);
        assert!((row.volume - 250.0).abs() < EPS);
        assert!(row.is_included());
    }

    #[test]
    fn test_exclusion_reasons() {
        let missing_side = RawRow {
            entry_price: Some(1.0),
            exit_price: Some(2.0),
            quantity: Some(1.0),
            ..Default::default()
        };
        let row = derive(&missing_side, &position_ctx(FeeMode::Absolute));
        assert_eq!(row.exclusion, Some(ExclusionReason::MissingSide));
        assert_eq!(row.adjusted_profit, 0.0);

        let mut missing_exit = position(Side::Long, 1.0, 0.0, 1.0);
        missing_exit.exit_price = None;
        let row = derive(&missing_exit, &position_ctx(FeeMode::Absolute));
        assert_eq!(row.exclusion, Some(ExclusionReason::MissingPrice));

        let mut ctx = account_ctx();
        ctx.has_status = true;
        let open = RawRow {
            realized_profit: Some(5.0),
            status: Some("Open".to_string()),
            ..Default::default()
        };
        let row = derive(&open, &ctx);
        assert_eq!(row.exclusion, Some(ExclusionReason::NotClosed));
        assert_eq!(row.adjusted_profit, 5.0);

        let closed = RawRow {
            realized_profit: Some(5.0),
            status: Some("CLOSED".to_string()),
            ..Default::default()
        };
        assert!(derive(&closed, &ctx).is_included());
    }
}
