//! Performance statistics from a trade list and an equity curve.

use serde::Serialize;

use super::Trade;

pub const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction of trades with positive P&L
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub final_capital: f64,
    /// Annualised stdev of per-step equity returns
    pub volatility: f64,
    /// Largest peak-to-trough decline as a fraction of the peak
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    /// Gross profit over gross loss; infinite when nothing was lost
    pub profit_factor: f64,
    pub expectancy: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_winner: f64,
    pub largest_loser: f64,
    pub average_trade: f64,
}

/// Relative change between consecutive equity points
pub fn step_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst: f64 = 0.0;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Annualised Sharpe ratio of per-step returns against `risk_free_rate` (annual)
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = population_std(&excess);
    if std == 0.0 {
        return 0.0;
    }
    mean(&excess) / std * TRADING_DAYS.sqrt()
}

pub fn compute_metrics(trades: &[Trade], equity: &[f64], initial_capital: f64, risk_free_rate: f64) -> Metrics {
    let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p < 0.0).collect();

    let total_trades = trades.len();
    let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = -losses.iter().sum::<f64>();

    let win_rate = if total_trades > 0 { wins.len() as f64 / total_trades as f64 } else { 0.0 };
    let average_win = mean(&wins);
    let average_loss = if losses.is_empty() { 0.0 } else { gross_loss / losses.len() as f64 };

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let final_capital = equity.last().copied().unwrap_or(initial_capital);
    let total_return_pct = if initial_capital > 0.0 {
        (final_capital - initial_capital) / initial_capital * 100.0
    } else {
        0.0
    };

    let returns = step_returns(equity);

    Metrics {
        total_trades,
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate,
        total_pnl,
        total_return_pct,
        final_capital,
        volatility: population_std(&returns) * TRADING_DAYS.sqrt(),
        max_drawdown: max_drawdown(equity),
        sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
        profit_factor,
        expectancy: win_rate * average_win - (1.0 - win_rate) * average_loss,
        average_win,
        average_loss,
        largest_winner: wins.iter().copied().fold(0.0, f64::max),
        largest_loser: losses.iter().copied().fold(0.0, f64::min),
        average_trade: if total_trades > 0 { total_pnl / total_trades as f64 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{ExitReason, Side};
    use crate::domain::market_data::Timestamp;

    fn trade(pnl: f64) -> Trade {
        Trade {
            side: Side::Long,
            entry: 100.0,
            exit: 100.0 + pnl,
            shares: 1.0,
            pnl,
            return_pct: pnl,
            entry_time: Timestamp::from(0),
            exit_time: Timestamp::from(60),
            reason: ExitReason::Signal,
        }
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        assert_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]), 0.25);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn win_loss_statistics() {
        let trades = [trade(30.0), trade(-10.0), trade(10.0), trade(-20.0)];
        let m = compute_metrics(&trades, &[1000.0, 1010.0], 1000.0, 0.0);
        assert_eq!(m.total_trades, 4);
        assert_eq!(m.win_rate, 0.5);
        assert_eq!(m.total_pnl, 10.0);
        assert_eq!(m.profit_factor, 40.0 / 30.0);
        assert_eq!(m.average_win, 20.0);
        assert_eq!(m.average_loss, 15.0);
        assert_eq!(m.expectancy, 2.5);
        assert_eq!(m.largest_winner, 30.0);
        assert_eq!(m.largest_loser, -20.0);
        assert_eq!(m.average_trade, 2.5);
        assert!((m.total_return_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sharpe_and_volatility_are_annualised() {
        // Step returns +10%, -10%, +10%: mean 1/30, population stdev sqrt(2)/15
        let equity = [100.0, 110.0, 99.0, 108.9];
        let std = 2f64.sqrt() / 15.0;

        let m = compute_metrics(&[], &equity, 100.0, 0.0);
        assert!((m.volatility - std * TRADING_DAYS.sqrt()).abs() < 1e-9);
        assert!((m.sharpe_ratio - 31.5f64.sqrt()).abs() < 1e-9);

        // 25.2% a year is 0.1% per step
        let with_rf = compute_metrics(&[], &equity, 100.0, 0.252);
        let expected = (1.0 / 30.0 - 0.001) / std * TRADING_DAYS.sqrt();
        assert!((with_rf.sharpe_ratio - expected).abs() < 1e-9);
        assert!(with_rf.sharpe_ratio < m.sharpe_ratio);
        assert_eq!(with_rf.volatility, m.volatility);
    }

    #[test]
    fn profit_factor_without_losses_is_infinite() {
        let m = compute_metrics(&[trade(5.0)], &[100.0, 105.0], 100.0, 0.0);
        assert!(m.profit_factor.is_infinite());
        let empty = compute_metrics(&[], &[100.0], 100.0, 0.0);
        assert_eq!(empty.profit_factor, 0.0);
        assert_eq!(empty.sharpe_ratio, 0.0);
        assert_eq!(empty.win_rate, 0.0);
    }
}
