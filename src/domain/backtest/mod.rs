//! Strategy replay over historical candles.

pub mod engine;
pub mod metrics;
pub mod optimizer;

pub use engine::*;
pub use metrics::*;
pub use optimizer::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};

use crate::domain::{
    errors::{DomainError, Result},
    market_data::Timestamp,
    strategy::StrategyParams,
};

/// Risk and sizing rules for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestOptions {
    pub initial_capital: f64,
    /// Fraction of available capital committed per entry
    pub position_size: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub commission_pct: f64,
    /// Annual risk-free rate used by the Sharpe ratio
    pub risk_free_rate: f64,
    /// Candles consumed before trading starts
    pub warmup: usize,
}

impl Default for BacktestOptions {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            position_size: 0.1,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            commission_pct: 0.001,
            risk_free_rate: 0.0,
            warmup: 50,
        }
    }
}

impl BacktestOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(DomainError::invalid_config("backtest.initial_capital", "must be positive"));
        }
        if !(self.position_size > 0.0 && self.position_size <= 1.0) {
            return Err(DomainError::invalid_config("backtest.position_size", "must be in (0, 1]"));
        }
        let percentages = [
            ("backtest.stop_loss_pct", self.stop_loss_pct),
            ("backtest.take_profit_pct", self.take_profit_pct),
            ("backtest.commission_pct", self.commission_pct),
        ];
        for (field, value) in percentages {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::invalid_config(field, "must be a non-negative number"));
            }
        }
        if !self.risk_free_rate.is_finite() {
            return Err(DomainError::invalid_config("backtest.risk_free_rate", "must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, StrumDisplay)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
    Exit,
}

/// Open trade between entry and exit fills
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub shares: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub entry_time: Timestamp,
    /// Capital committed including entry commission
    pub cost: f64,
}

impl Position {
    /// Gross value of the position at `price`, before exit commission
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.shares * price,
            Side::Short => self.shares * (2.0 * self.entry_price - price),
        }
    }

    pub fn stop_hit(&self, low: f64, high: f64) -> bool {
        match self.side {
            Side::Long => low <= self.stop_price,
            Side::Short => high >= self.stop_price,
        }
    }

    pub fn target_hit(&self, low: f64, high: f64) -> bool {
        match self.side {
            Side::Long => high >= self.target_price,
            Side::Short => low <= self.target_price,
        }
    }
}

/// Closed position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trade {
    pub side: Side,
    pub entry: f64,
    pub exit: f64,
    pub shares: f64,
    pub pnl: f64,
    pub return_pct: f64,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub params: StrategyParams,
    pub trades: Vec<Trade>,
    /// One point per processed candle, starting with initial capital
    pub equity: Vec<f64>,
    pub metrics: Metrics,
}

/// Cooperative cancellation flag shared between a run and its owner
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
