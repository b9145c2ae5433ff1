//! Backtest run as an explicit fold over candles.
//!
//! `BacktestRun` owns the whole run state (`capital`, open `Position`, trade
//! list, equity curve) and moves through it one candle at a time, so a caller
//! can advance in chunks, check cancellation between candles, or stop early.

use std::sync::Arc;

use super::{
    BacktestOptions, BacktestResult, CancellationToken, ExitReason, Position, Side, Trade,
    compute_metrics,
};
use crate::domain::{
    errors::{DomainError, Result},
    logging::{LogComponent, LogLevel, log_domain_error},
    market_data::{Candle, Timestamp},
    strategy::{SignalType, Strategy, StrategyParams, StrategyRegistry},
};
use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Flat,
    Open,
}

pub struct BacktestRun {
    strategy: Arc<dyn Strategy>,
    params: StrategyParams,
    candles: Arc<[Candle]>,
    options: BacktestOptions,
    cancel: CancellationToken,
    cursor: usize,
    capital: f64,
    position: Option<Position>,
    trades: Vec<Trade>,
    equity: Vec<f64>,
}

impl BacktestRun {
    /// Prepare a run; `params` must already be resolved against the schema.
    pub fn new(
        strategy: Arc<dyn Strategy>,
        params: StrategyParams,
        candles: Arc<[Candle]>,
        options: BacktestOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        options.validate()?;
        if candles.len() < options.warmup {
            return Err(DomainError::InsufficientData {
                operation: format!("backtest:{}", strategy.name()),
                need: options.warmup,
                got: candles.len(),
            });
        }

        let mut equity = Vec::with_capacity(candles.len() - options.warmup + 1);
        equity.push(options.initial_capital);

        Ok(Self {
            strategy,
            params,
            cursor: options.warmup,
            capital: options.initial_capital,
            candles,
            options,
            cancel,
            position: None,
            trades: Vec::new(),
            equity,
        })
    }

    pub fn state(&self) -> RunState {
        if self.position.is_some() { RunState::Open } else { RunState::Flat }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.candles.len()
    }

    /// Processed candles as a fraction of the tradable range
    pub fn progress(&self) -> f64 {
        let total = self.candles.len() - self.options.warmup;
        if total == 0 {
            return 1.0;
        }
        (self.cursor - self.options.warmup) as f64 / total as f64
    }

    pub fn processed(&self) -> usize {
        self.cursor - self.options.warmup
    }

    /// Candles after the warm-up window
    pub fn tradable(&self) -> usize {
        self.candles.len() - self.options.warmup
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity(&self) -> &[f64] {
        &self.equity
    }

    /// Process up to `max_candles` candles; returns how many were processed.
    pub fn advance(&mut self, max_candles: usize) -> Result<usize> {
        let mut done = 0;
        while done < max_candles && !self.is_complete() {
            if self.cancel.is_cancelled() {
                return Err(DomainError::BacktestCancelled {
                    strategy: self.strategy.name().to_string(),
                    processed: self.processed(),
                });
            }
            self.step()?;
            done += 1;
        }
        Ok(done)
    }

    fn step(&mut self) -> Result<()> {
        let index = self.cursor;
        let candle = self.candles[index];

        // Stop-loss is checked first when both levels lie inside the candle
        if let Some(position) = self.position {
            if position.stop_hit(candle.low(), candle.high()) {
                self.close_position(position.stop_price, candle.timestamp, ExitReason::StopLoss);
            } else if position.target_hit(candle.low(), candle.high()) {
                self.close_position(position.target_price, candle.timestamp, ExitReason::TakeProfit);
            }
        }

        let signal = self
            .strategy
            .evaluate(&self.candles[..=index], &self.params)
            .map_err(|e| DomainError::StrategyFailed {
                strategy: self.strategy.name().to_string(),
                index,
                reason: e.to_string(),
            })?;

        if let Some(signal) = signal {
            match self.position {
                Some(position) => {
                    let exits = match position.side {
                        Side::Long => signal.side == SignalType::Sell,
                        Side::Short => signal.side == SignalType::Buy,
                    };
                    if exits {
                        self.close_position(candle.close(), candle.timestamp, ExitReason::Signal);
                    }
                }
                None => {
                    let side = match signal.side {
                        SignalType::Buy => Side::Long,
                        SignalType::Sell => Side::Short,
                    };
                    self.open_position(side, &candle);
                }
            }
        }

        let mark = match &self.position {
            Some(position) => self.capital + position.market_value(candle.close()),
            None => self.capital,
        };
        self.equity.push(mark);
        self.cursor += 1;
        Ok(())
    }

    fn open_position(&mut self, side: Side, candle: &Candle) {
        let price = candle.close();
        // Entry commission comes out of the same allocation
        let unit_cost = price * (1.0 + self.options.commission_pct);
        let shares = (self.capital * self.options.position_size / unit_cost).floor();
        if shares < 1.0 {
            log_debug!(
                LogComponent::Domain("Backtester"),
                "💸 Capital {:.2} too small for one share at {:.4}",
                self.capital,
                price
            );
            return;
        }

        let cost = shares * unit_cost;
        let (stop_price, target_price) = match side {
            Side::Long => (
                price * (1.0 - self.options.stop_loss_pct),
                price * (1.0 + self.options.take_profit_pct),
            ),
            Side::Short => (
                price * (1.0 + self.options.stop_loss_pct),
                price * (1.0 - self.options.take_profit_pct),
            ),
        };

        self.capital -= cost;
        self.position = Some(Position {
            side,
            entry_price: price,
            shares,
            stop_price,
            target_price,
            entry_time: candle.timestamp,
            cost,
        });
        log_debug!(
            LogComponent::Domain("Backtester"),
            "📈 Opened {} {} @ {:.4}",
            side,
            shares,
            price
        );
    }

    fn close_position(&mut self, price: f64, time: Timestamp, reason: ExitReason) {
        let Some(position) = self.position.take() else {
            return;
        };
        let commission = position.shares * price * self.options.commission_pct;
        let proceeds = position.market_value(price) - commission;
        let pnl = proceeds - position.cost;

        self.capital += proceeds;
        self.trades.push(Trade {
            side: position.side,
            entry: position.entry_price,
            exit: price,
            shares: position.shares,
            pnl,
            return_pct: if position.cost > 0.0 { pnl / position.cost * 100.0 } else { 0.0 },
            entry_time: position.entry_time,
            exit_time: time,
            reason,
        });
    }

    /// Run any remaining candles, force-close an open position and compute metrics.
    pub fn finish(mut self) -> Result<BacktestResult> {
        self.advance(usize::MAX)?;

        if self.position.is_some() {
            if let Some(last) = self.candles.last().copied() {
                self.close_position(last.close(), last.timestamp, ExitReason::Exit);
                // The curve ends at realised capital
                if let Some(point) = self.equity.last_mut() {
                    *point = self.capital;
                }
            }
        }

        let metrics = compute_metrics(
            &self.trades,
            &self.equity,
            self.options.initial_capital,
            self.options.risk_free_rate,
        );

        Ok(BacktestResult {
            strategy: self.strategy.name().to_string(),
            params: self.params,
            trades: self.trades,
            equity: self.equity,
            metrics,
        })
    }
}

/// Synchronous backtest entry point
#[derive(Debug, Clone)]
pub struct Backtester {
    registry: StrategyRegistry,
}

impl Backtester {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Resolve the strategy and its parameters and prepare a resumable run
    pub fn prepare(
        &self,
        strategy: &str,
        candles: Arc<[Candle]>,
        overrides: &StrategyParams,
        options: BacktestOptions,
        cancel: CancellationToken,
    ) -> Result<BacktestRun> {
        let implementation = self.registry.get(strategy)?;
        let params = self.registry.resolve_params(strategy, overrides)?;
        BacktestRun::new(implementation, params, candles, options, cancel)
    }

    pub fn run(
        &self,
        strategy: &str,
        candles: Arc<[Candle]>,
        overrides: &StrategyParams,
        options: BacktestOptions,
        cancel: CancellationToken,
    ) -> Result<BacktestResult> {
        let result = self
            .prepare(strategy, candles, overrides, options, cancel)
            .and_then(BacktestRun::finish);

        match &result {
            Ok(r) => {
                log_info!(
                    LogComponent::Domain("Backtester"),
                    "🏁 {}: {} trades, return {:.2}%, sharpe {:.3}",
                    r.strategy,
                    r.trades.len(),
                    r.metrics.total_return_pct,
                    r.metrics.sharpe_ratio
                );
            }
            Err(e) => {
                log_domain_error(LogLevel::Error, LogComponent::Domain("Backtester"), "❌ Backtest aborted", e);
            }
        }
        result
    }
}
