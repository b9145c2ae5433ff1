//! Backtests driven from the UI thread: chunked so the page stays
//! responsive, cancellable from outside, with progress reporting.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{
    backtest::{
        BacktestOptions, BacktestResult, BacktestRun, Backtester, CancellationToken, ParameterSpace,
        RankMetric, SweepResult, optimize,
    },
    errors::Result,
    logging::{LogComponent, LogLevel, log_domain_error},
    market_data::Candle,
    strategy::{StrategyParams, StrategyRegistry},
};
use crate::log_info;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacktestProgress {
    pub processed: usize,
    pub total: usize,
    pub fraction: f64,
}

/// Drive `run` to completion `chunk_size` candles at a time, awaiting
/// `yield_now` between chunks. Cancellation is observed at candle granularity.
pub async fn run_backtest_chunked<Y, Fut, P>(
    mut run: BacktestRun,
    chunk_size: usize,
    mut yield_now: Y,
    mut on_progress: P,
) -> Result<BacktestResult>
where
    Y: FnMut() -> Fut,
    Fut: Future<Output = ()>,
    P: FnMut(BacktestProgress),
{
    let chunk_size = chunk_size.max(1);
    loop {
        run.advance(chunk_size)?;
        on_progress(BacktestProgress {
            processed: run.processed(),
            total: run.tradable(),
            fraction: run.progress(),
        });
        if run.is_complete() {
            break;
        }
        yield_now().await;
    }
    run.finish()
}

/// Hand control back to the browser event loop
pub async fn browser_yield() {
    gloo_timers::future::TimeoutFuture::new(0).await;
}

/// Owns the backtester and the token of the run in flight
pub struct BacktestUseCase {
    backtester: Backtester,
    chunk_size: usize,
    current: RefCell<Option<CancellationToken>>,
}

impl BacktestUseCase {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { backtester: Backtester::new(registry), chunk_size: DEFAULT_CHUNK_SIZE, current: RefCell::new(None) }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn backtester(&self) -> &Backtester {
        &self.backtester
    }

    /// Start a run, cancelling any run still in flight
    pub async fn execute<Y, Fut, P>(
        &self,
        strategy: &str,
        candles: Arc<[Candle]>,
        overrides: &StrategyParams,
        options: BacktestOptions,
        yield_now: Y,
        on_progress: P,
    ) -> Result<BacktestResult>
    where
        Y: FnMut() -> Fut,
        Fut: Future<Output = ()>,
        P: FnMut(BacktestProgress),
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.replace(Some(token.clone())) {
            previous.cancel();
        }

        log_info!(
            LogComponent::Application("BacktestUseCase"),
            "📈 Backtesting {} over {} candles",
            strategy,
            candles.len()
        );

        let result = match self.backtester.prepare(strategy, candles, overrides, options, token) {
            Ok(run) => run_backtest_chunked(run, self.chunk_size, yield_now, on_progress).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(r) => {
                log_info!(
                    LogComponent::Application("BacktestUseCase"),
                    "🏁 {}: {} trades, final capital {:.2}",
                    r.strategy,
                    r.trades.len(),
                    r.metrics.final_capital
                );
            }
            Err(e) => {
                log_domain_error(
                    LogLevel::Warn,
                    LogComponent::Application("BacktestUseCase"),
                    "⚠️ Backtest did not complete",
                    e,
                );
            }
        }
        result
    }

    /// Cancel the most recently started run; returns whether one was started
    pub fn cancel(&self) -> bool {
        match self.current.borrow_mut().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn optimize(
        &self,
        strategy: &str,
        candles: Arc<[Candle]>,
        space: &ParameterSpace,
        options: BacktestOptions,
        metric: RankMetric,
    ) -> Result<Vec<SweepResult>> {
        optimize(&self.backtester, strategy, candles, space, options, metric, CancellationToken::new())
    }
}
