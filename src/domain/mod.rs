//! Pure, synchronous charting core: candle aggregation, indicators,
//! patterns, strategies and backtesting.

pub mod backtest;
pub mod config;
pub mod errors;
pub mod events;
pub mod indicators;
pub mod logging;
pub mod market_data;
pub mod patterns;
pub mod strategy;
