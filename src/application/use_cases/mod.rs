pub mod run_backtest;

pub use run_backtest::*;
