//! Error taxonomy for the charting core.
//!
//! Every variant maps onto a machine-readable [`ErrorKind`] and carries the
//! structured context (symbol, strategy, parameter) needed for diagnostics.

use strum::{AsRefStr, Display as StrumDisplay};

pub type Result<T> = std::result::Result<T, DomainError>;

/// Machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidCandle,
    MalformedUpdate,
    StaleUpdate,
    StrategyNotFound,
    StrategyFailed,
    InvalidParams,
    InsufficientData,
    BacktestCancelled,
    InvalidConfig,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid candle for {symbol} at {time}: {reason}")]
    InvalidCandle { symbol: String, time: u64, reason: String },

    #[error("malformed update for {symbol}: {reason}")]
    MalformedUpdate { symbol: String, reason: String },

    #[error("stale update for {symbol}: epoch {epoch} is older than open bucket {open_bucket}")]
    StaleUpdate { symbol: String, epoch: u64, open_bucket: u64 },

    #[error("strategy not found: {name}")]
    StrategyNotFound { name: String },

    #[error("strategy {strategy} failed at candle {index}: {reason}")]
    StrategyFailed { strategy: String, index: usize, reason: String },

    #[error("invalid parameter {param} = {value} for {owner}: {reason}")]
    InvalidParams { owner: String, param: String, value: f64, reason: String },

    #[error("insufficient data for {operation}: need {need}, got {got}")]
    InsufficientData { operation: String, need: usize, got: usize },

    #[error("backtest of {strategy} cancelled after {processed} candles")]
    BacktestCancelled { strategy: String, processed: usize },

    #[error("invalid config field {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCandle { .. } => ErrorKind::InvalidCandle,
            Self::MalformedUpdate { .. } => ErrorKind::MalformedUpdate,
            Self::StaleUpdate { .. } => ErrorKind::StaleUpdate,
            Self::StrategyNotFound { .. } => ErrorKind::StrategyNotFound,
            Self::StrategyFailed { .. } => ErrorKind::StrategyFailed,
            Self::InvalidParams { .. } => ErrorKind::InvalidParams,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::BacktestCancelled { .. } => ErrorKind::BacktestCancelled,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
        }
    }

    /// Compact `key=value` context for log metadata
    pub fn context(&self) -> String {
        match self {
            Self::InvalidCandle { symbol, time, .. } => format!("symbol={symbol} time={time}"),
            Self::MalformedUpdate { symbol, .. } => format!("symbol={symbol}"),
            Self::StaleUpdate { symbol, epoch, open_bucket } => {
                format!("symbol={symbol} epoch={epoch} open_bucket={open_bucket}")
            }
            Self::StrategyNotFound { name } => format!("strategy={name}"),
            Self::StrategyFailed { strategy, index, .. } => {
                format!("strategy={strategy} index={index}")
            }
            Self::InvalidParams { owner, param, value, .. } => {
                format!("owner={owner} param={param} value={value}")
            }
            Self::InsufficientData { operation, need, got } => {
                format!("operation={operation} need={need} got={got}")
            }
            Self::BacktestCancelled { strategy, processed } => {
                format!("strategy={strategy} processed={processed}")
            }
            Self::InvalidConfig { field, .. } => format!("field={field}"),
        }
    }

    pub fn invalid_param(owner: &str, param: &str, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            owner: owner.to_string(),
            param: param.to_string(),
            value,
            reason: reason.into(),
        }
    }

    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig { field: field.to_string(), reason: reason.into() }
    }
}
