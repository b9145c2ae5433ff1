//! Chart configuration read through an injected settings collaborator.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    backtest::BacktestOptions,
    errors::{DomainError, Result},
    logging::{LogComponent, LogLevel, log_domain_error},
    market_data::AggregatorConfig,
    strategy::StrategyParams,
};
use crate::log_warn;

pub const CONFIG_KEY: &str = "market-chart.config";

/// Key/value storage collaborator
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store for native use and tests
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 20,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    /// Trailing window used for significance scoring
    pub window: usize,
    pub level_periods: usize,
    pub level_tolerance: f64,
    pub min_significance: f64,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self { window: 5, level_periods: 5, level_tolerance: 0.001, min_significance: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStrategy {
    pub name: String,
    #[serde(default)]
    pub params: StrategyParams,
}

impl ActiveStrategy {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), params: StrategyParams::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub max_candles: usize,
    pub fill_gaps: bool,
    pub indicators: IndicatorSettings,
    pub patterns: PatternSettings,
    pub active_strategies: Vec<ActiveStrategy>,
    pub backtest: BacktestOptions,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_candles: 1000,
            fill_gaps: true,
            indicators: IndicatorSettings::default(),
            patterns: PatternSettings::default(),
            active_strategies: Vec::new(),
            backtest: BacktestOptions::default(),
        }
    }
}

impl ChartConfig {
    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig { max_candles: self.max_candles, fill_gaps: self.fill_gaps }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_candles == 0 {
            return Err(DomainError::invalid_config("max_candles", "must be at least 1"));
        }

        let ind = &self.indicators;
        let periods = [
            ("indicators.sma_period", ind.sma_period),
            ("indicators.ema_period", ind.ema_period),
            ("indicators.rsi_period", ind.rsi_period),
            ("indicators.macd_fast", ind.macd_fast),
            ("indicators.macd_slow", ind.macd_slow),
            ("indicators.macd_signal", ind.macd_signal),
            ("indicators.bollinger_period", ind.bollinger_period),
            ("patterns.window", self.patterns.window),
            ("patterns.level_periods", self.patterns.level_periods),
        ];
        for (field, period) in periods {
            if period == 0 {
                return Err(DomainError::invalid_config(field, "period must be at least 1"));
            }
        }
        if !ind.bollinger_k.is_finite() || ind.bollinger_k < 0.0 {
            return Err(DomainError::invalid_config("indicators.bollinger_k", "must be non-negative"));
        }
        if !self.patterns.level_tolerance.is_finite() || self.patterns.level_tolerance < 0.0 {
            return Err(DomainError::invalid_config("patterns.level_tolerance", "must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.patterns.min_significance) {
            return Err(DomainError::invalid_config("patterns.min_significance", "must be in [0, 1]"));
        }
        if let Some(empty) = self.active_strategies.iter().find(|s| s.name.trim().is_empty()) {
            return Err(DomainError::invalid_config("active_strategies", format!("empty name in {empty:?}")));
        }

        self.backtest.validate()
    }

    /// Read and validate the stored config; missing or broken settings fall back to defaults.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let Some(raw) = store.get(CONFIG_KEY) else {
            return Self::default();
        };

        let parsed = serde_json::from_str::<ChartConfig>(&raw)
            .map_err(|e| DomainError::invalid_config(CONFIG_KEY, e.to_string()))
            .and_then(|config| config.validate().map(|_| config));

        match parsed {
            Ok(config) => config,
            Err(e) => {
                log_domain_error(
                    LogLevel::Warn,
                    LogComponent::Domain("ChartConfig"),
                    "⚠️ Stored config rejected, using defaults",
                    &e,
                );
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        self.validate()?;
        let raw = serde_json::to_string(self).map_err(|e| DomainError::invalid_config(CONFIG_KEY, e.to_string()))?;
        store.set(CONFIG_KEY, &raw).inspect_err(|e| {
            log_warn!(LogComponent::Domain("ChartConfig"), "⚠️ Failed to persist config: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ChartConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backtest.warmup, 50);
        assert_eq!(config.indicators.macd_slow, 26);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ChartConfig = serde_json::from_str(r#"{"max_candles": 200, "backtest": {"warmup": 10}}"#).unwrap();
        assert_eq!(config.max_candles, 200);
        assert_eq!(config.backtest.warmup, 10);
        assert_eq!(config.backtest.initial_capital, 10_000.0);
        assert!(config.fill_gaps);
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut config = ChartConfig::default();
        config.indicators.rsi_period = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind().as_ref(), "INVALID_CONFIG");
        assert_eq!(err.context(), "field=indicators.rsi_period");
    }
}
