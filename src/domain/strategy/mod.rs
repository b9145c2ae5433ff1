//! Strategy engine: pluggable signal generators behind one capability.

pub mod builtin;
pub mod confidence;
pub mod registry;

pub use builtin::*;
pub use confidence::*;
pub use registry::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};

use crate::domain::{
    errors::{DomainError, Result},
    market_data::{Candle, Timestamp},
};

/// Declared tunable parameter with default and inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl ParamSpec {
    pub const fn new(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self { name, default, min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Resolved parameter values keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, f64>);

impl StrategyParams {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Required value; a missing name is an `INVALID_PARAMS` error for `owner`
    pub fn value(&self, owner: &str, name: &str) -> Result<f64> {
        self.get(name)
            .ok_or_else(|| DomainError::invalid_param(owner, name, f64::NAN, "missing parameter"))
    }

    /// Required value used as a window length
    pub fn period(&self, owner: &str, name: &str) -> Result<usize> {
        let value = self.value(owner, name)?;
        if value < 1.0 {
            return Err(DomainError::invalid_param(owner, name, value, "period must be >= 1"));
        }
        Ok(value.round() as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for StrategyParams {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, StrumDisplay)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub side: SignalType,
    pub reason: String,
    pub confidence: f64,
    pub time: Timestamp,
}

/// A named signal generator. `evaluate` looks at the last candle of the slice
/// and everything before it; too little history yields `Ok(None)`.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    fn params(&self) -> &'static [ParamSpec];

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>>;

    /// Schema defaults as a parameter set
    fn default_params(&self) -> StrategyParams {
        self.params().iter().map(|p| (p.name.to_string(), p.default)).collect()
    }
}
