use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use super::{
    BreakoutStrategy, MacdCrossoverStrategy, MaCrossoverStrategy, MeanReversionStrategy,
    ParamSpec, PatternReversalStrategy, RsiReversalStrategy, Strategy, StrategyParams,
    TrendFollowingStrategy,
};
use crate::domain::errors::{DomainError, Result};
use crate::domain::logging::{LogComponent, LogLevel, log_domain_error};
use crate::log_debug;

/// Listing entry for UIs and the WASM facade
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

/// Name → implementation mapping with schemas validated on registration
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self { strategies: BTreeMap::new() }
    }

    /// Registry preloaded with every built-in strategy
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn Strategy>; 7] = [
            Arc::new(MaCrossoverStrategy),
            Arc::new(RsiReversalStrategy),
            Arc::new(MacdCrossoverStrategy),
            Arc::new(BreakoutStrategy),
            Arc::new(PatternReversalStrategy),
            Arc::new(TrendFollowingStrategy),
            Arc::new(MeanReversionStrategy),
        ];
        for strategy in builtins {
            if let Err(e) = registry.register(strategy) {
                log_domain_error(
                    LogLevel::Error,
                    LogComponent::Domain("StrategyRegistry"),
                    "❌ Built-in strategy rejected",
                    &e,
                );
            }
        }
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn Strategy>) -> Result<()> {
        let name = strategy.name();
        if name.trim().is_empty() {
            return Err(DomainError::invalid_param(name, "name", f64::NAN, "strategy name is empty"));
        }
        if self.strategies.contains_key(name) {
            return Err(DomainError::invalid_param(name, "name", f64::NAN, "strategy already registered"));
        }
        validate_schema(name, strategy.params())?;

        log_debug!(LogComponent::Domain("StrategyRegistry"), "🧩 Registered strategy {}", name);
        self.strategies.insert(name.to_string(), strategy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::StrategyNotFound { name: name.to_string() })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<StrategyInfo> {
        self.strategies
            .values()
            .map(|s| StrategyInfo {
                name: s.name(),
                description: s.description(),
                params: s.params().to_vec(),
            })
            .collect()
    }

    /// Defaults merged with `overrides`; unknown names and out-of-range values
    /// are rejected.
    pub fn resolve_params(&self, name: &str, overrides: &StrategyParams) -> Result<StrategyParams> {
        let strategy = self.get(name)?;
        let schema = strategy.params();
        let mut params = strategy.default_params();

        for (key, &value) in overrides.iter() {
            let spec = schema
                .iter()
                .find(|p| p.name == key.as_str())
                .ok_or_else(|| DomainError::invalid_param(name, key, value, "unknown parameter"))?;
            if !spec.contains(value) {
                return Err(DomainError::invalid_param(
                    name,
                    key,
                    value,
                    format!("expected {} ..= {}", spec.min, spec.max),
                ));
            }
            params.insert(key, value);
        }
        Ok(params)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry").field("strategies", &self.names()).finish()
    }
}

fn validate_schema(owner: &str, schema: &[ParamSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in schema {
        if spec.name.trim().is_empty() {
            return Err(DomainError::invalid_param(owner, spec.name, spec.default, "empty parameter name"));
        }
        if !seen.insert(spec.name) {
            return Err(DomainError::invalid_param(owner, spec.name, spec.default, "duplicate parameter"));
        }
        if !(spec.min.is_finite() && spec.max.is_finite()) || spec.min > spec.max {
            return Err(DomainError::invalid_param(owner, spec.name, spec.default, "invalid bounds"));
        }
        if !spec.contains(spec.default) {
            return Err(DomainError::invalid_param(owner, spec.name, spec.default, "default out of bounds"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::Candle;
    use crate::domain::strategy::Signal;

    struct BadSchema;

    impl Strategy for BadSchema {
        fn name(&self) -> &'static str {
            "bad"
        }

        fn params(&self) -> &'static [ParamSpec] {
            const PARAMS: &[ParamSpec] = &[ParamSpec::new("period", 500.0, 1.0, 100.0)];
            PARAMS
        }

        fn evaluate(&self, _: &[Candle], _: &StrategyParams) -> Result<Option<Signal>> {
            Ok(None)
        }
    }

    #[test]
    fn rejects_default_outside_bounds() {
        let mut registry = StrategyRegistry::new();
        let err = registry.register(Arc::new(BadSchema)).unwrap_err();
        assert_eq!(err.kind().as_ref(), "INVALID_PARAMS");
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = StrategyRegistry::with_builtins();
        assert!(registry.register(Arc::new(MaCrossoverStrategy)).is_err());
    }
}
