//! Parameter sweep over a strategy's tunables.

use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

use super::{BacktestOptions, Backtester, CancellationToken, Metrics};
use crate::domain::{
    errors::Result,
    logging::LogComponent,
    market_data::Candle,
    strategy::StrategyParams,
};
use crate::log_info;

/// Candidate values per parameter name
pub type ParameterSpace = BTreeMap<String, Vec<f64>>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, StrumDisplay, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RankMetric {
    #[default]
    SharpeRatio,
    TotalReturn,
    ProfitFactor,
    WinRate,
    Expectancy,
    MaxDrawdown,
}

impl RankMetric {
    pub fn value(&self, metrics: &Metrics) -> f64 {
        match self {
            Self::SharpeRatio => metrics.sharpe_ratio,
            Self::TotalReturn => metrics.total_return_pct,
            Self::ProfitFactor => metrics.profit_factor,
            Self::WinRate => metrics.win_rate,
            Self::Expectancy => metrics.expectancy,
            Self::MaxDrawdown => metrics.max_drawdown,
        }
    }

    /// Lower drawdown is better; every other metric ranks descending
    pub fn ascending(&self) -> bool {
        matches!(self, Self::MaxDrawdown)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub params: StrategyParams,
    pub metrics: Metrics,
    pub score: f64,
}

/// Cartesian product of the space, one override set per combination.
pub fn generate_combinations(space: &ParameterSpace) -> Vec<StrategyParams> {
    let axes: Vec<(&String, &Vec<f64>)> = space.iter().collect();
    expand(&axes).into_iter().map(|combo| combo.into_iter().collect()).collect()
}

fn expand(axes: &[(&String, &Vec<f64>)]) -> Vec<Vec<(String, f64)>> {
    let Some(((name, values), rest)) = axes.split_first() else {
        return vec![vec![]];
    };

    let sub = expand(rest);
    let mut result = Vec::with_capacity(values.len() * sub.len());
    for value in values.iter() {
        for combo in &sub {
            let mut next = vec![((*name).clone(), *value)];
            next.extend(combo.iter().cloned());
            result.push(next);
        }
    }
    result
}

/// Run one backtest per combination and rank them best first.
///
/// Every combination is validated before any run starts; one invalid
/// combination fails the whole sweep.
pub fn optimize(
    backtester: &Backtester,
    strategy: &str,
    candles: Arc<[Candle]>,
    space: &ParameterSpace,
    options: BacktestOptions,
    metric: RankMetric,
    cancel: CancellationToken,
) -> Result<Vec<SweepResult>> {
    let combos = generate_combinations(space);
    for combo in &combos {
        backtester.registry().resolve_params(strategy, combo)?;
    }
    log_info!(
        LogComponent::Domain("Optimizer"),
        "🔬 Sweeping {} with {} combinations across {} axes",
        strategy,
        combos.len(),
        space.len()
    );

    let run_one = |combo: &StrategyParams| -> Result<SweepResult> {
        let result = backtester.run(strategy, candles.clone(), combo, options, cancel.clone())?;
        Ok(SweepResult { score: metric.value(&result.metrics), params: result.params, metrics: result.metrics })
    };

    #[cfg(feature = "parallel")]
    let results: Result<Vec<SweepResult>> = combos.par_iter().map(run_one).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Result<Vec<SweepResult>> = combos.iter().map(run_one).collect();

    let mut results = results?;
    rank(&mut results, metric);
    Ok(results)
}

pub fn rank(results: &mut [SweepResult], metric: RankMetric) {
    if metric.ascending() {
        results.sort_by(|a, b| a.score.total_cmp(&b.score));
    } else {
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_space_is_one_default_run() {
        let combos = generate_combinations(&ParameterSpace::new());
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn cartesian_product_covers_every_pair() {
        let mut space = ParameterSpace::new();
        space.insert("fast_period".into(), vec![5.0, 10.0]);
        space.insert("slow_period".into(), vec![20.0, 30.0, 40.0]);
        let combos = generate_combinations(&space);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0].get("fast_period"), Some(5.0));
        assert_eq!(combos[0].get("slow_period"), Some(20.0));
        assert_eq!(combos[5].get("fast_period"), Some(10.0));
        assert_eq!(combos[5].get("slow_period"), Some(40.0));
    }

    #[test]
    fn drawdown_ranks_ascending() {
        let entry = |score: f64| SweepResult { params: StrategyParams::new(), metrics: Metrics::default(), score };
        let mut results = vec![entry(0.3), entry(0.1), entry(0.2)];
        rank(&mut results, RankMetric::MaxDrawdown);
        assert_eq!(results[0].score, 0.1);
        rank(&mut results, RankMetric::SharpeRatio);
        assert_eq!(results[0].score, 0.3);
    }
}
