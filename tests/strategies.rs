use std::sync::Arc;

use market_chart_wasm::domain::errors::Result;
use market_chart_wasm::domain::market_data::{Candle, OHLCV, Price, Timestamp, Volume};
use market_chart_wasm::domain::strategy::{
    ParamSpec, Signal, SignalType, Strategy, StrategyParams, StrategyRegistry,
};

fn make_candle(i: u64, close: f64, volume: f64) -> Candle {
    Candle::new(
        Timestamp::from(i * 60),
        OHLCV::new(
            Price::from(close),
            Price::from(close + 0.5),
            Price::from(close - 0.5),
            Price::from(close),
            Volume::from(volume),
        ),
    )
}

struct Silent;

impl Strategy for Silent {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::new("period", 5.0, 1.0, 10.0)];
        PARAMS
    }

    fn evaluate(&self, _candles: &[Candle], _params: &StrategyParams) -> Result<Option<Signal>> {
        Ok(None)
    }
}

#[test]
fn builtin_catalogue() {
    let registry = StrategyRegistry::with_builtins();
    insta::assert_json_snapshot!(registry.names(), @r###"
    [
      "breakout",
      "ma_crossover",
      "macd_crossover",
      "mean_reversion",
      "pattern_reversal",
      "rsi_reversal",
      "trend_following"
    ]
    "###);
}

#[test]
fn every_builtin_publishes_a_valid_schema() {
    let registry = StrategyRegistry::with_builtins();
    for info in registry.describe() {
        assert!(!info.params.is_empty(), "{} has no parameters", info.name);
        assert!(!info.description.is_empty(), "{} has no description", info.name);
        for spec in &info.params {
            assert!(spec.contains(spec.default), "{}.{} default out of range", info.name, spec.name);
        }
    }
}

#[test]
fn unknown_strategy_is_reported() {
    let registry = StrategyRegistry::with_builtins();
    let err = registry.get("moon_phase").err().unwrap();
    assert_eq!(err.kind().as_ref(), "STRATEGY_NOT_FOUND");
    assert!(err.context().contains("moon_phase"));
}

#[test]
fn overrides_are_checked_against_the_schema() {
    let registry = StrategyRegistry::with_builtins();

    let params = registry
        .resolve_params("ma_crossover", &StrategyParams::new().with("fast_period", 5.0))
        .unwrap();
    assert_eq!(params.get("fast_period"), Some(5.0));
    assert_eq!(params.get("slow_period"), Some(30.0));

    let unknown = registry
        .resolve_params("ma_crossover", &StrategyParams::new().with("speed", 1.0))
        .unwrap_err();
    assert_eq!(unknown.kind().as_ref(), "INVALID_PARAMS");

    let out_of_range = registry
        .resolve_params("rsi_reversal", &StrategyParams::new().with("period", 0.0))
        .unwrap_err();
    assert_eq!(out_of_range.kind().as_ref(), "INVALID_PARAMS");
    assert!(out_of_range.context().contains("period"));
}

#[test]
fn custom_strategies_can_be_registered_once() {
    let mut registry = StrategyRegistry::with_builtins();
    registry.register(Arc::new(Silent)).unwrap();
    assert!(registry.contains("silent"));
    assert!(registry.register(Arc::new(Silent)).is_err());
    assert_eq!(registry.names().len(), 8);
}

#[test]
fn short_history_gives_no_signal() {
    let registry = StrategyRegistry::with_builtins();
    let candles: Vec<Candle> = (0..3).map(|i| make_candle(i, 10.0 + i as f64, 1.0)).collect();

    for name in registry.names() {
        let strategy = registry.get(&name).unwrap();
        let signal = strategy.evaluate(&candles, &strategy.default_params()).unwrap();
        assert_eq!(signal, None, "{name} fired on three candles");
    }
}

#[test]
fn rsi_reversal_buys_when_leaving_oversold() {
    let registry = StrategyRegistry::with_builtins();
    let strategy = registry.get("rsi_reversal").unwrap();
    let params = registry.resolve_params("rsi_reversal", &StrategyParams::new().with("period", 3.0)).unwrap();

    // Steady decline pins RSI at 0, then a sharp bounce lifts it above 30
    let mut closes: Vec<f64> = (0..8).map(|i| 20.0 - i as f64).collect();
    closes.push(18.0);
    let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| make_candle(i as u64, *c, 1.0)).collect();

    let signal = strategy.evaluate(&candles, &params).unwrap().unwrap();
    assert_eq!(signal.side, SignalType::Buy);
    assert_eq!(signal.time, candles.last().unwrap().timestamp);
    assert!((0.0..=1.0).contains(&signal.confidence));
}

#[test]
fn trend_following_sells_below_the_average() {
    let registry = StrategyRegistry::with_builtins();
    let strategy = registry.get("trend_following").unwrap();
    let params = registry
        .resolve_params(
            "trend_following",
            &StrategyParams::new().with("ema_period", 5.0).with("strength_threshold", 0.02),
        )
        .unwrap();

    let mut closes = vec![100.0; 10];
    closes.push(90.0);
    let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| make_candle(i as u64, *c, 1.0)).collect();

    let signal = strategy.evaluate(&candles, &params).unwrap();
    assert_eq!(signal.map(|s| s.side), Some(SignalType::Sell));
}

fn ohlc(i: u64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(
        Timestamp::from(i * 60),
        OHLCV::new(Price::from(open), Price::from(high), Price::from(low), Price::from(close), Volume::from(1.0)),
    )
}

fn closes_to_candles(closes: &[f64]) -> Vec<Candle> {
    closes.iter().enumerate().map(|(i, c)| make_candle(i as u64, *c, 1.0)).collect()
}

fn evaluate(name: &str, candles: &[Candle], overrides: StrategyParams) -> Option<SignalType> {
    let registry = StrategyRegistry::with_builtins();
    let strategy = registry.get(name).unwrap();
    let params = registry.resolve_params(name, &overrides).unwrap();
    strategy.evaluate(candles, &params).unwrap().map(|s| s.side)
}

#[test]
fn rsi_reversal_needs_to_clear_the_threshold() {
    // Period 2: two losses pin RSI at 0, one equal gain lands it on exactly 50
    let candles = closes_to_candles(&[10.0, 9.0, 8.0, 9.0]);
    assert_eq!(evaluate("rsi_reversal", &candles, StrategyParams::new().with("period", 2.0).with("oversold", 50.0)), None);
    assert_eq!(
        evaluate("rsi_reversal", &candles, StrategyParams::new().with("period", 2.0).with("oversold", 49.0)),
        Some(SignalType::Buy)
    );
}

#[test]
fn macd_crossover_follows_the_histogram_sign() {
    let mut closes = vec![100.0; 40];
    assert_eq!(evaluate("macd_crossover", &closes_to_candles(&closes), StrategyParams::new()), None);

    closes.push(110.0);
    assert_eq!(evaluate("macd_crossover", &closes_to_candles(&closes), StrategyParams::new()), Some(SignalType::Buy));

    closes.pop();
    closes.push(90.0);
    assert_eq!(evaluate("macd_crossover", &closes_to_candles(&closes), StrategyParams::new()), Some(SignalType::Sell));
}

#[test]
fn mean_reversion_fades_a_band_break() {
    let mut closes = vec![100.0; 20];
    closes.push(90.0);
    assert_eq!(evaluate("mean_reversion", &closes_to_candles(&closes), StrategyParams::new()), Some(SignalType::Buy));

    closes.pop();
    closes.push(110.0);
    assert_eq!(evaluate("mean_reversion", &closes_to_candles(&closes), StrategyParams::new()), Some(SignalType::Sell));

    // Already outside the band on the previous candle: no fresh cross
    closes.push(120.0);
    assert_eq!(evaluate("mean_reversion", &closes_to_candles(&closes), StrategyParams::new()), None);
}

#[test]
fn pattern_reversal_trades_against_the_trend() {
    // Eleven falling closes, two quiet candles, then a hammer
    let mut falling: Vec<Candle> = (0..=10).map(|i| make_candle(i, 120.0 - 2.0 * i as f64, 1.0)).collect();
    falling.push(make_candle(11, 100.0, 1.0));
    falling.push(make_candle(12, 100.0, 1.0));
    falling.push(ohlc(13, 100.0, 100.3, 98.0, 100.3));
    assert_eq!(evaluate("pattern_reversal", &falling, StrategyParams::new()), Some(SignalType::Buy));

    // Rising closes, then a shooting star
    let mut rising: Vec<Candle> = (0..=10).map(|i| make_candle(i, 80.0 + 2.0 * i as f64, 1.0)).collect();
    rising.push(make_candle(11, 100.0, 1.0));
    rising.push(make_candle(12, 100.0, 1.0));
    rising.push(ohlc(13, 100.0, 102.0, 99.9, 99.9));
    assert_eq!(evaluate("pattern_reversal", &rising, StrategyParams::new()), Some(SignalType::Sell));

    // A hammer at the top of an uptrend is not a reversal
    rising.pop();
    rising.push(ohlc(13, 100.0, 100.3, 98.0, 100.3));
    assert_eq!(evaluate("pattern_reversal", &rising, StrategyParams::new()), None);
}
