use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use market_chart_wasm::domain::{
    backtest::{BacktestOptions, Backtester, CancellationToken, ParameterSpace, RankMetric, optimize},
    indicators,
    market_data::{
        AggregatorConfig, Candle, CandleAggregator, MovingAverageEngine, OHLCV, Price, PriceUpdate,
        TimeInterval, Timestamp, Volume,
    },
    patterns,
    strategy::{StrategyParams, StrategyRegistry},
};

/// Synthetic minute candles with trend, swings and noise
fn generate_test_candles(count: usize) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(count);
    let mut base_price = 50_000.0;

    for i in 0..count {
        let x = i as f64;
        let trend = (x * 0.001).sin() * 1000.0;
        let volatility = (x * 0.1).sin() * 200.0;
        let noise = ((x * 0.5).sin() + (x * 1.2).cos()) * 50.0;

        let open = base_price + trend + volatility + noise;
        let close = open + (x * 0.3).cos() * 100.0;
        let high = open.max(close) + (x * 0.7).sin().abs() * 150.0;
        let low = open.min(close) - (x * 0.9).cos().abs() * 120.0;
        let volume = 1000.0 + (x * 0.4).sin().abs() * 2000.0;

        candles.push(Candle::new(
            Timestamp::from(1_640_000_000 + i as u64 * 60),
            OHLCV::new(Price::from(open), Price::from(high), Price::from(low), Price::from(close), Volume::from(volume)),
        ));
        base_price = close * 0.999 + open * 0.001;
    }

    candles
}

/// Four ticks per minute over `minutes` minutes
fn generate_ticks(minutes: usize) -> Vec<PriceUpdate> {
    (0..minutes * 4)
        .map(|i| {
            let price = 50_000.0 + (i as f64 * 0.05).sin() * 250.0;
            PriceUpdate::tick("BTCUSDT", 1_640_000_000 + i as u64 * 15, price).with_volume(0.5)
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    group.measurement_time(Duration::from_secs(10));

    for minutes in [100, 1_000, 10_000].iter() {
        let ticks = generate_ticks(*minutes);
        group.bench_with_input(BenchmarkId::new("apply_ticks", minutes), &ticks, |b, ticks| {
            b.iter(|| {
                let mut aggregator = CandleAggregator::new(AggregatorConfig { max_candles: 1_000, fill_gaps: true });
                for tick in ticks {
                    let _ = black_box(aggregator.apply(TimeInterval::OneMinute, tick));
                }
                aggregator
            })
        });
    }

    group.finish();
}

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");

    for count in [500, 5_000].iter() {
        let candles = generate_test_candles(*count);

        group.bench_with_input(BenchmarkId::new("sma_ema_rsi", count), &candles, |b, candles| {
            b.iter(|| {
                black_box(indicators::sma(candles, 20));
                black_box(indicators::ema(candles, 20));
                black_box(indicators::rsi(candles, 14));
            })
        });

        group.bench_with_input(BenchmarkId::new("macd_bollinger", count), &candles, |b, candles| {
            b.iter(|| {
                black_box(indicators::macd(candles, 12, 26, 9));
                black_box(indicators::bollinger(candles, 20, 2.0));
            })
        });

        group.bench_with_input(BenchmarkId::new("incremental_engine", count), &candles, |b, candles| {
            b.iter(|| {
                let mut engine = MovingAverageEngine::new(&[20, 50], &[12, 26]);
                engine.compute_historical(candles);
                engine
            })
        });

        group.bench_with_input(BenchmarkId::new("pattern_scan", count), &candles, |b, candles| {
            b.iter(|| black_box(patterns::scan(candles, 5, 0.0)))
        });
    }

    group.finish();
}

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(20);

    let backtester = Backtester::new(StrategyRegistry::with_builtins());
    let candles: Arc<[Candle]> = generate_test_candles(2_000).into();

    for strategy in ["ma_crossover", "rsi_reversal", "breakout", "pattern_reversal"] {
        group.bench_with_input(BenchmarkId::new("full_run", strategy), &candles, |b, candles| {
            b.iter(|| {
                backtester.run(
                    strategy,
                    candles.clone(),
                    &StrategyParams::new(),
                    BacktestOptions::default(),
                    CancellationToken::new(),
                )
            })
        });
    }

    let space: ParameterSpace = [
        ("fast_period".to_string(), vec![5.0, 10.0, 20.0]),
        ("slow_period".to_string(), vec![30.0, 50.0]),
    ]
    .into_iter()
    .collect();
    group.bench_function("ma_sweep_6", |b| {
        b.iter(|| {
            optimize(
                &backtester,
                "ma_crossover",
                candles.clone(),
                &space,
                BacktestOptions::default(),
                RankMetric::SharpeRatio,
                CancellationToken::new(),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_indicators, bench_backtest);
criterion_main!(benches);
