//! Live pipeline: feed message → aggregator → indicators/patterns →
//! strategy pass → alert collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{
    config::ChartConfig,
    errors::{DomainError, Result},
    events::{EventDispatcher, InMemoryEventDispatcher, MarketDataEvent, SeriesEvent},
    indicators::{self, BollingerPoint, IndicatorSeries, MacdPoint},
    logging::{LogComponent, LogLevel, log_domain_error},
    market_data::{
        Candle, CandleAggregator, MovingAverageEngine, PriceUpdate, Symbol, TimeInterval, Timestamp,
    },
    patterns::{self, Level, Pattern},
    strategy::{Signal, Strategy, StrategyParams, StrategyRegistry},
};
use crate::infrastructure::websocket::{FeedMessage, parse_feed_message};
use crate::{log_info, log_warn};

/// Latest indicator readings for the in-progress candle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySignal {
    pub strategy: String,
    #[serde(flatten)]
    pub signal: Signal,
}

/// Payload handed to the alert collaborator after every applied update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub symbol: Symbol,
    pub interval: TimeInterval,
    pub time: Timestamp,
    pub price: f64,
    pub indicators: IndicatorSnapshot,
    pub patterns: Vec<Pattern>,
    pub signals: Vec<StrategySignal>,
}

/// External alert-condition checker
pub trait AlertSink {
    fn on_snapshot(&self, snapshot: &AlertSnapshot);
}

/// Full indicator series for charting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorBundle {
    pub sma: IndicatorSeries,
    pub ema: IndicatorSeries,
    pub rsi: IndicatorSeries,
    pub macd: Vec<MacdPoint>,
    pub bollinger: Vec<BollingerPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub event: SeriesEvent,
    pub snapshot: Option<AlertSnapshot>,
}

struct ActiveEntry {
    name: String,
    strategy: Arc<dyn Strategy>,
    params: StrategyParams,
}

pub struct MarketSession {
    config: ChartConfig,
    symbol: Symbol,
    interval: TimeInterval,
    aggregator: CandleAggregator,
    registry: StrategyRegistry,
    active: Vec<ActiveEntry>,
    engines: HashMap<(Symbol, TimeInterval), MovingAverageEngine>,
    dispatcher: InMemoryEventDispatcher,
    alert_sink: Option<Box<dyn AlertSink>>,
}

impl MarketSession {
    /// Session for `symbol`/`interval`; every configured active strategy must
    /// resolve against `registry`.
    pub fn new(config: ChartConfig, symbol: Symbol, interval: TimeInterval, registry: StrategyRegistry) -> Result<Self> {
        config.validate()?;

        let mut active = Vec::with_capacity(config.active_strategies.len());
        for entry in &config.active_strategies {
            let strategy = registry.get(&entry.name)?;
            let params = registry.resolve_params(&entry.name, &entry.params)?;
            active.push(ActiveEntry { name: entry.name.clone(), strategy, params });
        }

        log_info!(
            LogComponent::Application("MarketSession"),
            "🚀 Session {}@{} with {} active strategies",
            symbol,
            interval,
            active.len()
        );

        Ok(Self {
            aggregator: CandleAggregator::new(config.aggregator()),
            config,
            symbol,
            interval,
            registry,
            active,
            engines: HashMap::new(),
            dispatcher: InMemoryEventDispatcher::new(),
            alert_sink: None,
        })
    }

    pub fn with_alert_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn dispatcher_mut(&mut self) -> &mut InMemoryEventDispatcher {
        &mut self.dispatcher
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn interval(&self) -> TimeInterval {
        self.interval
    }

    /// Parse and apply one raw feed frame
    pub fn handle_raw(&mut self, raw: &str) -> Result<SessionUpdate> {
        match parse_feed_message(raw) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                let error = DomainError::from(e);
                log_domain_error(
                    LogLevel::Warn,
                    LogComponent::Application("MarketSession"),
                    "⚠️ Dropping unparseable feed frame",
                    &error,
                );
                Err(error)
            }
        }
    }

    pub fn handle_message(&mut self, message: FeedMessage) -> Result<SessionUpdate> {
        match message {
            FeedMessage::History { symbol, interval, data } => {
                let symbol = symbol.map(|s| Symbol::from(s.as_str())).unwrap_or_else(|| self.symbol.clone());
                let interval = match interval.as_deref().map(str::parse::<TimeInterval>) {
                    Some(Ok(interval)) => interval,
                    Some(Err(_)) => {
                        log_warn!(
                            LogComponent::Application("MarketSession"),
                            "⚠️ Unknown history interval {:?}, using {}",
                            interval,
                            self.interval
                        );
                        self.interval
                    }
                    None => self.interval,
                };

                let mut candles = Vec::with_capacity(data.len());
                for dto in &data {
                    match dto.to_domain_candle() {
                        Ok(candle) => candles.push(candle),
                        Err(e) => {
                            log_domain_error(
                                LogLevel::Warn,
                                LogComponent::Application("MarketSession"),
                                "⚠️ Dropping history candle",
                                &DomainError::from(e),
                            );
                        }
                    }
                }
                Ok(self.load_history(&symbol, interval, candles))
            }
            FeedMessage::Tick { data } | FeedMessage::Candle { data } => {
                let update = data.to_price_update(&self.symbol);
                self.apply_update(update)
            }
        }
    }

    /// Replace a series with pre-aggregated candles
    pub fn load_history(&mut self, symbol: &Symbol, interval: TimeInterval, candles: Vec<Candle>) -> SessionUpdate {
        let event = self.aggregator.seed_history(symbol, interval, candles);
        self.after_event(symbol, interval, event)
    }

    /// Apply a live update on the session interval
    pub fn apply_update(&mut self, update: PriceUpdate) -> Result<SessionUpdate> {
        let interval = self.interval;
        match self.aggregator.apply(interval, &update) {
            Ok(event) => Ok(self.after_event(&update.symbol, interval, event)),
            Err(e) => {
                self.dispatcher.publish_market_data_event(MarketDataEvent::UpdateDropped {
                    symbol: update.symbol.clone(),
                    interval,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn after_event(&mut self, symbol: &Symbol, interval: TimeInterval, event: SeriesEvent) -> SessionUpdate {
        let candles = self.series(symbol, interval);

        let settings = self.config.indicators;
        let engine = self
            .engines
            .entry((symbol.clone(), interval))
            .or_insert_with(|| MovingAverageEngine::new(&[settings.sma_period], &[settings.ema_period]));
        engine.apply_event(&event, &candles);

        let snapshot = candles.last().map(|current| {
            let indicators = self.indicator_snapshot(symbol, interval, &candles, current);
            let index = candles.len() - 1;
            let patterns = patterns::detect_at(&candles, index, self.config.patterns.window)
                .into_iter()
                .filter(|p| p.significance >= self.config.patterns.min_significance)
                .collect();
            AlertSnapshot {
                symbol: symbol.clone(),
                interval,
                time: current.timestamp,
                price: current.close(),
                indicators,
                patterns,
                signals: self.live_signals(symbol, &candles),
            }
        });

        if let (Some(sink), Some(snapshot)) = (&self.alert_sink, &snapshot) {
            sink.on_snapshot(snapshot);
        }
        self.dispatcher.publish_market_data_event(MarketDataEvent::SeriesUpdated {
            symbol: symbol.clone(),
            interval,
            event: event.clone(),
        });

        SessionUpdate { event, snapshot }
    }

    fn indicator_snapshot(
        &self,
        symbol: &Symbol,
        interval: TimeInterval,
        candles: &[Candle],
        current: &Candle,
    ) -> IndicatorSnapshot {
        let settings = self.config.indicators;
        let engine = self.engines.get(&(symbol.clone(), interval));
        let macd = indicators::macd(candles, settings.macd_fast, settings.macd_slow, settings.macd_signal);
        let bands = indicators::bollinger(candles, settings.bollinger_period, settings.bollinger_k);
        let macd = macd.last();
        let bands = bands.last();

        IndicatorSnapshot {
            sma: engine.and_then(|e| e.preview_sma(settings.sma_period, current.close())),
            ema: engine.and_then(|e| e.preview_ema(settings.ema_period, current.close())),
            rsi: indicators::last_value(&indicators::rsi(candles, settings.rsi_period)),
            macd: macd.and_then(|m| m.macd),
            macd_signal: macd.and_then(|m| m.signal),
            macd_histogram: macd.and_then(|m| m.histogram),
            bollinger_upper: bands.and_then(|b| b.upper),
            bollinger_middle: bands.and_then(|b| b.middle),
            bollinger_lower: bands.and_then(|b| b.lower),
        }
    }

    /// Evaluate every active strategy; failures are logged and skipped
    fn live_signals(&self, symbol: &Symbol, candles: &[Candle]) -> Vec<StrategySignal> {
        let mut signals = Vec::new();
        for entry in &self.active {
            match entry.strategy.evaluate(candles, &entry.params) {
                Ok(Some(signal)) => signals.push(StrategySignal { strategy: entry.name.clone(), signal }),
                Ok(None) => {}
                Err(e) => {
                    let error = DomainError::StrategyFailed {
                        strategy: entry.name.clone(),
                        index: candles.len().saturating_sub(1),
                        reason: format!("{e} ({symbol})"),
                    };
                    log_domain_error(
                        LogLevel::Warn,
                        LogComponent::Application("MarketSession"),
                        "⚠️ Skipping strategy for this update",
                        &error,
                    );
                }
            }
        }
        signals
    }

    pub fn series(&self, symbol: &Symbol, interval: TimeInterval) -> Vec<Candle> {
        self.aggregator.series(symbol, interval).map(|s| s.to_vec()).unwrap_or_default()
    }

    pub fn anchor(&self, symbol: &Symbol, interval: TimeInterval) -> Option<Timestamp> {
        self.aggregator.anchor(symbol, interval)
    }

    pub fn indicators(&self, symbol: &Symbol, interval: TimeInterval) -> IndicatorBundle {
        let candles = self.series(symbol, interval);
        let s = self.config.indicators;
        IndicatorBundle {
            sma: indicators::sma(&candles, s.sma_period),
            ema: indicators::ema(&candles, s.ema_period),
            rsi: indicators::rsi(&candles, s.rsi_period),
            macd: indicators::macd(&candles, s.macd_fast, s.macd_slow, s.macd_signal),
            bollinger: indicators::bollinger(&candles, s.bollinger_period, s.bollinger_k),
        }
    }

    pub fn patterns(&self, symbol: &Symbol, interval: TimeInterval) -> Vec<Pattern> {
        let p = self.config.patterns;
        patterns::scan(&self.series(symbol, interval), p.window, p.min_significance)
    }

    pub fn levels(&self, symbol: &Symbol, interval: TimeInterval) -> Vec<Level> {
        let p = self.config.patterns;
        patterns::find_levels(&self.series(symbol, interval), p.level_periods, p.level_tolerance)
    }

    /// Finalized moving averages maintained incrementally for the series
    pub fn moving_averages(&self, symbol: &Symbol, interval: TimeInterval) -> Option<&MovingAverageEngine> {
        self.engines.get(&(symbol.clone(), interval))
    }
}
