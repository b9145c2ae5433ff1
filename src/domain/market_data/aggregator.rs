//! Streaming candle aggregation.
//!
//! Turns raw price/OHLC updates into bucket-aligned, strictly increasing
//! candle series, one per `(symbol, interval)` pair. Each pair is a small
//! state machine: `Empty` until the first update or history payload, then
//! `Open(bucket)` anchored on the in-progress candle.

use std::collections::HashMap;

use crate::domain::{
    errors::{DomainError, Result},
    events::SeriesEvent,
    logging::{LogComponent, LogLevel, log_domain_error},
    market_data::{
        Candle, CandleSeries, DataValidationService, OHLCV, Price, Symbol, TimeInterval, Timestamp,
        Volume, bucket_start,
    },
};
use crate::log_debug;

/// Raw feed update as delivered by the feed client; every numeric field is optional
/// until validated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceUpdate {
    pub symbol: Symbol,
    pub epoch: Option<u64>,
    pub price: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceUpdate {
    /// Single trade/price tick
    pub fn tick(symbol: &str, epoch: u64, price: f64) -> Self {
        Self { symbol: Symbol::from(symbol), epoch: Some(epoch), price: Some(price), ..Self::default() }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Resolve the optional fields into a checked OHLCV sample.
    ///
    /// `close` falls back to `price`; `open/high/low` fall back to `close`.
    pub fn normalize(&self) -> Result<NormalizedUpdate> {
        let malformed = |reason: &str| DomainError::MalformedUpdate {
            symbol: self.symbol.value().to_string(),
            reason: reason.to_string(),
        };

        if self.symbol.value().is_empty() {
            return Err(malformed("missing symbol"));
        }
        let epoch = self.epoch.ok_or_else(|| malformed("missing epoch"))?;
        let close = self.close.or(self.price).ok_or_else(|| malformed("missing price/close"))?;
        let open = self.open.unwrap_or(close);
        let high = self.high.unwrap_or(open.max(close));
        let low = self.low.unwrap_or(open.min(close));
        let volume = self.volume.unwrap_or(0.0);

        if [open, high, low, close].iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(malformed("prices must be finite and positive"));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(malformed("volume must be finite and non-negative"));
        }

        let ohlcv = OHLCV::new(
            Price::from(open),
            Price::from(high),
            Price::from(low),
            Price::from(close),
            Volume::from(volume),
        );
        if !ohlcv.is_valid() {
            return Err(DomainError::InvalidCandle {
                symbol: self.symbol.value().to_string(),
                time: epoch,
                reason: "high/low do not bound open/close".to_string(),
            });
        }

        Ok(NormalizedUpdate { epoch, ohlcv })
    }
}

/// Validated update sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedUpdate {
    pub epoch: u64,
    pub ohlcv: OHLCV,
}

/// Aggregation settings injected by the owner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    pub max_candles: usize,
    pub fill_gaps: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { max_candles: 1000, fill_gaps: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesPhase {
    Empty,
    Open(Timestamp),
}

#[derive(Debug, Clone)]
struct SeriesState {
    series: CandleSeries,
    phase: SeriesPhase,
}

impl SeriesState {
    fn new(max_candles: usize) -> Self {
        Self { series: CandleSeries::new(max_candles), phase: SeriesPhase::Empty }
    }
}

/// Owner of every live candle series
#[derive(Debug, Clone, Default)]
pub struct CandleAggregator {
    config: AggregatorConfig,
    states: HashMap<(Symbol, TimeInterval), SeriesState>,
    validator: DataValidationService,
}

impl CandleAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config, states: HashMap::new(), validator: DataValidationService::new() }
    }

    pub fn config(&self) -> AggregatorConfig {
        self.config
    }

    /// Apply one live update. Rejected updates leave all state untouched.
    pub fn apply(&mut self, interval: TimeInterval, update: &PriceUpdate) -> Result<SeriesEvent> {
        let result = self.apply_inner(interval, update);
        if let Err(e) = &result {
            log_domain_error(
                LogLevel::Warn,
                LogComponent::Domain("Aggregator"),
                "⚠️ Dropping feed update",
                e,
            );
        }
        result
    }

    fn apply_inner(&mut self, interval: TimeInterval, update: &PriceUpdate) -> Result<SeriesEvent> {
        let sample = update.normalize()?;
        let secs = interval.duration_secs();
        let bucket = Timestamp::from(bucket_start(sample.epoch, secs));
        let config = self.config;

        let state = self
            .states
            .entry((update.symbol.clone(), interval))
            .or_insert_with(|| SeriesState::new(config.max_candles));

        let anchor = match (state.phase, state.series.latest().copied()) {
            (SeriesPhase::Open(anchor), Some(latest)) => Some((anchor, latest)),
            _ => None,
        };

        let Some((anchor, latest)) = anchor else {
            let opened = Candle::new(bucket, sample.ohlcv);
            state.series.push(opened);
            state.phase = SeriesPhase::Open(bucket);
            log_debug!(
                LogComponent::Domain("Aggregator"),
                "🕯️ First candle for {}@{} at {}",
                update.symbol,
                interval,
                bucket
            );
            return Ok(SeriesEvent::Candle { closed: None, gap_fill: Vec::new(), opened });
        };

        if bucket < anchor {
            return Err(DomainError::StaleUpdate {
                symbol: update.symbol.value().to_string(),
                epoch: sample.epoch,
                open_bucket: anchor.value(),
            });
        }

        if bucket == anchor {
            let mut candle = latest;
            candle.ohlcv.high = Price::from(candle.high().max(sample.ohlcv.high.value()));
            candle.ohlcv.low = Price::from(candle.low().min(sample.ohlcv.low.value()));
            candle.ohlcv.close = sample.ohlcv.close;
            candle.ohlcv.volume = Volume::from(candle.volume() + sample.ohlcv.volume.value());
            state.series.replace_latest(candle);
            return Ok(SeriesEvent::Tick { candle });
        }

        let carry = latest.close();
        let gap_fill = if config.fill_gaps {
            gap_fill_candles(anchor.value(), bucket.value(), secs, carry, config.max_candles)
        } else {
            Vec::new()
        };
        for filler in &gap_fill {
            state.series.push(*filler);
        }

        let opened = Candle::new(
            bucket,
            OHLCV::new(
                Price::from(carry),
                Price::from(carry.max(sample.ohlcv.high.value())),
                Price::from(carry.min(sample.ohlcv.low.value())),
                sample.ohlcv.close,
                sample.ohlcv.volume,
            ),
        );
        state.series.push(opened);
        state.phase = SeriesPhase::Open(bucket);

        log_debug!(
            LogComponent::Domain("Aggregator"),
            "🕯️ Closed {}@{} candle {} and opened {} ({} filler)",
            update.symbol,
            interval,
            anchor,
            bucket,
            gap_fill.len()
        );

        Ok(SeriesEvent::Candle { closed: Some(latest), gap_fill, opened })
    }

    /// Replace a series with a pre-aggregated history payload. The newest
    /// candle becomes the anchor for subsequent live updates.
    pub fn seed_history(
        &mut self,
        symbol: &Symbol,
        interval: TimeInterval,
        candles: Vec<Candle>,
    ) -> SeriesEvent {
        let received = candles.len();
        let cleaned = self.validator.normalize_history(symbol, interval, candles);
        let config = self.config;
        let state = self
            .states
            .entry((symbol.clone(), interval))
            .or_insert_with(|| SeriesState::new(config.max_candles));

        state.series.replace_all(cleaned);
        let anchor = state.series.latest().copied();
        state.phase = match anchor {
            Some(candle) => SeriesPhase::Open(candle.timestamp),
            None => SeriesPhase::Empty,
        };

        crate::log_info!(
            LogComponent::Domain("Aggregator"),
            "📊 History for {}@{}: {} received, {} kept",
            symbol,
            interval,
            received,
            state.series.count()
        );

        SeriesEvent::History { count: state.series.count(), anchor }
    }

    pub fn series(&self, symbol: &Symbol, interval: TimeInterval) -> Option<&CandleSeries> {
        self.states.get(&(symbol.clone(), interval)).map(|s| &s.series)
    }

    /// Bucket of the in-progress candle
    pub fn anchor(&self, symbol: &Symbol, interval: TimeInterval) -> Option<Timestamp> {
        match self.states.get(&(symbol.clone(), interval))?.phase {
            SeriesPhase::Open(bucket) => Some(bucket),
            SeriesPhase::Empty => None,
        }
    }

    pub fn keys(&self) -> Vec<(Symbol, TimeInterval)> {
        let mut keys: Vec<_> = self.states.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Flat carry-forward candles for every bucket strictly between `from` and `to`,
/// bounded by the series cap.
fn gap_fill_candles(from: u64, to: u64, secs: u64, carry: f64, cap: usize) -> Vec<Candle> {
    if secs == 0 || to <= from + secs {
        return Vec::new();
    }
    let missing = (to - from) / secs - 1;
    let keep = missing.min(cap as u64);
    let first = to - keep * secs;
    (0..keep)
        .map(|i| Candle::new(Timestamp::from(first + i * secs), OHLCV::flat(carry, 0.0)))
        .collect()
}
