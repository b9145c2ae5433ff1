pub use super::value_objects::{OHLCV, Price, Timestamp, Volume};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Domain entity - Candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "time")]
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub ohlcv: OHLCV,
}

impl Candle {
    pub fn new(timestamp: Timestamp, ohlcv: OHLCV) -> Self {
        Self { timestamp, ohlcv }
    }

    pub fn time(&self) -> u64 {
        self.timestamp.value()
    }

    pub fn open(&self) -> f64 {
        self.ohlcv.open.value()
    }

    pub fn high(&self) -> f64 {
        self.ohlcv.high.value()
    }

    pub fn low(&self) -> f64 {
        self.ohlcv.low.value()
    }

    pub fn close(&self) -> f64 {
        self.ohlcv.close.value()
    }

    pub fn volume(&self) -> f64 {
        self.ohlcv.volume.value()
    }

    pub fn is_bullish(&self) -> bool {
        self.ohlcv.close > self.ohlcv.open
    }

    pub fn is_bearish(&self) -> bool {
        self.ohlcv.close < self.ohlcv.open
    }

    pub fn body_size(&self) -> Price {
        Price::from((self.close() - self.open()).abs())
    }

    pub fn range(&self) -> Price {
        Price::from(self.high() - self.low())
    }

    pub fn wick_high(&self) -> Price {
        Price::from(self.high() - self.close().max(self.open()))
    }

    pub fn wick_low(&self) -> Price {
        Price::from(self.close().min(self.open()) - self.low())
    }

    /// Midpoint of the real body
    pub fn body_midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }
}

/// Domain entity - bounded candle series for one (symbol, interval) pair.
///
/// The last element is the in-progress candle; eviction only ever removes
/// from the front, so the open candle survives any cap.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    max_size: usize,
}

impl CandleSeries {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self { candles: VecDeque::with_capacity(max_size.min(4096)), max_size }
    }

    /// Append a new latest candle, evicting the oldest beyond the cap
    pub fn push(&mut self, candle: Candle) {
        self.candles.push_back(candle);
        while self.candles.len() > self.max_size {
            self.candles.pop_front();
        }
    }

    /// Overwrite the in-progress candle; appends when the series is empty
    pub fn replace_latest(&mut self, candle: Candle) {
        match self.candles.back_mut() {
            Some(last) => *last = candle,
            None => self.push(candle),
        }
    }

    /// Replace the whole series, keeping the most recent `max_size` candles
    pub fn replace_all(&mut self, candles: Vec<Candle>) {
        let skip = candles.len().saturating_sub(self.max_size);
        self.candles = candles.into_iter().skip(skip).collect();
    }

    pub fn get_candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    /// Contiguous view for slice-based consumers (indicators, strategies)
    pub fn as_slice(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn count(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Maximum number of candles in the series
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
