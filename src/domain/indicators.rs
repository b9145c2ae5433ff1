//! Pure indicator transforms over a candle slice.
//!
//! Every series is aligned 1:1 with its input: index `i` describes candle `i`,
//! and the leading points an indicator cannot define yet are `None`. Inputs
//! shorter than the period produce an all-`None` series, never a panic.

use serde::Serialize;

use crate::domain::market_data::{Candle, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub time: Timestamp,
    pub value: Option<f64>,
}

pub type IndicatorSeries = Vec<IndicatorPoint>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub time: Timestamp,
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerPoint {
    pub time: Timestamp,
    pub upper: Option<f64>,
    pub middle: Option<f64>,
    pub lower: Option<f64>,
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close()).collect()
}

pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume()).collect()
}

fn attach(candles: &[Candle], values: Vec<Option<f64>>) -> IndicatorSeries {
    candles
        .iter()
        .zip(values)
        .map(|(c, value)| IndicatorPoint { time: c.timestamp, value })
        .collect()
}

/// Trailing arithmetic mean over raw values
pub fn sma_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// EMA seeded with the SMA of the first `period` defined values.
///
/// Leading `None`s in the input are skipped, which lets MACD chain an EMA
/// over its own partially defined line.
pub fn ema_values(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut seed_sum = 0.0;
    let mut seen = 0usize;
    let mut prev: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(v) = *value else {
            continue;
        };
        match prev {
            Some(p) => {
                let next = (v - p) * alpha + p;
                prev = Some(next);
                out[i] = Some(next);
            }
            None => {
                seed_sum += v;
                seen += 1;
                if seen == period {
                    let seed = seed_sum / period as f64;
                    prev = Some(seed);
                    out[i] = Some(seed);
                }
            }
        }
    }
    out
}

/// Wilder RSI: plain average of the first `period` changes, smoothed afterwards.
/// First value sits at index `period`.
pub fn rsi_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum -= change;
        }
    }
    let p = period as f64;
    let mut avg_gain = gain_sum / p;
    let mut avg_loss = loss_sum / p;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Population standard deviation over the trailing window
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let means = sma_values(values, period);
    means
        .iter()
        .enumerate()
        .map(|(i, mean)| {
            let mean = (*mean)?;
            let window = &values[i + 1 - period..=i];
            let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
            Some(variance.sqrt())
        })
        .collect()
}

pub fn sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    attach(candles, sma_values(&closes(candles), period))
}

pub fn ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    let values: Vec<Option<f64>> = closes(candles).into_iter().map(Some).collect();
    attach(candles, ema_values(&values, period))
}

pub fn rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    attach(candles, rsi_values(&closes(candles), period))
}

pub fn macd(candles: &[Candle], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    let values: Vec<Option<f64>> = closes(candles).into_iter().map(Some).collect();
    let fast_ema = ema_values(&values, fast);
    let slow_ema = ema_values(&values, slow);
    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_values(&line, signal);

    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let histogram = match (line[i], signal_line[i]) {
                (Some(m), Some(s)) => Some(m - s),
                _ => None,
            };
            MacdPoint { time: c.timestamp, macd: line[i], signal: signal_line[i], histogram }
        })
        .collect()
}

pub fn bollinger(candles: &[Candle], period: usize, k: f64) -> Vec<BollingerPoint> {
    let values = closes(candles);
    let middle = sma_values(&values, period);
    let std = rolling_std(&values, period);

    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let (upper, lower) = match (middle[i], std[i]) {
                (Some(m), Some(s)) => (Some(m + k * s), Some(m - k * s)),
                _ => (None, None),
            };
            BollingerPoint { time: c.timestamp, upper, middle: middle[i], lower }
        })
        .collect()
}

/// Latest defined value of a series
pub fn last_value(series: &[IndicatorPoint]) -> Option<f64> {
    series.last().and_then(|p| p.value)
}
