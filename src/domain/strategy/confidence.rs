use super::SignalType;
use crate::domain::{
    indicators::{ema_values, rsi_values},
    market_data::Candle,
    patterns::{self, Direction},
};

pub const TREND_WEIGHT: f64 = 0.3;
pub const VOLUME_WEIGHT: f64 = 0.25;
pub const OSCILLATOR_WEIGHT: f64 = 0.25;
pub const PATTERN_WEIGHT: f64 = 0.2;

const TREND_PERIOD: usize = 20;
const VOLUME_PERIOD: usize = 20;
const RSI_PERIOD: usize = 14;
const PATTERN_LOOKBACK: usize = 3;

/// Which confirmations back a signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confirmations {
    pub trend: bool,
    pub volume: bool,
    pub oscillator: bool,
    pub pattern: bool,
}

impl Confirmations {
    pub fn score(&self) -> f64 {
        let mut score = 0.0;
        if self.trend {
            score += TREND_WEIGHT;
        }
        if self.volume {
            score += VOLUME_WEIGHT;
        }
        if self.oscillator {
            score += OSCILLATOR_WEIGHT;
        }
        if self.pattern {
            score += PATTERN_WEIGHT;
        }
        score.clamp(0.0, 1.0)
    }

    /// Inspect the tail of `candles` for confirmations of `side`
    pub fn assess(candles: &[Candle], side: SignalType) -> Self {
        let Some(last) = candles.last() else {
            return Self::default();
        };
        let closes: Vec<f64> = candles.iter().map(|c| c.close()).collect();

        let trend = ema_values(
            &closes.iter().copied().map(Some).collect::<Vec<_>>(),
            TREND_PERIOD,
        )
        .last()
        .copied()
        .flatten()
        .is_some_and(|ema| match side {
            SignalType::Buy => last.close() > ema,
            SignalType::Sell => last.close() < ema,
        });

        let volume_window = &candles[candles.len().saturating_sub(VOLUME_PERIOD + 1)..candles.len() - 1];
        let volume = !volume_window.is_empty() && {
            let avg = volume_window.iter().map(|c| c.volume()).sum::<f64>() / volume_window.len() as f64;
            avg > 0.0 && last.volume() > avg
        };

        let oscillator = rsi_values(&closes, RSI_PERIOD)
            .last()
            .copied()
            .flatten()
            .is_some_and(|rsi| match side {
                SignalType::Buy => rsi <= 40.0,
                SignalType::Sell => rsi >= 60.0,
            });

        let wanted = match side {
            SignalType::Buy => Direction::Bullish,
            SignalType::Sell => Direction::Bearish,
        };
        let pattern = patterns::recent(candles, PATTERN_LOOKBACK, PATTERN_LOOKBACK)
            .iter()
            .any(|p| p.direction == wanted);

        Self { trend, volume, oscillator, pattern }
    }
}

pub fn confidence(candles: &[Candle], side: SignalType) -> f64 {
    Confirmations::assess(candles, side).score()
}
