//! Built-in strategies.

use super::{ParamSpec, Signal, SignalType, Strategy, StrategyParams, confidence};
use crate::domain::{
    errors::Result,
    indicators::{ema_values, rsi_values, rolling_std, sma_values},
    market_data::Candle,
    patterns::{self, Direction},
};

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close()).collect()
}

fn signal(candles: &[Candle], side: SignalType, reason: String) -> Option<Signal> {
    let last = candles.last()?;
    Some(Signal { side, reason, confidence: confidence(candles, side), time: last.timestamp })
}

/// Last two defined values of a series
fn last_pair(values: &[Option<f64>]) -> Option<(f64, f64)> {
    match values {
        [.., Some(prev), Some(curr)] => Some((*prev, *curr)),
        _ => None,
    }
}

fn as_options(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

pub struct MaCrossoverStrategy;

impl Strategy for MaCrossoverStrategy {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn description(&self) -> &'static str {
        "Fast SMA crossing the slow SMA"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("fast_period", 10.0, 1.0, 200.0),
            ParamSpec::new("slow_period", 30.0, 2.0, 400.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let fast = params.period(self.name(), "fast_period")?;
        let slow = params.period(self.name(), "slow_period")?;
        let need = fast.max(slow) + 1;
        if candles.len() < need {
            return Ok(None);
        }

        // Only the trailing window affects the last two SMA points
        let tail = closes(&candles[candles.len() - need..]);
        let (Some((fast_prev, fast_curr)), Some((slow_prev, slow_curr))) =
            (last_pair(&sma_values(&tail, fast)), last_pair(&sma_values(&tail, slow)))
        else {
            return Ok(None);
        };

        let side = if fast_prev <= slow_prev && fast_curr > slow_curr {
            SignalType::Buy
        } else if fast_prev >= slow_prev && fast_curr < slow_curr {
            SignalType::Sell
        } else {
            return Ok(None);
        };
        let reason = format!("SMA{fast} crossed {} SMA{slow}", if side == SignalType::Buy { "above" } else { "below" });
        Ok(signal(candles, side, reason))
    }
}

pub struct RsiReversalStrategy;

impl Strategy for RsiReversalStrategy {
    fn name(&self) -> &'static str {
        "rsi_reversal"
    }

    fn description(&self) -> &'static str {
        "RSI leaving the oversold/overbought zone"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("period", 14.0, 2.0, 100.0),
            ParamSpec::new("oversold", 30.0, 1.0, 50.0),
            ParamSpec::new("overbought", 70.0, 50.0, 99.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let period = params.period(self.name(), "period")?;
        let oversold = params.value(self.name(), "oversold")?;
        let overbought = params.value(self.name(), "overbought")?;
        if candles.len() < period + 2 {
            return Ok(None);
        }

        let Some((prev, curr)) = last_pair(&rsi_values(&closes(candles), period)) else {
            return Ok(None);
        };

        if prev < oversold && curr > oversold {
            let reason = format!("RSI crossed above {oversold} ({curr:.1})");
            return Ok(signal(candles, SignalType::Buy, reason));
        }
        if prev > overbought && curr < overbought {
            let reason = format!("RSI crossed below {overbought} ({curr:.1})");
            return Ok(signal(candles, SignalType::Sell, reason));
        }
        Ok(None)
    }
}

pub struct MacdCrossoverStrategy;

impl Strategy for MacdCrossoverStrategy {
    fn name(&self) -> &'static str {
        "macd_crossover"
    }

    fn description(&self) -> &'static str {
        "MACD histogram changing sign"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("fast_period", 12.0, 1.0, 100.0),
            ParamSpec::new("slow_period", 26.0, 2.0, 200.0),
            ParamSpec::new("signal_period", 9.0, 1.0, 100.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let fast = params.period(self.name(), "fast_period")?;
        let slow = params.period(self.name(), "slow_period")?;
        let signal_period = params.period(self.name(), "signal_period")?;
        if candles.len() < fast.max(slow) + signal_period {
            return Ok(None);
        }

        let values = as_options(&closes(candles));
        let fast_ema = ema_values(&values, fast);
        let slow_ema = ema_values(&values, slow);
        let line: Vec<Option<f64>> =
            fast_ema.iter().zip(&slow_ema).map(|(f, s)| Some((*f)? - (*s)?)).collect();
        let signal_line = ema_values(&line, signal_period);
        let histogram: Vec<Option<f64>> =
            line.iter().zip(&signal_line).map(|(m, s)| Some((*m)? - (*s)?)).collect();

        let Some((prev, curr)) = last_pair(&histogram) else {
            return Ok(None);
        };
        if prev <= 0.0 && curr > 0.0 {
            return Ok(signal(candles, SignalType::Buy, "MACD histogram turned positive".into()));
        }
        if prev >= 0.0 && curr < 0.0 {
            return Ok(signal(candles, SignalType::Sell, "MACD histogram turned negative".into()));
        }
        Ok(None)
    }
}

pub struct BreakoutStrategy;

impl Strategy for BreakoutStrategy {
    fn name(&self) -> &'static str {
        "breakout"
    }

    fn description(&self) -> &'static str {
        "Close beyond the trailing range on heavy volume"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("lookback_period", 20.0, 2.0, 500.0),
            ParamSpec::new("volume_multiplier", 1.5, 0.0, 10.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let lookback = params.period(self.name(), "lookback_period")?;
        let multiplier = params.value(self.name(), "volume_multiplier")?;
        let Some((current, history)) = candles.split_last() else {
            return Ok(None);
        };
        if history.len() < lookback {
            return Ok(None);
        }

        let trailing = &history[history.len() - lookback..];
        let highest = trailing.iter().map(|c| c.high()).fold(f64::MIN, f64::max);
        let lowest = trailing.iter().map(|c| c.low()).fold(f64::MAX, f64::min);
        let avg_volume = trailing.iter().map(|c| c.volume()).sum::<f64>() / lookback as f64;
        if current.volume() < multiplier * avg_volume {
            return Ok(None);
        }

        if current.close() > highest {
            let reason = format!("Close {:.4} broke resistance {highest:.4}", current.close());
            return Ok(signal(candles, SignalType::Buy, reason));
        }
        if current.close() < lowest {
            let reason = format!("Close {:.4} broke support {lowest:.4}", current.close());
            return Ok(signal(candles, SignalType::Sell, reason));
        }
        Ok(None)
    }
}

pub struct PatternReversalStrategy;

impl Strategy for PatternReversalStrategy {
    fn name(&self) -> &'static str {
        "pattern_reversal"
    }

    fn description(&self) -> &'static str {
        "Reversal pattern against the prevailing trend"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("confirmation_window", 3.0, 1.0, 20.0),
            ParamSpec::new("trend_period", 10.0, 2.0, 200.0),
            ParamSpec::new("min_significance", 0.0, 0.0, 1.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let window = params.period(self.name(), "confirmation_window")?;
        let trend_period = params.period(self.name(), "trend_period")?;
        let min_significance = params.value(self.name(), "min_significance")?;
        if candles.len() < window + trend_period + 1 {
            return Ok(None);
        }

        // Trend measured up to the candle before the confirmation window
        let trend_end = candles.len() - window - 1;
        let trend_start = trend_end - trend_period;
        let trend = candles[trend_end].close() - candles[trend_start].close();

        let found = patterns::recent(candles, window, window.max(5))
            .into_iter()
            .rev()
            .filter(|p| p.significance >= min_significance)
            .find(|p| match p.direction {
                Direction::Bullish => trend < 0.0,
                Direction::Bearish => trend > 0.0,
                Direction::Neutral => false,
            });

        let Some(pattern) = found else {
            return Ok(None);
        };
        let side = match pattern.direction {
            Direction::Bullish => SignalType::Buy,
            _ => SignalType::Sell,
        };
        let reason = format!("{} against trend at {}", pattern.kind, pattern.time);
        Ok(signal(candles, side, reason))
    }
}

pub struct TrendFollowingStrategy;

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &'static str {
        "trend_following"
    }

    fn description(&self) -> &'static str {
        "Price versus trend EMA with a strength filter"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("ema_period", 50.0, 2.0, 500.0),
            ParamSpec::new("strength_threshold", 0.02, 0.0, 1.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let period = params.period(self.name(), "ema_period")?;
        let threshold = params.value(self.name(), "strength_threshold")?;
        let Some(last) = candles.last() else {
            return Ok(None);
        };

        let Some(ema) = ema_values(&as_options(&closes(candles)), period).last().copied().flatten()
        else {
            return Ok(None);
        };
        if ema <= 0.0 {
            return Ok(None);
        }

        let strength = (last.close() - ema).abs() / ema;
        if strength <= threshold {
            return Ok(None);
        }
        let side = if last.close() > ema { SignalType::Buy } else { SignalType::Sell };
        let reason = format!("Trend strength {:.2}% vs EMA{period}", strength * 100.0);
        Ok(signal(candles, side, reason))
    }
}

pub struct MeanReversionStrategy;

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &'static str {
        "mean_reversion"
    }

    fn description(&self) -> &'static str {
        "Close stretching outside the Bollinger bands"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::new("period", 20.0, 2.0, 200.0),
            ParamSpec::new("std_dev", 2.0, 0.5, 5.0),
        ];
        PARAMS
    }

    fn evaluate(&self, candles: &[Candle], params: &StrategyParams) -> Result<Option<Signal>> {
        let period = params.period(self.name(), "period")?;
        let k = params.value(self.name(), "std_dev")?;
        if candles.len() < period + 1 {
            return Ok(None);
        }

        let tail = closes(&candles[candles.len() - period - 1..]);
        let (Some((mid_prev, mid_curr)), Some((std_prev, std_curr))) =
            (last_pair(&sma_values(&tail, period)), last_pair(&rolling_std(&tail, period)))
        else {
            return Ok(None);
        };
        let (close_prev, close_curr) = (tail[tail.len() - 2], tail[tail.len() - 1]);

        if close_prev >= mid_prev - k * std_prev && close_curr < mid_curr - k * std_curr {
            return Ok(signal(candles, SignalType::Buy, "Close fell below lower band".into()));
        }
        if close_prev <= mid_prev + k * std_prev && close_curr > mid_curr + k * std_curr {
            return Ok(signal(candles, SignalType::Sell, "Close rose above upper band".into()));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{OHLCV, Price, Timestamp, Volume};

    fn series(closes: &[f64], volume: f64) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new(
                    Timestamp::from(i as u64 * 60),
                    OHLCV::new(Price::from(c), Price::from(c), Price::from(c), Price::from(c), Volume::from(volume)),
                )
            })
            .collect()
    }

    #[test]
    fn ma_crossover_fires_on_the_crossing_candle() {
        let params = MaCrossoverStrategy.default_params().with("fast_period", 2.0).with("slow_period", 3.0);
        let candles = series(&[10.0, 9.0, 8.0, 9.0, 11.0], 1.0);
        // SMA2/SMA3 at index 3: 8.5 vs 8.67, at index 4: 10.0 vs 9.33
        let signal = MaCrossoverStrategy.evaluate(&candles, &params).unwrap().unwrap();
        assert_eq!(signal.side, SignalType::Buy);
        assert_eq!(signal.time, Timestamp::from(240));

        assert!(MaCrossoverStrategy.evaluate(&candles[..4], &params).unwrap().is_none());
    }

    #[test]
    fn short_history_yields_no_signal() {
        let candles = series(&[1.0, 2.0], 1.0);
        let params = RsiReversalStrategy.default_params();
        assert_eq!(RsiReversalStrategy.evaluate(&candles, &params).unwrap(), None);
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let candles = series(&[1.0; 40], 1.0);
        let err = TrendFollowingStrategy.evaluate(&candles, &StrategyParams::new()).unwrap_err();
        assert_eq!(err.kind().as_ref(), "INVALID_PARAMS");
    }

    #[test]
    fn breakout_requires_volume_confirmation() {
        let mut candles = series(&[10.0; 5], 100.0);
        let params = BreakoutStrategy.default_params().with("lookback_period", 4.0);
        let breakout = Candle::new(
            Timestamp::from(300),
            OHLCV::new(Price::from(10.0), Price::from(12.0), Price::from(10.0), Price::from(11.5), Volume::from(100.0)),
        );
        candles.push(breakout);
        assert!(BreakoutStrategy.evaluate(&candles, &params).unwrap().is_none());

        let last = candles.len() - 1;
        candles[last].ohlcv.volume = Volume::from(200.0);
        let signal = BreakoutStrategy.evaluate(&candles, &params).unwrap().unwrap();
        assert_eq!(signal.side, SignalType::Buy);
    }
}
