//! Candlestick pattern detection and support/resistance levels.

use serde::Serialize;
use strum::{AsRefStr, Display as StrumDisplay, EnumIter};

use crate::domain::market_data::{Candle, Timestamp};

const DOJI_BODY_RATIO: f64 = 0.1;
const STAR_STRONG_BODY_RATIO: f64 = 0.5;
const STAR_MIDDLE_BODY_RATIO: f64 = 0.3;

const VOLUME_WEIGHT: f64 = 0.4;
const BODY_WEIGHT: f64 = 0.3;
const TREND_WEIGHT: f64 = 0.3;
/// Window move (relative) that saturates the trend component
const TREND_SATURATION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, StrumDisplay, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternKind {
    Doji,
    Hammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl PatternKind {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Doji => Direction::Neutral,
            Self::Hammer | Self::BullishEngulfing | Self::MorningStar => Direction::Bullish,
            Self::ShootingStar | Self::BearishEngulfing | Self::EveningStar => Direction::Bearish,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub time: Timestamp,
    pub price: f64,
    pub direction: Direction,
    pub significance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    #[serde(rename = "type")]
    pub kind: LevelKind,
    pub price: f64,
    pub time: Timestamp,
    pub strength: usize,
}

pub fn is_doji(c: &Candle) -> bool {
    let range = c.range().value();
    range > 0.0 && c.body_size().value() <= DOJI_BODY_RATIO * range
}

pub fn is_hammer(c: &Candle) -> bool {
    let body = c.body_size().value();
    c.wick_low().value() > 2.0 * body && c.wick_high().value() < body
}

pub fn is_shooting_star(c: &Candle) -> bool {
    let body = c.body_size().value();
    c.wick_high().value() > 2.0 * body && c.wick_low().value() < body
}

fn body_bounds(c: &Candle) -> (f64, f64) {
    (c.open().min(c.close()), c.open().max(c.close()))
}

fn engulfs(prev: &Candle, curr: &Candle) -> bool {
    let (prev_lo, prev_hi) = body_bounds(prev);
    let (curr_lo, curr_hi) = body_bounds(curr);
    curr_lo < prev_lo && curr_hi > prev_hi
}

pub fn is_bullish_engulfing(prev: &Candle, curr: &Candle) -> bool {
    prev.is_bearish() && curr.is_bullish() && engulfs(prev, curr)
}

pub fn is_bearish_engulfing(prev: &Candle, curr: &Candle) -> bool {
    prev.is_bullish() && curr.is_bearish() && engulfs(prev, curr)
}

fn is_strong(c: &Candle) -> bool {
    let range = c.range().value();
    range > 0.0 && c.body_size().value() >= STAR_STRONG_BODY_RATIO * range
}

fn is_star_middle(first: &Candle, second: &Candle) -> bool {
    second.body_size().value() <= STAR_MIDDLE_BODY_RATIO * first.body_size().value()
}

pub fn is_morning_star(first: &Candle, second: &Candle, third: &Candle) -> bool {
    first.is_bearish()
        && is_strong(first)
        && is_star_middle(first, second)
        && third.is_bullish()
        && third.close() > first.body_midpoint()
}

pub fn is_evening_star(first: &Candle, second: &Candle, third: &Candle) -> bool {
    first.is_bullish()
        && is_strong(first)
        && is_star_middle(first, second)
        && third.is_bearish()
        && third.close() < first.body_midpoint()
}

/// Weighted score of volume surge, body conviction and trend magnitude over
/// the trailing `window` candles ending at `index`, clamped to `[0, 1]`.
pub fn significance(candles: &[Candle], index: usize, window: usize) -> f64 {
    let Some(current) = candles.get(index) else {
        return 0.0;
    };
    let start = (index + 1).saturating_sub(window.max(1));
    let slice = &candles[start..=index];

    let avg_volume = slice.iter().map(|c| c.volume()).sum::<f64>() / slice.len() as f64;
    let volume_score = if avg_volume > 0.0 {
        (current.volume() / avg_volume / 2.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let range = current.range().value();
    let body_score = if range > 0.0 { current.body_size().value() / range } else { 0.0 };

    let first_close = slice[0].close();
    let trend_score = if first_close > 0.0 {
        ((current.close() - first_close).abs() / first_close / TREND_SATURATION).clamp(0.0, 1.0)
    } else {
        0.0
    };

    (VOLUME_WEIGHT * volume_score + BODY_WEIGHT * body_score + TREND_WEIGHT * trend_score)
        .clamp(0.0, 1.0)
}

/// Patterns completed by the candle at `index`
pub fn detect_at(candles: &[Candle], index: usize, window: usize) -> Vec<Pattern> {
    let Some(current) = candles.get(index) else {
        return Vec::new();
    };
    let mut kinds = Vec::new();

    if is_doji(current) {
        kinds.push(PatternKind::Doji);
    }
    if is_hammer(current) {
        kinds.push(PatternKind::Hammer);
    }
    if is_shooting_star(current) {
        kinds.push(PatternKind::ShootingStar);
    }
    if index >= 1 {
        let prev = &candles[index - 1];
        if is_bullish_engulfing(prev, current) {
            kinds.push(PatternKind::BullishEngulfing);
        }
        if is_bearish_engulfing(prev, current) {
            kinds.push(PatternKind::BearishEngulfing);
        }
    }
    if index >= 2 {
        let (first, second) = (&candles[index - 2], &candles[index - 1]);
        if is_morning_star(first, second, current) {
            kinds.push(PatternKind::MorningStar);
        }
        if is_evening_star(first, second, current) {
            kinds.push(PatternKind::EveningStar);
        }
    }

    if kinds.is_empty() {
        return Vec::new();
    }

    let score = significance(candles, index, window);
    kinds
        .into_iter()
        .map(|kind| Pattern {
            kind,
            time: current.timestamp,
            price: current.close(),
            direction: kind.direction(),
            significance: score,
        })
        .collect()
}

/// Every pattern in the series at or above `min_significance`, oldest first
pub fn scan(candles: &[Candle], window: usize, min_significance: f64) -> Vec<Pattern> {
    (0..candles.len())
        .flat_map(|i| detect_at(candles, i, window))
        .filter(|p| p.significance >= min_significance)
        .collect()
}

/// Patterns whose completing candle lies within the last `lookback` candles
pub fn recent(candles: &[Candle], lookback: usize, window: usize) -> Vec<Pattern> {
    let start = candles.len().saturating_sub(lookback);
    (start..candles.len()).flat_map(|i| detect_at(candles, i, window)).collect()
}

/// Swing highs/lows that strictly dominate `periods` candles on each side.
///
/// Strength counts later candles whose high or low comes within
/// `tolerance * price` of the level.
pub fn find_levels(candles: &[Candle], periods: usize, tolerance: f64) -> Vec<Level> {
    if periods == 0 || candles.len() < periods * 2 + 1 {
        return Vec::new();
    }

    let mut levels = Vec::new();
    for i in periods..(candles.len() - periods) {
        let current = &candles[i];
        let neighbours = || candles[i - periods..i].iter().chain(candles[i + 1..=i + periods].iter());

        if neighbours().all(|c| c.high() < current.high()) {
            levels.push(level(candles, i, LevelKind::Resistance, current.high(), tolerance));
        }
        if neighbours().all(|c| c.low() > current.low()) {
            levels.push(level(candles, i, LevelKind::Support, current.low(), tolerance));
        }
    }
    levels
}

fn level(candles: &[Candle], index: usize, kind: LevelKind, price: f64, tolerance: f64) -> Level {
    let band = price.abs() * tolerance;
    let strength = candles[index + 1..]
        .iter()
        .filter(|c| (c.high() - price).abs() <= band || (c.low() - price).abs() <= band)
        .count();
    Level { kind, price, time: candles[index].timestamp, strength }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{OHLCV, Price, Volume};

    fn candle(time: u64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(
            Timestamp::from(time),
            OHLCV::new(Price::from(o), Price::from(h), Price::from(l), Price::from(c), Volume::from(1.0)),
        )
    }

    #[test]
    fn flat_candle_is_not_a_doji() {
        assert!(!is_doji(&candle(0, 5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn hammer_and_shooting_star_mirror() {
        let hammer = candle(0, 10.0, 10.3, 8.0, 10.3);
        assert!(is_hammer(&hammer));
        assert!(!is_shooting_star(&hammer));

        let star = candle(0, 10.0, 12.0, 9.9, 9.9);
        assert!(is_shooting_star(&star));
        assert!(!is_hammer(&star));
    }

    #[test]
    fn engulfing_needs_strict_containment() {
        let prev = candle(0, 10.0, 10.2, 9.4, 9.5);
        let curr = candle(60, 9.4, 10.3, 9.3, 10.1);
        assert!(is_bullish_engulfing(&prev, &curr));

        let touching = candle(60, 9.5, 10.3, 9.3, 10.1);
        assert!(!is_bullish_engulfing(&prev, &touching));
    }

    #[test]
    fn morning_star_closes_above_first_midpoint() {
        let first = candle(0, 10.0, 10.1, 8.9, 9.0);
        let second = candle(60, 8.9, 9.0, 8.7, 8.85);
        let third = candle(120, 8.9, 9.8, 8.9, 9.7);
        assert!(is_morning_star(&first, &second, &third));

        let weak_third = candle(120, 8.9, 9.4, 8.9, 9.3);
        assert!(!is_morning_star(&first, &second, &weak_third));
    }

    #[test]
    fn significance_is_clamped() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(i * 60, 10.0, 20.0, 1.0, 19.0)).collect();
        let score = significance(&candles, 4, 5);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn levels_need_strict_extremes() {
        let closes = [1.0, 2.0, 3.0, 2.0, 1.0];
        let candles: Vec<Candle> =
            closes.iter().enumerate().map(|(i, &c)| candle(i as u64 * 60, c, c, c, c)).collect();
        let levels = find_levels(&candles, 2, 0.001);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].kind, LevelKind::Resistance);
        assert_eq!(levels[0].price, 3.0);
    }
}
