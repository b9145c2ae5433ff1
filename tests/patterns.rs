use market_chart_wasm::domain::market_data::{Candle, OHLCV, Price, Timestamp, Volume};
use market_chart_wasm::domain::patterns::{self, Direction, LevelKind, PatternKind};

fn candle(time: u64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(
        Timestamp::from(time),
        OHLCV::new(Price::from(open), Price::from(high), Price::from(low), Price::from(close), Volume::from(1.0)),
    )
}

fn kinds(candles: &[Candle], index: usize) -> Vec<PatternKind> {
    patterns::detect_at(candles, index, 5).iter().map(|p| p.kind).collect()
}

#[test]
fn small_body_inside_wide_range_is_a_doji() {
    let candles = vec![candle(60, 10.0, 10.5, 9.5, 10.05)];
    let found = patterns::detect_at(&candles, 0, 5);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, PatternKind::Doji);
    assert_eq!(found[0].direction, Direction::Neutral);
    assert_eq!(found[0].time, Timestamp::from(60));
    assert!((0.0..=1.0).contains(&found[0].significance));
}

#[test]
fn flat_candle_is_not_a_doji() {
    let candles = vec![candle(60, 10.0, 10.0, 10.0, 10.0)];
    assert!(kinds(&candles, 0).is_empty());
}

#[test]
fn engulfing_reversal() {
    let candles = vec![candle(0, 11.0, 11.1, 9.9, 10.0), candle(60, 9.5, 11.6, 9.4, 11.5)];
    assert_eq!(kinds(&candles, 1), vec![PatternKind::BullishEngulfing]);

    let mirrored = vec![candle(0, 10.0, 11.1, 9.9, 11.0), candle(60, 11.5, 11.6, 9.4, 9.5)];
    assert_eq!(kinds(&mirrored, 1), vec![PatternKind::BearishEngulfing]);
}

#[test]
fn morning_star_needs_three_candles() {
    let candles = vec![
        candle(0, 12.0, 12.1, 9.9, 10.0),
        candle(60, 9.8, 10.0, 9.7, 9.9),
        candle(120, 10.0, 11.6, 9.9, 11.5),
    ];
    assert_eq!(kinds(&candles, 2), vec![PatternKind::MorningStar]);
    assert!(kinds(&candles[1..], 1).is_empty());
}

#[test]
fn hammer_and_shooting_star() {
    assert!(patterns::is_hammer(&candle(0, 10.0, 10.3, 8.0, 10.3)));
    assert!(patterns::is_shooting_star(&candle(0, 10.0, 12.0, 9.9, 9.9)));
    assert!(!patterns::is_hammer(&candle(0, 10.0, 12.0, 9.9, 9.9)));
}

#[test]
fn scan_respects_minimum_significance() {
    let candles = vec![candle(0, 10.0, 10.5, 9.5, 10.05), candle(60, 10.0, 10.5, 9.5, 10.02)];
    assert_eq!(patterns::scan(&candles, 5, 0.0).len(), 2);
    assert!(patterns::scan(&candles, 5, 1.01).is_empty());
    assert_eq!(patterns::recent(&candles, 1, 5).len(), 1);
}

#[test]
fn local_extremes_become_levels() {
    let closes = [10.0, 11.0, 14.0, 11.0, 10.0, 12.0, 13.5, 12.0, 11.0];
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| candle(i as u64 * 60, *c, c + 0.5, c - 0.5, *c))
        .collect();

    let levels = patterns::find_levels(&candles, 2, 0.05);
    let summary: Vec<(LevelKind, f64, usize)> = levels.iter().map(|l| (l.kind, l.price, l.strength)).collect();
    assert_eq!(
        summary,
        vec![(LevelKind::Resistance, 14.5, 1), (LevelKind::Support, 9.5, 0), (LevelKind::Resistance, 14.0, 0)]
    );
}

#[test]
fn levels_need_both_sides_of_the_window() {
    let candles: Vec<Candle> = (0..4).map(|i| candle(i * 60, 10.0, 11.0, 9.0, 10.0)).collect();
    assert!(patterns::find_levels(&candles, 2, 0.001).is_empty());
}
