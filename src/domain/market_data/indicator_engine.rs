use super::Candle;
use crate::domain::events::SeriesEvent;
use std::collections::VecDeque;

/// Rolling window state for one SMA period
#[derive(Debug, Clone)]
struct SmaWindow {
    period: usize,
    win: VecDeque<f64>,
    sum: f64,
    values: Vec<f64>,
}

/// Recursive state for one EMA period
#[derive(Debug, Clone)]
struct EmaState {
    period: usize,
    alpha: f64,
    seed: Vec<f64>,
    last: Option<f64>,
    values: Vec<f64>,
}

/// Engine maintaining SMA/EMA incrementally over finalized candles, with
/// previews for the in-progress candle.
///
/// Values line up with the pure indicator functions: the first SMA/EMA value
/// belongs to the `period`-th finalized candle and the EMA is seeded with the SMA.
/// When driven by [`Self::apply_event`] the engine covers exactly the finalized
/// candles the capped series retains, so its value buffers stay bounded by the cap.
#[derive(Debug, Clone, Default)]
pub struct MovingAverageEngine {
    smas: Vec<SmaWindow>,
    emas: Vec<EmaState>,
    closed: usize,
}

impl MovingAverageEngine {
    pub fn new(sma_periods: &[usize], ema_periods: &[usize]) -> Self {
        Self {
            smas: sma_periods
                .iter()
                .filter(|p| **p > 0)
                .map(|&period| SmaWindow {
                    period,
                    win: VecDeque::with_capacity(period),
                    sum: 0.0,
                    values: Vec::new(),
                })
                .collect(),
            emas: ema_periods
                .iter()
                .filter(|p| **p > 0)
                .map(|&period| EmaState {
                    period,
                    alpha: 2.0 / (period as f64 + 1.0),
                    seed: Vec::with_capacity(period),
                    last: None,
                    values: Vec::new(),
                })
                .collect(),
            closed: 0,
        }
    }

    pub fn compute_historical(&mut self, candles: &[Candle]) {
        for c in candles {
            self.update_on_close(c.close());
        }
    }

    /// Feed an aggregator transition; only finalized candles advance the engine
    pub fn apply_event(&mut self, event: &SeriesEvent, history: &[Candle]) {
        match event {
            SeriesEvent::History { .. } => {
                self.reset();
                // The newest history candle is still in progress
                let finalized = history.len().saturating_sub(1);
                self.compute_historical(&history[..finalized]);
            }
            SeriesEvent::Candle { .. } => {
                let finalized = event.finalized();
                let retained = history.len().saturating_sub(1);
                if self.closed + finalized.len() > retained {
                    // The capped series evicted candles the engine still covers
                    self.reset();
                    self.compute_historical(&history[..retained]);
                } else {
                    for candle in finalized {
                        self.update_on_close(candle.close());
                    }
                }
            }
            SeriesEvent::Tick { .. } => {}
        }
    }

    fn reset(&mut self) {
        for sma in &mut self.smas {
            sma.win.clear();
            sma.sum = 0.0;
            sma.values.clear();
        }
        for ema in &mut self.emas {
            ema.seed.clear();
            ema.last = None;
            ema.values.clear();
        }
        self.closed = 0;
    }

    /// Update indicators when a candle closes
    pub fn update_on_close(&mut self, close: f64) {
        self.closed += 1;
        for sma in &mut self.smas {
            sma.sum += close;
            sma.win.push_back(close);
            if sma.win.len() > sma.period {
                if let Some(v) = sma.win.pop_front() {
                    sma.sum -= v;
                }
            }
            if sma.win.len() == sma.period {
                sma.values.push(sma.sum / sma.period as f64);
            }
        }
        for ema in &mut self.emas {
            match ema.last {
                Some(prev) => {
                    let val = (close - prev) * ema.alpha + prev;
                    ema.last = Some(val);
                    ema.values.push(val);
                }
                None => {
                    ema.seed.push(close);
                    if ema.seed.len() == ema.period {
                        let val = ema.seed.iter().sum::<f64>() / ema.period as f64;
                        ema.last = Some(val);
                        ema.values.push(val);
                    }
                }
            }
        }
    }

    /// Preview SMA for an in-progress candle
    pub fn preview_sma(&self, period: usize, close: f64) -> Option<f64> {
        let sma = self.smas.iter().find(|s| s.period == period)?;
        if sma.win.len() + 1 < sma.period {
            return None;
        }
        let removed = if sma.win.len() == sma.period { *sma.win.front()? } else { 0.0 };
        Some((sma.sum + close - removed) / period as f64)
    }

    /// Preview EMA for an in-progress candle
    pub fn preview_ema(&self, period: usize, close: f64) -> Option<f64> {
        let ema = self.emas.iter().find(|e| e.period == period)?;
        match ema.last {
            Some(prev) => Some((close - prev) * ema.alpha + prev),
            None if ema.seed.len() + 1 == ema.period => {
                Some((ema.seed.iter().sum::<f64>() + close) / ema.period as f64)
            }
            None => None,
        }
    }

    /// Finalized SMA values; the first belongs to finalized candle `period - 1`
    pub fn sma(&self, period: usize) -> Option<&[f64]> {
        self.smas.iter().find(|s| s.period == period).map(|s| s.values.as_slice())
    }

    pub fn ema(&self, period: usize) -> Option<&[f64]> {
        self.emas.iter().find(|e| e.period == period).map(|e| e.values.as_slice())
    }

    pub fn closed_count(&self) -> usize {
        self.closed
    }
}
