use crate::domain::{
    errors::{DomainError, Result},
    logging::{LogComponent, LogLevel, log_domain_error},
    market_data::{Candle, Symbol, TimeInterval, Timestamp},
};

/// Domain service for candle validation
#[derive(Debug, Clone, Copy, Default)]
pub struct DataValidationService;

impl DataValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single candle with a descriptive reason
    pub fn validate_candle(&self, symbol: &Symbol, candle: &Candle) -> Result<()> {
        let invalid = |reason: &str| DomainError::InvalidCandle {
            symbol: symbol.value().to_string(),
            time: candle.time(),
            reason: reason.to_string(),
        };

        let ohlcv = &candle.ohlcv;
        if [ohlcv.open, ohlcv.high, ohlcv.low, ohlcv.close].iter().any(|p| !p.value().is_finite()) {
            return Err(invalid("Prices must be finite"));
        }
        if !ohlcv.volume.value().is_finite() || ohlcv.volume.value() < 0.0 {
            return Err(invalid("Volume must be finite and non-negative"));
        }
        if ohlcv.high < ohlcv.low {
            return Err(invalid("High price cannot be lower than low price"));
        }
        if ohlcv.high < ohlcv.open || ohlcv.high < ohlcv.close {
            return Err(invalid("High price cannot be lower than open/close"));
        }
        if ohlcv.low > ohlcv.open || ohlcv.low > ohlcv.close {
            return Err(invalid("Low price cannot be higher than open/close"));
        }

        Ok(())
    }

    /// Validate that a finalized series is bucket-aligned and strictly increasing
    pub fn validate_candle_sequence(
        &self,
        symbol: &Symbol,
        interval: TimeInterval,
        candles: &[Candle],
    ) -> Result<()> {
        for (i, candle) in candles.iter().enumerate() {
            self.validate_candle(symbol, candle)?;

            if candle.timestamp.bucket_start(interval) != candle.timestamp {
                return Err(DomainError::InvalidCandle {
                    symbol: symbol.value().to_string(),
                    time: candle.time(),
                    reason: format!("time is not aligned to {interval} buckets"),
                });
            }

            if i > 0 && candle.timestamp <= candles[i - 1].timestamp {
                return Err(DomainError::InvalidCandle {
                    symbol: symbol.value().to_string(),
                    time: candle.time(),
                    reason: format!("candles are not in chronological order at index {i}"),
                });
            }
        }

        Ok(())
    }

    /// Clean a history payload: drop invalid candles, align to buckets,
    /// sort and keep the last candle for any duplicated bucket.
    pub fn normalize_history(
        &self,
        symbol: &Symbol,
        interval: TimeInterval,
        candles: Vec<Candle>,
    ) -> Vec<Candle> {
        let mut cleaned: Vec<Candle> = Vec::with_capacity(candles.len());

        for candle in candles {
            if let Err(e) = self.validate_candle(symbol, &candle) {
                log_domain_error(
                    LogLevel::Warn,
                    LogComponent::Domain("DataValidation"),
                    "⚠️ Dropping history candle",
                    &e,
                );
                continue;
            }
            let aligned: Timestamp = candle.timestamp.bucket_start(interval);
            cleaned.push(Candle::new(aligned, candle.ohlcv));
        }

        // Stable sort keeps arrival order within a bucket so the last one wins below
        cleaned.sort_by_key(|c| c.timestamp);

        let mut deduped: Vec<Candle> = Vec::with_capacity(cleaned.len());
        for candle in cleaned {
            match deduped.last_mut() {
                Some(last) if last.timestamp == candle.timestamp => *last = candle,
                _ => deduped.push(candle),
            }
        }
        deduped
    }
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
    fn rejects_high_below_close() {
        let svc = DataValidationService::new();
        let err = svc.validate_candle(&Symbol::from("BTC"), &candle(60, 10.0, 10.5, 9.0, 11.0)).unwrap_err();
        assert_eq!(err.kind().as_ref(), "INVALID_CANDLE");
    }

    #[test]
    fn sequence_must_be_aligned_and_increasing() {
        let svc = DataValidationService::new();
        let symbol = Symbol::from("BTC");
        let good = vec![candle(60, 1.0, 2.0, 0.5, 1.5), candle(120, 1.5, 2.0, 1.0, 1.8)];
        assert!(svc.validate_candle_sequence(&symbol, TimeInterval::OneMinute, &good).is_ok());

        let unaligned = vec![candle(61, 1.0, 2.0, 0.5, 1.5)];
        assert!(svc.validate_candle_sequence(&symbol, TimeInterval::OneMinute, &unaligned).is_err());

        let reversed = vec![good[1], good[0]];
        assert!(svc.validate_candle_sequence(&symbol, TimeInterval::OneMinute, &reversed).is_err());
    }

    #[test]
    fn normalize_history_sorts_dedups_and_drops_invalid() {
        let svc = DataValidationService::new();
        let raw = vec![
            candle(185, 3.0, 3.5, 2.5, 3.2),
            candle(65, 1.0, 2.0, 0.5, 1.5),
            candle(130, 2.0, 2.5, 1.5, 2.2),
            candle(170, 2.2, 2.6, 2.0, 2.4),
            candle(240, 5.0, 4.0, 3.0, 4.5),
        ];
        let cleaned = svc.normalize_history(&Symbol::from("BTC"), TimeInterval::OneMinute, raw);
        let times: Vec<u64> = cleaned.iter().map(|c| c.time()).collect();
        assert_eq!(times, vec![60, 120, 180]);
        assert_eq!(cleaned[1].close(), 2.4);
    }
}
