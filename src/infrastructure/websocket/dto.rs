//! Wire format of the price feed.
//!
//! ```json
//! {"type":"history","symbol":"BTCUSDT","interval":"1m","data":[{"time":60,"open":1,"high":2,"low":1,"close":2,"volume":3}]}
//! {"type":"tick","data":{"symbol":"BTCUSDT","price":"10.5","epoch":1700000000}}
//! {"type":"candle","data":{"symbol":"BTCUSDT","open":1,"high":2,"low":1,"close":2,"time":1700000000}}
//! ```
//!
//! Numeric fields may arrive as numbers or numeric strings; unknown fields
//! are ignored.

use serde::{Deserialize, Deserializer};

use super::FeedError;
use crate::domain::market_data::{Candle, OHLCV, Price, PriceUpdate, Symbol, Timestamp, Volume};

/// Epoch values above this are treated as milliseconds
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    History {
        #[serde(default)]
        symbol: Option<String>,
        #[serde(default)]
        interval: Option<String>,
        data: Vec<CandleDto>,
    },
    Tick {
        data: UpdateDto,
    },
    Candle {
        data: UpdateDto,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandleDto {
    #[serde(alias = "epoch", alias = "t", deserialize_with = "flexible_f64")]
    pub time: f64,
    #[serde(alias = "o", deserialize_with = "flexible_f64")]
    pub open: f64,
    #[serde(alias = "h", deserialize_with = "flexible_f64")]
    pub high: f64,
    #[serde(alias = "l", deserialize_with = "flexible_f64")]
    pub low: f64,
    #[serde(alias = "c", deserialize_with = "flexible_f64")]
    pub close: f64,
    #[serde(default, alias = "v", deserialize_with = "flexible_opt_f64")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateDto {
    #[serde(default, alias = "s")]
    pub symbol: Option<String>,
    #[serde(default, alias = "p", deserialize_with = "flexible_opt_f64")]
    pub price: Option<f64>,
    #[serde(default, alias = "o", deserialize_with = "flexible_opt_f64")]
    pub open: Option<f64>,
    #[serde(default, alias = "h", deserialize_with = "flexible_opt_f64")]
    pub high: Option<f64>,
    #[serde(default, alias = "l", deserialize_with = "flexible_opt_f64")]
    pub low: Option<f64>,
    #[serde(default, alias = "c", deserialize_with = "flexible_opt_f64")]
    pub close: Option<f64>,
    #[serde(default, alias = "v", deserialize_with = "flexible_opt_f64")]
    pub volume: Option<f64>,
    #[serde(default, alias = "time", alias = "t", deserialize_with = "flexible_opt_f64")]
    pub epoch: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn parse_number<E: serde::de::Error>(value: NumberOrString) -> Result<f64, E> {
    match value {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse::<f64>().map_err(|_| E::custom(format!("not a number: {s:?}"))),
    }
}

fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    parse_number(NumberOrString::deserialize(deserializer)?)
}

fn flexible_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(value) => parse_number(value).map(Some),
        None => Ok(None),
    }
}

/// Epoch seconds from a seconds or milliseconds value
pub fn epoch_seconds(raw: f64) -> Option<u64> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let secs = if raw >= MILLIS_THRESHOLD { raw / 1000.0 } else { raw };
    Some(secs.floor() as u64)
}

impl CandleDto {
    pub fn to_domain_candle(&self) -> Result<Candle, FeedError> {
        let time = epoch_seconds(self.time)
            .ok_or_else(|| FeedError::Parse(format!("invalid candle time {}", self.time)))?;
        Ok(Candle::new(
            Timestamp::from(time),
            OHLCV::new(
                Price::from(self.open),
                Price::from(self.high),
                Price::from(self.low),
                Price::from(self.close),
                Volume::from(self.volume.unwrap_or(0.0)),
            ),
        ))
    }
}

impl UpdateDto {
    /// Domain update; `fallback_symbol` applies when the payload names none.
    /// Numeric validation is left to the aggregator.
    pub fn to_price_update(&self, fallback_symbol: &Symbol) -> PriceUpdate {
        let symbol = match self.symbol.as_deref() {
            Some(s) if !s.trim().is_empty() => Symbol::from(s),
            _ => fallback_symbol.clone(),
        };
        PriceUpdate {
            symbol,
            epoch: self.epoch.and_then(epoch_seconds),
            price: self.price,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

pub fn parse_feed_message(raw: &str) -> Result<FeedMessage, FeedError> {
    serde_json::from_str(raw).map_err(|e| FeedError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_are_accepted() {
        let msg = parse_feed_message(r#"{"type":"tick","data":{"s":"btcusdt","p":"10.5","epoch":"130"}}"#).unwrap();
        let FeedMessage::Tick { data } = msg else {
            panic!("expected tick");
        };
        let update = data.to_price_update(&Symbol::default());
        assert_eq!(update.symbol.value(), "BTCUSDT");
        assert_eq!(update.price, Some(10.5));
        assert_eq!(update.epoch, Some(130));
    }

    #[test]
    fn milliseconds_become_seconds() {
        assert_eq!(epoch_seconds(1_700_000_000_123.0), Some(1_700_000_000));
        assert_eq!(epoch_seconds(1_700_000_000.0), Some(1_700_000_000));
        assert_eq!(epoch_seconds(-1.0), None);
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let err = parse_feed_message(r#"{"type":"depth","data":{}}"#).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }
}
