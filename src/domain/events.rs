use crate::domain::market_data::{Candle, Symbol, TimeInterval};
use serde::Serialize;

/// Transition applied to a candle series by the aggregator.
///
/// `Tick` mutates the last element in place, `Candle` appends
/// (`gap_fill` then `opened`), `History` replaces the series wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeriesEvent {
    History {
        count: usize,
        anchor: Option<Candle>,
    },
    Tick {
        candle: Candle,
    },
    Candle {
        closed: Option<Candle>,
        gap_fill: Vec<Candle>,
        opened: Candle,
    },
}

impl SeriesEvent {
    /// Candle the event leaves in progress
    pub fn current(&self) -> Option<&Candle> {
        match self {
            Self::History { anchor, .. } => anchor.as_ref(),
            Self::Tick { candle } => Some(candle),
            Self::Candle { opened, .. } => Some(opened),
        }
    }

    /// Candles that became final with this transition
    pub fn finalized(&self) -> Vec<Candle> {
        match self {
            Self::Candle { closed, gap_fill, .. } => {
                closed.iter().chain(gap_fill.iter()).copied().collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Events related to market data
#[derive(Debug, Clone)]
pub enum MarketDataEvent {
    SeriesUpdated {
        symbol: Symbol,
        interval: TimeInterval,
        event: SeriesEvent,
    },
    UpdateDropped {
        symbol: Symbol,
        interval: TimeInterval,
        reason: String,
    },
}

/// Event dispatcher for publishing events
pub trait EventDispatcher {
    fn publish_market_data_event(&self, event: MarketDataEvent);
}

/// Simple in-memory event dispatcher
#[derive(Default)]
pub struct InMemoryEventDispatcher {
    market_data_handlers: Vec<Box<dyn Fn(&MarketDataEvent)>>,
}

impl InMemoryEventDispatcher {
    pub fn new() -> Self {
        Self { market_data_handlers: Vec::new() }
    }

    pub fn subscribe_to_market_data_events<F>(&mut self, handler: F)
    where
        F: Fn(&MarketDataEvent) + 'static,
    {
        self.market_data_handlers.push(Box::new(handler));
    }
}

impl EventDispatcher for InMemoryEventDispatcher {
    fn publish_market_data_event(&self, event: MarketDataEvent) {
        for handler in &self.market_data_handlers {
            handler(&event);
        }
    }
}
