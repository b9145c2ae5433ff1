use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use js_sys::{Function, Promise};
use serde::Serialize;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::application::{BacktestUseCase, MarketSession, browser_yield};
use crate::domain::{
    backtest::{BacktestOptions, ParameterSpace, RankMetric},
    config::ChartConfig,
    errors::DomainError,
    logging::LogComponent,
    market_data::{Candle, Symbol, TimeInterval},
    strategy::{StrategyParams, StrategyRegistry},
};
use crate::infrastructure::{
    services::LocalStorageSettings,
    websocket::{FeedClient, ReconnectPolicy},
};
use crate::{log_info, log_warn};

fn to_js_error(error: &DomainError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", error.kind(), error))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("serialization failed: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(what: &str, raw: &str) -> Result<T, JsValue> {
    serde_json::from_str(raw).map_err(|e| JsValue::from_str(&format!("invalid {what}: {e}")))
}

/// JavaScript facade over the live session and the backtester.
/// Every query returns a JSON string.
#[wasm_bindgen]
pub struct MarketChartApi {
    session: Rc<RefCell<MarketSession>>,
    backtests: Rc<BacktestUseCase>,
}

#[wasm_bindgen]
impl MarketChartApi {
    /// Session for `symbol` at `interval` ("1m", "5m", ...), configured
    /// from localStorage
    #[wasm_bindgen(constructor)]
    pub fn new(symbol: String, interval: String) -> Result<MarketChartApi, JsValue> {
        let interval: TimeInterval = interval
            .parse()
            .map_err(|_| JsValue::from_str(&format!("unknown interval: {interval}")))?;
        let config = ChartConfig::load(&LocalStorageSettings::new());
        let registry = StrategyRegistry::with_builtins();

        let session = MarketSession::new(config, Symbol::from(symbol.as_str()), interval, registry.clone())
            .map_err(|e| to_js_error(&e))?;

        log_info!(LogComponent::Presentation("MarketChartApi"), "✅ Ready for {}@{}", symbol, interval);
        Ok(Self { session: Rc::new(RefCell::new(session)), backtests: Rc::new(BacktestUseCase::new(registry)) })
    }

    /// Apply one raw feed frame; resolves to the resulting series event and alert snapshot
    #[wasm_bindgen(js_name = pushFeedMessage)]
    pub fn push_feed_message(&self, raw: &str) -> Result<String, JsValue> {
        let update = self.session.borrow_mut().handle_raw(raw).map_err(|e| to_js_error(&e))?;
        to_json(&update)
    }

    /// Stream a websocket feed into the session, calling `on_update` with
    /// each update's JSON. Resolves only when reconnects are exhausted.
    pub fn connect(&self, url: String, on_update: Option<Function>) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let client = FeedClient::new(url, ReconnectPolicy::default());
            let outcome = client
                .run(
                    |message| {
                        let update = session.borrow_mut().handle_message(message);
                        if let (Ok(update), Some(callback)) = (update, &on_update) {
                            if let Ok(json) = to_json(&update) {
                                if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                                    log_warn!(
                                        LogComponent::Presentation("MarketChartApi"),
                                        "⚠️ onUpdate callback threw: {:?}",
                                        e
                                    );
                                }
                            }
                        }
                    },
                    |attempt| {
                        log_info!(LogComponent::Presentation("MarketChartApi"), "🔄 Reconnect attempt {}", attempt);
                    },
                )
                .await;
            outcome.map(|_| JsValue::UNDEFINED).map_err(|e| JsValue::from_str(&e.to_string()))
        })
    }

    pub fn series(&self) -> Result<String, JsValue> {
        let session = self.session.borrow();
        to_json(&session.series(session.symbol(), session.interval()))
    }

    pub fn indicators(&self) -> Result<String, JsValue> {
        let session = self.session.borrow();
        to_json(&session.indicators(session.symbol(), session.interval()))
    }

    pub fn patterns(&self) -> Result<String, JsValue> {
        let session = self.session.borrow();
        to_json(&session.patterns(session.symbol(), session.interval()))
    }

    pub fn levels(&self) -> Result<String, JsValue> {
        let session = self.session.borrow();
        to_json(&session.levels(session.symbol(), session.interval()))
    }

    pub fn strategies(&self) -> Result<String, JsValue> {
        to_json(&self.session.borrow().registry().describe())
    }

    pub fn config(&self) -> Result<String, JsValue> {
        to_json(self.session.borrow().config())
    }

    /// Validate and persist a configuration; it applies to the next session
    #[wasm_bindgen(js_name = saveConfig)]
    pub fn save_config(&self, raw: &str) -> Result<(), JsValue> {
        let config: ChartConfig = from_json("config", raw)?;
        config.validate().map_err(|e| to_js_error(&e))?;
        config.save(&LocalStorageSettings::new()).map_err(|e| to_js_error(&e))
    }

    /// Backtest `strategy` over the session's candles. `params` and `options`
    /// are optional JSON objects; `on_progress` receives the completed fraction.
    #[wasm_bindgen(js_name = runBacktest)]
    pub fn run_backtest(
        &self,
        strategy: String,
        params: Option<String>,
        options: Option<String>,
        on_progress: Option<Function>,
    ) -> Result<Promise, JsValue> {
        let params: StrategyParams = match params {
            Some(raw) => from_json("params", &raw)?,
            None => StrategyParams::new(),
        };
        let options: BacktestOptions = match options {
            Some(raw) => from_json("options", &raw)?,
            None => self.session.borrow().config().backtest,
        };
        let candles = self.candles();
        let backtests = self.backtests.clone();

        Ok(future_to_promise(async move {
            let result = backtests
                .execute(&strategy, candles, &params, options, browser_yield, |progress| {
                    if let Some(callback) = &on_progress {
                        if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_f64(progress.fraction)) {
                            log_warn!(
                                LogComponent::Presentation("MarketChartApi"),
                                "⚠️ onProgress callback threw at {:.0}%: {:?}",
                                progress.fraction * 100.0,
                                e
                            );
                        }
                    }
                })
                .await
                .map_err(|e| to_js_error(&e))?;
            to_json(&result).map(JsValue::from)
        }))
    }

    /// Cancel the running backtest; it rejects with BACKTEST_CANCELLED
    #[wasm_bindgen(js_name = cancelBacktest)]
    pub fn cancel_backtest(&self) -> bool {
        self.backtests.cancel()
    }

    /// Sweep `space` (JSON `{param: [values...]}`) and rank by `metric`
    pub fn optimize(
        &self,
        strategy: &str,
        space: &str,
        metric: Option<String>,
        options: Option<String>,
    ) -> Result<String, JsValue> {
        let space: ParameterSpace = from_json("parameter space", space)?;
        let metric: RankMetric = match metric {
            Some(name) => name.parse().map_err(|_| JsValue::from_str(&format!("unknown metric: {name}")))?,
            None => RankMetric::default(),
        };
        let options: BacktestOptions = match options {
            Some(raw) => from_json("options", &raw)?,
            None => self.session.borrow().config().backtest,
        };
        let results = self
            .backtests
            .optimize(strategy, self.candles(), &space, options, metric)
            .map_err(|e| to_js_error(&e))?;
        to_json(&results)
    }
}

impl MarketChartApi {
    fn candles(&self) -> Arc<[Candle]> {
        let session = self.session.borrow();
        session.series(session.symbol(), session.interval()).into()
    }
}
