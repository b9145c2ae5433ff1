use std::time::Duration;

use futures::StreamExt;
use gloo_net::websocket::{Message, futures::WebSocket};
use gloo_timers::future::sleep;
use serde::{Deserialize, Serialize};

use super::{FeedMessage, parse_feed_message};
use crate::domain::{errors::DomainError, logging::LogComponent};
use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("failed to parse feed message: {0}")]
    Parse(String),
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("feed socket error: {0}")]
    Socket(String),
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl From<FeedError> for DomainError {
    fn from(error: FeedError) -> Self {
        DomainError::MalformedUpdate { symbol: "feed".to_string(), reason: error.to_string() }
    }
}

/// Capped exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: 6, initial_delay_ms: 1_000, max_delay_ms: 32_000 }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based), `None` once the cap is reached
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Some(Duration::from_millis(millis))
    }
}

/// Websocket feed client delivering parsed messages
pub struct FeedClient {
    url: String,
    policy: ReconnectPolicy,
}

impl FeedClient {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self { url: url.into(), policy }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    fn connect(&self) -> Result<WebSocket, FeedError> {
        log_info!(LogComponent::Infrastructure("FeedClient"), "🔌 Connecting to {}", self.url);
        WebSocket::open(&self.url)
            .map_err(|e| FeedError::Connect { url: self.url.clone(), reason: format!("{e:?}") })
    }

    /// Stream messages into `handler` until the retry budget is spent.
    ///
    /// `on_reconnect` is told the attempt number before each reconnect delay.
    /// The budget resets whenever a message is delivered.
    pub async fn run<F, R>(&self, mut handler: F, mut on_reconnect: R) -> Result<(), FeedError>
    where
        F: FnMut(FeedMessage),
        R: FnMut(u32),
    {
        let mut attempt: u32 = 0;
        loop {
            match self.connect() {
                Ok(mut socket) => {
                    while let Some(message) = socket.next().await {
                        match message {
                            Ok(Message::Text(raw)) => match parse_feed_message(&raw) {
                                Ok(parsed) => {
                                    attempt = 0;
                                    handler(parsed);
                                }
                                Err(e) => {
                                    log_warn!(
                                        LogComponent::Infrastructure("FeedClient"),
                                        "⚠️ Dropping feed message: {}",
                                        e
                                    );
                                }
                            },
                            Ok(Message::Bytes(bytes)) => {
                                log_debug!(
                                    LogComponent::Infrastructure("FeedClient"),
                                    "Ignoring {} byte binary frame",
                                    bytes.len()
                                );
                            }
                            Err(e) => {
                                log_error!(
                                    LogComponent::Infrastructure("FeedClient"),
                                    "❌ {}",
                                    FeedError::Socket(format!("{e:?}"))
                                );
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    log_error!(LogComponent::Infrastructure("FeedClient"), "❌ {}", e);
                }
            }

            let Some(delay) = self.policy.delay_for(attempt) else {
                log_error!(
                    LogComponent::Infrastructure("FeedClient"),
                    "🛑 Giving up on {} after {} attempts",
                    self.url,
                    attempt
                );
                return Err(FeedError::RetriesExhausted { attempts: attempt });
            };
            attempt += 1;
            log_warn!(
                LogComponent::Infrastructure("FeedClient"),
                "🔌 Reconnecting in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt,
                self.policy.max_attempts
            );
            on_reconnect(attempt);
            sleep(delay).await;
        }
    }
}
