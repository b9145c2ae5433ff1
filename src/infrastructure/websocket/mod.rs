//! Price feed transport: wire DTOs and the reconnecting websocket client.

pub mod dto;
pub mod feed_client;

pub use dto::*;
pub use feed_client::*;
