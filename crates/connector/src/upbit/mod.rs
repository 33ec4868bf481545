//! Upbit exchange connector
//!
//! Public WebSocket v1 feed: ticker, trade and orderbook in `SIMPLE` format.
//! No authentication, a single connection carries every subscribed market.

pub mod connector;
pub mod messages;
pub mod normalizer;

pub use connector::{ConnectionState, UpbitSupervisor};
pub use normalizer::{UpbitNormalizer, UPBIT_SOURCE_NAME};

/// Production WebSocket endpoint
pub const UPBIT_WS_URL: &str = "wss://api.upbit.com/websocket/v1";
