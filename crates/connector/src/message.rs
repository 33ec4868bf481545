//! Canonical market-data envelope published to the bus.
//!
//! Wire shape is `{"metadata": {...}, "payload": {...}}` with camelCase keys.
//! Decimals serialize as JSON strings carrying the exact upstream scale.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Ticker,
    Trade,
    OrderBook,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Ticker, DataType::Trade, DataType::OrderBook];

    /// Lowercase name used in routing keys and subscription requests
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Ticker => "ticker",
            DataType::Trade => "trade",
            DataType::OrderBook => "orderbook",
        }
    }

    /// Parse the upstream `ty` discriminator
    pub fn from_upstream(ty: &str) -> Option<Self> {
        match ty {
            "ticker" => Some(DataType::Ticker),
            "trade" => Some(DataType::Trade),
            "orderbook" => Some(DataType::OrderBook),
            _ => None,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        match self {
            DataType::Ticker => 0,
            DataType::Trade => 1,
            DataType::OrderBook => 2,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn serialize_micros<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub message_id: String,
    pub source_name: String,
    pub data_type: DataType,
    #[serde(serialize_with = "serialize_micros")]
    pub collected_at: DateTime<Utc>,
    pub schema_version: String,
}

impl Metadata {
    /// Fresh metadata: new UUID v4, current instant
    pub fn new(source_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            source_name: source_name.into(),
            data_type,
            collected_at: Utc::now(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerPayload {
    pub market_code: String,
    pub trade_price: Decimal,
    pub trade_volume: Option<Decimal>,
    pub opening_price: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub low_price: Option<Decimal>,
    pub prev_closing_price: Option<Decimal>,
    pub acc_trade_price_24h: Option<Decimal>,
    pub acc_trade_volume_24h: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePayload {
    pub market_code: String,
    pub timestamp: i64,
    pub trade_date: Option<String>,
    pub trade_time: Option<String>,
    pub trade_timestamp: i64,
    pub trade_price: Decimal,
    pub trade_volume: Decimal,
    pub ask_bid: String,
    pub prev_closing_price: Option<Decimal>,
    pub change: Option<String>,
    pub change_price: Option<Decimal>,
    pub sequential_id: i64,
    pub best_ask_price: Option<Decimal>,
    pub best_ask_size: Option<Decimal>,
    pub best_bid_price: Option<Decimal>,
    pub best_bid_size: Option<Decimal>,
    pub stream_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookUnit {
    pub ask_price: Decimal,
    pub ask_size: Decimal,
    pub bid_price: Decimal,
    pub bid_size: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookPayload {
    pub market_code: String,
    pub timestamp: i64,
    pub total_ask_size: Option<Decimal>,
    pub total_bid_size: Option<Decimal>,
    pub orderbook_units: Vec<OrderBookUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Ticker(TickerPayload),
    Trade(TradePayload),
    OrderBook(OrderBookPayload),
}

impl Payload {
    pub fn data_type(&self) -> DataType {
        match self {
            Payload::Ticker(_) => DataType::Ticker,
            Payload::Trade(_) => DataType::Trade,
            Payload::OrderBook(_) => DataType::OrderBook,
        }
    }

    pub fn market_code(&self) -> &str {
        match self {
            Payload::Ticker(p) => &p.market_code,
            Payload::Trade(p) => &p.market_code,
            Payload::OrderBook(p) => &p.market_code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalMessage {
    pub metadata: Metadata,
    pub payload: Payload,
}
