use ingest_middleware::TransportError;
use thiserror::Error;

use crate::message::DataType;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Fatal setup problems; never retried.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no data types enabled")]
    NoDataTypesEnabled,
    #[error("no market codes configured")]
    NoMarketCodes,
}

/// Errors from the streaming socket.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("read timeout after {0} seconds")]
    ReadTimeout(u64),
    #[error("connect timeout after {0} seconds")]
    ConnectTimeout(u64),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A DTO failed validation. Names the offending upstream field.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("metadata declares {declared:?} but payload is {actual:?}")]
    PayloadMismatch { declared: DataType, actual: DataType },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to decode {data_type:?} frame: {source}")]
    Decode {
        data_type: DataType,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed: {0}")]
    Validation(#[from] NormalizeError),
    #[error("invalid envelope: {0}")]
    Envelope(String),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}
