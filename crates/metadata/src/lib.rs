//! ingest-metadata: feed and environment configuration for the streamer

pub mod error;
pub mod feed;
pub mod environment;

pub use error::MetadataError;
pub use feed::{DataTypeToggles, Feed, MarketCodes, DEFAULT_MARKET_CODES};
pub use environment::{Environment, TransportConfig, TransportType, DEFAULT_TIER};
