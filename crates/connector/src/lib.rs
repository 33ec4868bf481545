//! ingest-connector: market data ingest runtime components
//!
//! Connects to the Upbit WebSocket feed, converts upstream frames into
//! canonical messages, publishes them to the bus, and tracks throughput and
//! publish failures.

pub mod error;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod reconnect;
pub mod server;
pub mod throughput;
pub mod traits;
pub mod upbit;
pub mod websocket;

pub use error::{
    ConfigError, ConnectorError, FeedError, NormalizeError, PipelineError, PublishError,
};
pub use message::{CanonicalMessage, DataType, Metadata, Payload};
pub use metrics::ConnectorMetrics;
pub use pipeline::{IngestPipeline, Outcome, SkipReason};
pub use publisher::{routing_key, MarketDataPublisher};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use server::{create_router, run_server, ServerState};
pub use throughput::{CounterKind, CounterSnapshot, RateCounters};
pub use traits::{FeedSession, FeedTransport};
pub use upbit::{ConnectionState, UpbitNormalizer, UpbitSupervisor};
pub use websocket::WebSocketTransport;
