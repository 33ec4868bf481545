//! Prometheus metrics for the streamer
//!
//! Metrics live in a registry owned by [`ConnectorMetrics`]; clone the handle to
//! share it between the supervisor, the pipeline and the HTTP server.

use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

const LABEL_FEED: &str = "feed";
const LABEL_OUTCOME: &str = "outcome";

/// Frame outcome label values
pub mod outcome {
    pub const PUBLISHED: &str = "published";
    pub const SKIPPED: &str = "skipped";
    pub const DECODE_ERROR: &str = "decode_error";
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const PUBLISH_ERROR: &str = "publish_error";
}

#[derive(Clone)]
pub struct ConnectorMetrics {
    registry: Registry,
    websocket_connected: IntGauge,
    reconnect_attempts: IntCounter,
    frames: IntCounterVec,
    markets_subscribed: IntGauge,
    last_activity: Gauge,
}

impl ConnectorMetrics {
    /// Create a metrics handle with its own registry; `feed` is a constant label
    pub fn new(feed: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let websocket_connected = IntGauge::with_opts(
            Opts::new(
                "ingest_websocket_connected",
                "WebSocket connection status (1=connected, 0=disconnected)",
            )
            .const_label(LABEL_FEED, feed),
        )?;
        let reconnect_attempts = IntCounter::with_opts(
            Opts::new(
                "ingest_reconnect_attempts_total",
                "Total reconnection attempts scheduled",
            )
            .const_label(LABEL_FEED, feed),
        )?;
        let frames = IntCounterVec::new(
            Opts::new("ingest_frames_total", "Inbound frames by processing outcome")
                .const_label(LABEL_FEED, feed),
            &[LABEL_OUTCOME],
        )?;
        let markets_subscribed = IntGauge::with_opts(
            Opts::new("ingest_markets_subscribed", "Number of market codes subscribed")
                .const_label(LABEL_FEED, feed),
        )?;
        let last_activity = Gauge::with_opts(
            Opts::new(
                "ingest_last_activity_timestamp",
                "Unix timestamp of the last inbound frame",
            )
            .const_label(LABEL_FEED, feed),
        )?;

        registry.register(Box::new(websocket_connected.clone()))?;
        registry.register(Box::new(reconnect_attempts.clone()))?;
        registry.register(Box::new(frames.clone()))?;
        registry.register(Box::new(markets_subscribed.clone()))?;
        registry.register(Box::new(last_activity.clone()))?;

        Ok(Self {
            registry,
            websocket_connected,
            reconnect_attempts,
            frames,
            markets_subscribed,
            last_activity,
        })
    }

    pub fn set_connected(&self) {
        self.websocket_connected.set(1);
    }

    pub fn set_disconnected(&self) {
        self.websocket_connected.set(0);
    }

    pub fn inc_reconnect_attempts(&self) {
        self.reconnect_attempts.inc();
    }

    pub fn set_markets_subscribed(&self, count: usize) {
        self.markets_subscribed.set(count as i64);
    }

    pub fn set_last_activity(&self, epoch_secs: f64) {
        self.last_activity.set(epoch_secs);
    }

    /// Record the outcome of one inbound frame (see [`outcome`])
    pub fn inc_frame(&self, outcome: &str) {
        self.frames.with_label_values(&[outcome]).inc();
    }

    pub fn frame_count(&self, outcome: &str) -> u64 {
        self.frames.with_label_values(&[outcome]).get()
    }

    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.get()
    }

    pub fn is_connected(&self) -> bool {
        self.websocket_connected.get() == 1
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}
