//! Upbit connection supervisor
//!
//! Owns the connection lifecycle: connect, subscribe, stream frames into the
//! pipeline, keep the socket alive, and reconnect with backoff when the
//! session ends. Only configuration problems stop the loop for good.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{ConfigError, ConnectorError, FeedError};
use crate::message::DataType;
use crate::metrics::ConnectorMetrics;
use crate::pipeline::IngestPipeline;
use crate::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::traits::{FeedSession, FeedTransport};
use crate::upbit::messages::subscription_request;

/// Upbit drops idle sockets after 120s
pub const PING_INTERVAL: Duration = Duration::from_secs(60);

const PING_PAYLOAD: &[u8] = b"ping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Subscription sent, no data yet
    Subscribed,
    /// At least one frame received on the current session
    Streaming,
    /// Terminal
    Disposed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Disposed => "disposed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum SessionEnd {
    /// Shutdown or dispose requested
    Stopped,
    Failed(FeedError),
}

pub struct UpbitSupervisor {
    endpoint: String,
    market_codes: Vec<String>,
    transport: Arc<dyn FeedTransport>,
    pipeline: Arc<IngestPipeline>,
    reconnect: ReconnectConfig,
    ping_interval: Duration,
    metrics: Option<ConnectorMetrics>,
    state_tx: watch::Sender<ConnectionState>,
    dispose_tx: watch::Sender<bool>,
}

impl UpbitSupervisor {
    pub fn new(
        endpoint: impl Into<String>,
        market_codes: Vec<String>,
        transport: Arc<dyn FeedTransport>,
        pipeline: Arc<IngestPipeline>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (dispose_tx, _) = watch::channel(false);
        Self {
            endpoint: endpoint.into(),
            market_codes,
            transport,
            pipeline,
            reconnect: ReconnectConfig::default(),
            ping_interval: PING_INTERVAL,
            metrics: None,
            state_tx,
            dispose_tx,
        }
    }

    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    pub fn with_ping_interval(mut self, ping_interval: Duration) -> Self {
        self.ping_interval = ping_interval;
        self
    }

    pub fn with_metrics(mut self, metrics: ConnectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Watch connection state transitions
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Stop the supervisor for good. Safe to call more than once.
    pub fn dispose(&self) {
        if !self.dispose_tx.send_replace(true) {
            info!("Disposing Upbit supervisor");
        }
    }

    /// Run until shutdown, dispose, or a fatal error.
    ///
    /// Empty data types or market codes fail before any connection attempt.
    /// Every other failure schedules a reconnect.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConnectorError> {
        let data_types = self.pipeline.enabled_types();
        if data_types.is_empty() {
            self.set_state(ConnectionState::Disposed);
            return Err(ConfigError::NoDataTypesEnabled.into());
        }
        if self.market_codes.is_empty() {
            self.set_state(ConnectionState::Disposed);
            return Err(ConfigError::NoMarketCodes.into());
        }

        let mut dispose = self.dispose_tx.subscribe();
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());

        let result = loop {
            self.set_state(ConnectionState::Connecting);
            let end = self
                .run_session(&data_types, &mut policy, &mut shutdown, &mut dispose)
                .await;

            let err = match end {
                SessionEnd::Stopped => break Ok(()),
                SessionEnd::Failed(err) => err,
            };

            self.set_state(ConnectionState::Disconnected);
            if let Some(metrics) = &self.metrics {
                metrics.set_disconnected();
            }

            let delay = policy.next_delay();
            if let Some(metrics) = &self.metrics {
                metrics.inc_reconnect_attempts();
            }
            warn!(
                error = %err,
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis() as u64,
                "Upbit session ended, reconnecting"
            );

            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown, &mut dispose) => break Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        };

        self.set_state(ConnectionState::Disposed);
        if let Some(metrics) = &self.metrics {
            metrics.set_disconnected();
        }
        info!("Upbit supervisor stopped");
        result
    }

    async fn run_session(
        &self,
        data_types: &[DataType],
        policy: &mut ReconnectPolicy,
        shutdown: &mut watch::Receiver<bool>,
        dispose: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let connected = tokio::select! {
            biased;
            _ = stop_requested(shutdown, dispose) => return SessionEnd::Stopped,
            result = self.transport.connect(&self.endpoint) => result,
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(e) => return SessionEnd::Failed(e),
        };
        if let Some(metrics) = &self.metrics {
            metrics.set_connected();
        }

        if let Err(e) = self.subscribe(session.as_mut(), data_types).await {
            close(session.as_mut()).await;
            return SessionEnd::Failed(e);
        }

        let mut ping = interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut streaming = false;
        // a worker slot is held before reading, so a full pipeline never parks
        // the loop outside this select
        let mut slot: Option<OwnedSemaphorePermit> = None;

        let end = loop {
            tokio::select! {
                biased;
                _ = stop_requested(shutdown, dispose) => break SessionEnd::Stopped,
                _ = ping.tick() => {
                    trace!("Sending keepalive ping");
                    if let Err(e) = session.ping(PING_PAYLOAD.to_vec()).await {
                        warn!(error = %e, "Failed to send keepalive ping");
                    }
                }
                permit = self.pipeline.reserve(), if slot.is_none() => match permit {
                    Some(permit) => slot = Some(permit),
                    None => {
                        warn!("Pipeline closed, ending session");
                        break SessionEnd::Stopped;
                    }
                },
                result = session.recv(), if slot.is_some() => match result {
                    Ok(Some(frame)) => {
                        if !streaming {
                            streaming = true;
                            policy.reset();
                            self.set_state(ConnectionState::Streaming);
                        }
                        if let Some(permit) = slot.take() {
                            self.pipeline.spawn(permit, frame);
                        }
                    }
                    Ok(None) => break SessionEnd::Failed(FeedError::ConnectionClosed),
                    Err(e) => break SessionEnd::Failed(e),
                }
            }
        };

        close(session.as_mut()).await;
        end
    }

    async fn subscribe(
        &self,
        session: &mut dyn FeedSession,
        data_types: &[DataType],
    ) -> Result<(), FeedError> {
        let ticket = Uuid::new_v4().to_string();
        let request = subscription_request(&ticket, data_types, &self.market_codes)?;
        debug!(request = %request, "Sending Upbit subscription");
        session.send_text(request).await?;

        self.set_state(ConnectionState::Subscribed);
        if let Some(metrics) = &self.metrics {
            metrics.set_markets_subscribed(self.market_codes.len());
        }
        info!(
            ticket = %ticket,
            markets = self.market_codes.len(),
            data_types = ?data_types,
            "Subscribed to Upbit"
        );
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "Connection state changed");
        }
    }
}

async fn close(session: &mut dyn FeedSession) {
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing Upbit session");
    }
}

/// Resolves once either flag is set or its sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>, dispose: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = wait_true(shutdown) => {}
        _ = wait_true(dispose) => {}
    }
}

async fn wait_true(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
