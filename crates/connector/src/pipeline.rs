//! Inbound frame pipeline: classify -> decode -> normalize -> publish.
//!
//! Frames are dispatched onto spawned tasks gated by a semaphore so the receive
//! loop only waits when every permit is held.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use ingest_metadata::DataTypeToggles;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, trace, warn};

use crate::error::{PipelineError, PublishError};
use crate::message::{CanonicalMessage, DataType};
use crate::metrics::{outcome, ConnectorMetrics};
use crate::publisher::MarketDataPublisher;
use crate::throughput::RateCounters;
use crate::upbit::messages::{classify, UpbitOrderBook, UpbitTicker, UpbitTrade};
use crate::upbit::normalizer::UpbitNormalizer;

/// Maximum number of frames processed concurrently
pub const MAX_IN_FLIGHT: usize = 32;

/// Why a frame was dropped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not JSON, no `ty`, or an unknown `ty`
    Unrecognized,
    Disabled(DataType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Published(DataType),
    Skipped(SkipReason),
}

pub struct IngestPipeline {
    enabled: DataTypeToggles,
    normalizer: UpbitNormalizer,
    publisher: MarketDataPublisher,
    throughput: Arc<RateCounters>,
    metrics: Option<ConnectorMetrics>,
    permits: Arc<Semaphore>,
}

impl IngestPipeline {
    pub fn new(
        enabled: DataTypeToggles,
        normalizer: UpbitNormalizer,
        publisher: MarketDataPublisher,
        throughput: Arc<RateCounters>,
    ) -> Self {
        Self {
            enabled,
            normalizer,
            publisher,
            throughput,
            metrics: None,
            permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    pub fn with_metrics(mut self, metrics: ConnectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_enabled(&self, data_type: DataType) -> bool {
        match data_type {
            DataType::Ticker => self.enabled.ticker,
            DataType::Trade => self.enabled.trade,
            DataType::OrderBook => self.enabled.orderbook,
        }
    }

    /// Enabled data types in ticker, trade, orderbook order
    pub fn enabled_types(&self) -> Vec<DataType> {
        DataType::ALL
            .into_iter()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free worker slot. `None` once the pipeline is closed.
    ///
    /// Cancel-safe: dropping the future gives up the place in the queue only.
    pub async fn reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    /// Run one frame on a worker task holding `permit` until it finishes.
    pub fn spawn(self: &Arc<Self>, permit: OwnedSemaphorePermit, frame: Bytes) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            pipeline.handle(&frame).await;
        });
    }

    /// Reserve a slot, then hand the frame to a worker task.
    pub async fn dispatch(self: &Arc<Self>, frame: Bytes) {
        match self.reserve().await {
            Some(permit) => self.spawn(permit, frame),
            None => warn!("Pipeline semaphore closed, dropping frame"),
        }
    }

    /// Process one frame and log the outcome; never fails.
    pub async fn handle(&self, frame: &[u8]) {
        let label = match self.process(frame).await {
            Ok(Outcome::Published(data_type)) => {
                trace!(data_type = %data_type, "Frame published");
                outcome::PUBLISHED
            }
            Ok(Outcome::Skipped(reason)) => {
                trace!(reason = ?reason, "Frame skipped");
                outcome::SKIPPED
            }
            Err(e @ PipelineError::Decode { .. }) => {
                warn!(error = %e, "Dropping undecodable frame");
                outcome::DECODE_ERROR
            }
            Err(e @ (PipelineError::Validation(_) | PipelineError::Envelope(_))) => {
                warn!(error = %e, "Dropping invalid frame");
                outcome::VALIDATION_ERROR
            }
            // contract violations are already logged by the publisher
            Err(PipelineError::Publish(PublishError::PayloadMismatch { .. })) => {
                outcome::PUBLISH_ERROR
            }
            Err(e @ PipelineError::Publish(_)) => {
                error!(error = %e, "Dropping frame after publish failure");
                outcome::PUBLISH_ERROR
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.inc_frame(label);
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            metrics.set_last_activity(now);
        }
    }

    /// Classify, convert and publish one frame.
    pub async fn process(&self, frame: &[u8]) -> Result<Outcome, PipelineError> {
        let data_type = match classify(frame) {
            Some(data_type) => data_type,
            None => return Ok(Outcome::Skipped(SkipReason::Unrecognized)),
        };
        if !self.is_enabled(data_type) {
            return Ok(Outcome::Skipped(SkipReason::Disabled(data_type)));
        }

        let decode_err =
            |source: serde_json::Error| PipelineError::Decode { data_type, source };
        let message = match data_type {
            DataType::Ticker => {
                let dto: UpbitTicker = serde_json::from_slice(frame).map_err(decode_err)?;
                self.normalizer.ticker(dto)?
            }
            DataType::Trade => {
                let dto: UpbitTrade = serde_json::from_slice(frame).map_err(decode_err)?;
                self.normalizer.trade(dto)?
            }
            DataType::OrderBook => {
                let dto: UpbitOrderBook = serde_json::from_slice(frame).map_err(decode_err)?;
                self.normalizer.orderbook(dto)?
            }
        };

        validate_envelope(&message)?;
        self.publisher.publish(&message).await?;
        self.throughput.record(data_type);
        Ok(Outcome::Published(data_type))
    }
}

fn validate_envelope(message: &CanonicalMessage) -> Result<(), PipelineError> {
    if message.metadata.message_id.trim().is_empty() {
        return Err(PipelineError::Envelope("messageId is blank".to_string()));
    }
    if message.metadata.source_name.trim().is_empty() {
        return Err(PipelineError::Envelope("sourceName is blank".to_string()));
    }
    Ok(())
}
