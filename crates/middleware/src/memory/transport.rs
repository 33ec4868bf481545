use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::nats::subject_matches;
use crate::transport::{Headers, Subscription, Transport, TransportMessage};

const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Process-local bus. Subscriptions are keyed by pattern; a publish fans out
/// to every pattern matching the subject.
pub struct InMemoryTransport {
    channels: DashMap<String, broadcast::Sender<TransportMessage>>,
    sequence: AtomicU64,
    published: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            sequence: AtomicU64::new(0),
            published: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    #[inline]
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of messages accepted so far
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Simulate a broker outage: publishes fail until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn get_or_create_channel(&self, pattern: &str) -> broadcast::Sender<TransportMessage> {
        self.channels
            .entry(pattern.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER_SIZE).0)
            .clone()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemorySubscription {
    rx: broadcast::Receiver<TransportMessage>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<TransportMessage, TransportError> {
        self.rx
            .recv()
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }

    async fn unsubscribe(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish_with_headers(
        &self,
        subject: &str,
        payload: Bytes,
        headers: Headers,
    ) -> Result<(), TransportError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(TransportError::PublishFailed(
                "transport unavailable".to_string(),
            ));
        }

        let msg =
            TransportMessage::received(subject, payload, headers, Some(self.next_sequence()));
        for entry in self.channels.iter() {
            if subject_matches(entry.key(), subject) {
                // no receivers is not an error for fire-and-forget
                let _ = entry.value().send(msg.clone());
            }
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let tx = self.get_or_create_channel(subject);
        let rx = tx.subscribe();
        Ok(Box::new(InMemorySubscription { rx }))
    }
}
