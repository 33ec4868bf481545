//! Bus seam shared by the NATS and in-memory backends.
//!
//! Subjects are dot-separated tokens. Subscriptions accept `*` for a single
//! token and a trailing `>` for the remainder.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use crate::error::TransportError;

/// Message headers, one value per name
pub type Headers = HashMap<String, String>;

/// A message as seen by a subscriber
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub subject: String,
    pub payload: Bytes,
    pub headers: Headers,
    /// Receive time, epoch milliseconds
    pub timestamp: i64,
    /// Bus-assigned order, when the backend has one
    pub sequence: Option<u64>,
}

impl TransportMessage {
    /// Stamp a delivered message with the current wall clock.
    pub fn received(
        subject: impl Into<String>,
        payload: Bytes,
        headers: Headers,
        sequence: Option<u64>,
    ) -> Self {
        Self {
            subject: subject.into(),
            payload,
            headers,
            timestamp: chrono::Utc::now().timestamp_millis(),
            sequence,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[async_trait]
pub trait Subscription: Send + Sync {
    /// Wait for the next matching message
    async fn next(&mut self) -> Result<TransportMessage, TransportError>;

    async fn unsubscribe(self: Box<Self>) -> Result<(), TransportError>;
}

/// Where canonical market data goes. Publishing is fire-and-forget.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish_with_headers(
        &self,
        subject: &str,
        payload: Bytes,
        headers: Headers,
    ) -> Result<(), TransportError>;

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.publish_with_headers(subject, payload, Headers::new())
            .await
    }

    /// Subscribe to a subject pattern
    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_message_headers() {
        let mut headers = Headers::new();
        headers.insert("dataType".to_string(), "TRADE".to_string());
        let before = chrono::Utc::now().timestamp_millis();

        let msg = TransportMessage::received(
            "market.data.upbit.trade.KRW-BTC",
            Bytes::from(r#"{"tradePrice":"100"}"#),
            headers,
            Some(1),
        );

        assert_eq!(msg.subject, "market.data.upbit.trade.KRW-BTC");
        assert_eq!(msg.header("dataType"), Some("TRADE"));
        assert_eq!(msg.header("sourceName"), None);
        assert_eq!(msg.sequence, Some(1));
        assert!(msg.timestamp >= before);
    }
}
