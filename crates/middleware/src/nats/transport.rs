use std::time::Duration;

use async_nats::jetstream::stream::{Config, RetentionPolicy, StorageType};
use async_nats::jetstream::{self, Context};
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::error::TransportError;
use crate::transport::{Headers, Subscription, Transport, TransportMessage};

/// How long the market data stream keeps messages
pub const MARKET_DATA_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// File-backed, limits-retained stream over `subjects`
pub fn market_data_stream(name: &str, subjects: Vec<String>) -> Config {
    Config {
        name: name.to_string(),
        subjects,
        retention: RetentionPolicy::Limits,
        storage: StorageType::File,
        max_age: MARKET_DATA_RETENTION,
        ..Default::default()
    }
}

fn to_nats_headers(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(name.as_str(), value.as_str());
    }
    map
}

/// Keeps the first value of repeated names
fn from_nats_headers(map: Option<&HeaderMap>) -> Headers {
    let Some(map) = map else {
        return Headers::new();
    };
    map.iter()
        .filter_map(|(name, values)| {
            values
                .first()
                .map(|value| (name.to_string(), value.as_str().to_string()))
        })
        .collect()
}

struct NatsSubscription {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Result<TransportMessage, TransportError> {
        let Some(msg) = self.subscriber.next().await else {
            return Err(TransportError::SubscribeFailed(
                "subscription closed".to_string(),
            ));
        };
        let headers = from_nats_headers(msg.headers.as_ref());
        Ok(TransportMessage::received(
            msg.subject.as_str(),
            msg.payload,
            headers,
            None,
        ))
    }

    async fn unsubscribe(mut self: Box<Self>) -> Result<(), TransportError> {
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }
}

/// Core NATS publisher with a JetStream handle for stream setup
pub struct NatsTransport {
    client: Client,
    jetstream: Context,
}

impl NatsTransport {
    pub fn new(client: Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self { client, jetstream }
    }

    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        async_nats::connect(url)
            .await
            .map(Self::new)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))
    }

    /// Create the market data stream if it does not exist yet
    pub async fn ensure_stream(
        &self,
        stream_name: &str,
        subjects: Vec<String>,
    ) -> Result<(), TransportError> {
        self.jetstream
            .get_or_create_stream(market_data_stream(stream_name, subjects))
            .await
            .map(|_| ())
            .map_err(|e| TransportError::StreamFailed(e.to_string()))
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn publish_with_headers(
        &self,
        subject: &str,
        payload: Bytes,
        headers: Headers,
    ) -> Result<(), TransportError> {
        let result = if headers.is_empty() {
            self.client.publish(subject.to_string(), payload).await
        } else {
            self.client
                .publish_with_headers(subject.to_string(), to_nats_headers(&headers), payload)
                .await
        };
        result.map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError> {
        self.client
            .subscribe(subject.to_string())
            .await
            .map(|subscriber| Box::new(NatsSubscription { subscriber }) as Box<dyn Subscription>)
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_data_stream_config() {
        let config = market_data_stream("MARKET_DATA", vec!["market.data.>".to_string()]);
        assert_eq!(config.name, "MARKET_DATA");
        assert_eq!(config.subjects, vec!["market.data.>".to_string()]);
        assert_eq!(config.storage, StorageType::File);
        assert_eq!(config.max_age, MARKET_DATA_RETENTION);
    }

    #[test]
    fn test_header_conversion_keeps_values() {
        let mut headers = Headers::new();
        headers.insert("sourceName".to_string(), "UPBIT".to_string());
        headers.insert("dataType".to_string(), "ORDERBOOK".to_string());

        let back = from_nats_headers(Some(&to_nats_headers(&headers)));
        assert_eq!(back, headers);
        assert!(from_nats_headers(None).is_empty());
    }

    // Needs a local server: docker run -p 4222:4222 nats:latest -js
    #[tokio::test]
    #[ignore]
    async fn test_publish_succeeds() {
        let transport = NatsTransport::connect("nats://localhost:4222").await.unwrap();
        let result = transport
            .publish("market.data.upbit.ticker.KRW-BTC", Bytes::from("{}"))
            .await;
        assert!(result.is_ok());
    }
}
