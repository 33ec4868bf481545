//! Publishes canonical messages to the bus under `{exchange}.{routing_key}`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use ingest_middleware::{SubjectBuilder, Transport};
use tracing::{debug, error};

use crate::error::PublishError;
use crate::message::CanonicalMessage;
use crate::throughput::RateCounters;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const MESSAGE_ID_HEADER: &str = "Message-Id";

/// Routing key: `{source}.{type}` lowercased, then the market code verbatim.
pub fn routing_key(message: &CanonicalMessage) -> String {
    format!(
        "{}.{}.{}",
        message.metadata.source_name.to_lowercase(),
        message.metadata.data_type.as_str(),
        message.payload.market_code()
    )
}

pub struct MarketDataPublisher {
    transport: Arc<dyn Transport>,
    subjects: SubjectBuilder,
    failures: Arc<RateCounters>,
}

impl MarketDataPublisher {
    pub fn new(
        transport: Arc<dyn Transport>,
        exchange: impl Into<String>,
        failures: Arc<RateCounters>,
    ) -> Self {
        Self {
            transport,
            subjects: SubjectBuilder::new(exchange),
            failures,
        }
    }

    pub fn exchange(&self) -> &str {
        self.subjects.exchange()
    }

    /// Serialize and send one message. Failures are counted against the
    /// message's data type; a type/payload mismatch is reported but not counted.
    pub async fn publish(&self, message: &CanonicalMessage) -> Result<(), PublishError> {
        let declared = message.metadata.data_type;
        let actual = message.payload.data_type();
        if declared != actual {
            error!(
                message_id = %message.metadata.message_id,
                declared = %declared,
                actual = %actual,
                "Metadata data type does not match payload"
            );
            return Err(PublishError::PayloadMismatch { declared, actual });
        }

        let routing_key = routing_key(message);
        let result = self.send(&routing_key, message).await;

        match &result {
            Ok(()) => debug!(
                routing_key = %routing_key,
                message_id = %message.metadata.message_id,
                "Published message"
            ),
            Err(e) => {
                self.failures.record(declared);
                error!(
                    error = %e,
                    routing_key = %routing_key,
                    message_id = %message.metadata.message_id,
                    data_type = %declared,
                    "Failed to publish message"
                );
            }
        }
        result
    }

    async fn send(&self, routing_key: &str, message: &CanonicalMessage) -> Result<(), PublishError> {
        let body = serde_json::to_vec(message)?;

        let mut headers = HashMap::with_capacity(2);
        headers.insert(CONTENT_TYPE_HEADER.to_string(), "application/json".to_string());
        headers.insert(
            MESSAGE_ID_HEADER.to_string(),
            message.metadata.message_id.clone(),
        );

        let subject = self.subjects.subject(routing_key);
        self.transport
            .publish_with_headers(&subject, Bytes::from(body), headers)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{
        DataType, Metadata, OrderBookPayload, OrderBookUnit, Payload, TickerPayload,
    };
    use crate::throughput::CounterKind;
    use ingest_middleware::InMemoryTransport;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn ticker_message(code: &str) -> CanonicalMessage {
        CanonicalMessage {
            metadata: Metadata::new("UPBIT", DataType::Ticker),
            payload: Payload::Ticker(TickerPayload {
                market_code: code.to_string(),
                trade_price: Decimal::from_str("70000000.12345678").unwrap(),
                trade_volume: Some(Decimal::ZERO),
                opening_price: None,
                high_price: None,
                low_price: None,
                prev_closing_price: None,
                acc_trade_price_24h: None,
                acc_trade_volume_24h: None,
                timestamp: 1700000000000,
            }),
        }
    }

    fn orderbook_message(code: &str) -> CanonicalMessage {
        CanonicalMessage {
            metadata: Metadata::new("UPBIT", DataType::OrderBook),
            payload: Payload::OrderBook(OrderBookPayload {
                market_code: code.to_string(),
                timestamp: 1700000000000,
                total_ask_size: None,
                total_bid_size: None,
                orderbook_units: vec![OrderBookUnit {
                    ask_price: Decimal::from(70001000),
                    ask_size: Decimal::from_str("0.5").unwrap(),
                    bid_price: Decimal::from(70000000),
                    bid_size: Decimal::from_str("1.25").unwrap(),
                }],
            }),
        }
    }

    fn publisher(transport: Arc<InMemoryTransport>) -> (MarketDataPublisher, Arc<RateCounters>) {
        let failures = Arc::new(RateCounters::new(CounterKind::Failures));
        (
            MarketDataPublisher::new(transport, "market.data", Arc::clone(&failures)),
            failures,
        )
    }

    #[test]
    fn test_routing_keys() {
        assert_eq!(routing_key(&ticker_message("KRW-BTC")), "upbit.ticker.KRW-BTC");
        assert_eq!(
            routing_key(&orderbook_message("KRW-BTC")),
            "upbit.orderbook.KRW-BTC"
        );
    }

    #[tokio::test]
    async fn test_publish_sends_json_to_subject() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut sub = transport.subscribe("market.data.>").await.unwrap();
        let (publisher, failures) = publisher(Arc::clone(&transport));

        let message = ticker_message("KRW-BTC");
        publisher.publish(&message).await.unwrap();

        let received = sub.next().await.unwrap();
        assert_eq!(received.subject, "market.data.upbit.ticker.KRW-BTC");
        assert_eq!(received.headers[CONTENT_TYPE_HEADER], "application/json");
        assert_eq!(received.headers[MESSAGE_ID_HEADER], message.metadata.message_id);

        let json: serde_json::Value = serde_json::from_slice(&received.payload).unwrap();
        assert_eq!(json["payload"]["tradePrice"], "70000000.12345678");
        assert_eq!(json["metadata"]["dataType"], "TICKER");
        assert_eq!(failures.cumulative().total, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_counts_against_data_type() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.set_unavailable(true);
        let (publisher, failures) = publisher(Arc::clone(&transport));

        let result = publisher.publish(&orderbook_message("KRW-ETH")).await;

        assert!(matches!(result, Err(PublishError::Transport(_))));
        assert_eq!(failures.cumulative().orderbook, 1);
        assert_eq!(failures.cumulative().total, 1);
    }

    #[tokio::test]
    async fn test_payload_mismatch_is_not_counted() {
        let transport = Arc::new(InMemoryTransport::new());
        let (publisher, failures) = publisher(Arc::clone(&transport));

        let mut message = ticker_message("KRW-BTC");
        message.metadata.data_type = DataType::Trade;
        let result = publisher.publish(&message).await;

        assert!(matches!(
            result,
            Err(PublishError::PayloadMismatch {
                declared: DataType::Trade,
                actual: DataType::Ticker
            })
        ));
        assert_eq!(failures.cumulative().total, 0);
        assert_eq!(transport.published_count(), 0);
    }
}
