//! Integration tests for NATS transport
//!
//! Run with: cargo test -p ingest-middleware --test nats_integration -- --ignored
//! Requires: docker run -p 4222:4222 nats:latest -js

use bytes::Bytes;
use ingest_middleware::{NatsTransport, SubjectBuilder, Transport};

#[tokio::test]
#[ignore]
async fn test_nats_publish_subscribe_roundtrip() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    let subjects = SubjectBuilder::new("test.market");

    let mut sub = transport
        .subscribe(subjects.all())
        .await
        .expect("Failed to subscribe");

    transport
        .publish(
            &subjects.subject("upbit.ticker.KRW-BTC"),
            Bytes::from("test message"),
        )
        .await
        .expect("Failed to publish");

    let msg = sub.next().await.expect("Failed to receive");
    assert_eq!(msg.subject, "test.market.upbit.ticker.KRW-BTC");
    assert_eq!(msg.payload, Bytes::from("test message"));
}

#[tokio::test]
#[ignore]
async fn test_jetstream_stream_creation() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    let subjects = SubjectBuilder::new("test.market");

    transport
        .ensure_stream("TEST_MARKET", vec![subjects.all().to_string()])
        .await
        .expect("Failed to create stream");
}
