//! Upstream frames through to bus payloads, all three data types.

use std::sync::Arc;

use ingest_connector_lib::{
    CounterKind, IngestPipeline, MarketDataPublisher, Outcome, RateCounters, UpbitNormalizer,
};
use ingest_connector_lib::message::DataType;
use ingest_metadata::DataTypeToggles;
use ingest_middleware::{InMemoryTransport, Transport};

const TICKER: &[u8] = br#"{"ty":"ticker","cd":"KRW-BTC","op":69000000,"hp":71000000,"lp":68500000,"tp":70000000.5,"pcp":69500000,"tv":0.00012345,"atp24h":123456789012.12345678,"atv24h":1763.1,"tms":1700000000000,"st":"REALTIME"}"#;
const TRADE: &[u8] = br#"{"ty":"trade","cd":"KRW-ETH","tms":1700000000100,"td":"2023-11-14","ttm":"22:13:20","ttms":1700000000000,"tp":3000000,"tv":0.5,"ab":"BID","pcp":2990000,"c":"RISE","cp":10000,"sid":17000000000000000,"bap":3000100,"bas":1.2,"bbp":2999900,"bbs":0.8,"st":"SNAPSHOT"}"#;
const ORDERBOOK: &[u8] = br#"{"ty":"orderbook","cd":"KRW-XRP","tms":1700000000200,"tas":12345.6,"tbs":6543.2,"obu":[{"ap":850,"as":100.5,"bp":849,"bs":200},{"ap":851,"as":50,"bp":848,"bs":10.25}]}"#;

#[tokio::test]
async fn test_all_data_types_reach_the_bus() {
    let bus = Arc::new(InMemoryTransport::new());
    let mut sub = bus.subscribe("market.data.upbit.*.*").await.unwrap();
    let throughput = Arc::new(RateCounters::new(CounterKind::Throughput));
    let failures = Arc::new(RateCounters::new(CounterKind::Failures));

    let pipeline = IngestPipeline::new(
        DataTypeToggles {
            ticker: true,
            trade: true,
            orderbook: true,
        },
        UpbitNormalizer::default(),
        MarketDataPublisher::new(
            Arc::clone(&bus) as Arc<dyn Transport>,
            "market.data",
            Arc::clone(&failures),
        ),
        Arc::clone(&throughput),
    );

    assert_eq!(
        pipeline.process(TICKER).await.unwrap(),
        Outcome::Published(DataType::Ticker)
    );
    assert_eq!(
        pipeline.process(TRADE).await.unwrap(),
        Outcome::Published(DataType::Trade)
    );
    assert_eq!(
        pipeline.process(ORDERBOOK).await.unwrap(),
        Outcome::Published(DataType::OrderBook)
    );

    let ticker = sub.next().await.unwrap();
    assert_eq!(ticker.subject, "market.data.upbit.ticker.KRW-BTC");
    let json: serde_json::Value = serde_json::from_slice(&ticker.payload).unwrap();
    assert_eq!(json["metadata"]["sourceName"], "UPBIT");
    assert_eq!(json["metadata"]["dataType"], "TICKER");
    assert_eq!(json["metadata"]["schemaVersion"], "1.0");
    assert_eq!(json["payload"]["tradeVolume"], "0.00012345");
    assert_eq!(json["payload"]["accTradePrice24h"], "123456789012.12345678");

    let trade = sub.next().await.unwrap();
    assert_eq!(trade.subject, "market.data.upbit.trade.KRW-ETH");
    let json: serde_json::Value = serde_json::from_slice(&trade.payload).unwrap();
    assert_eq!(json["payload"]["askBid"], "BID");
    assert_eq!(json["payload"]["sequentialId"], 17000000000000000_i64);
    assert_eq!(json["payload"]["tradeDate"], "2023-11-14");

    let orderbook = sub.next().await.unwrap();
    assert_eq!(orderbook.subject, "market.data.upbit.orderbook.KRW-XRP");
    let json: serde_json::Value = serde_json::from_slice(&orderbook.payload).unwrap();
    let units = json["payload"]["orderbookUnits"].as_array().unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0]["askSize"], "100.5");
    assert_eq!(units[1]["bidSize"], "10.25");

    let cumulative = throughput.cumulative();
    assert_eq!(cumulative.total, 3);
    assert_eq!(cumulative.ticker, 1);
    assert_eq!(cumulative.trade, 1);
    assert_eq!(cumulative.orderbook, 1);
    assert_eq!(failures.cumulative().total, 0);
}
