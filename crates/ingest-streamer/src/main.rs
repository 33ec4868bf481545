//! ingest-streamer: Upbit market data ingest binary
//!
//! Streams ticker, trade and orderbook data from Upbit, normalizes it and
//! publishes canonical JSON messages to the configured transport.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ingest_connector_lib::{
    upbit::UPBIT_WS_URL, ConnectorMetrics, CounterKind, IngestPipeline, MarketDataPublisher,
    RateCounters, ServerState, UpbitNormalizer, UpbitSupervisor, WebSocketTransport,
};
use ingest_metadata::{Environment, Feed};
use ingest_middleware::MiddlewareFactory;

#[derive(Parser, Debug)]
#[command(name = "ingest-streamer")]
#[command(about = "Upbit market data streamer")]
struct Args {
    /// Path to feed configuration file
    #[arg(short, long, env = "INGEST_FEED")]
    feed: PathBuf,

    /// Path to environment configuration file
    #[arg(short, long, env = "INGEST_ENV")]
    env: PathBuf,

    /// HTTP server bind address (health, readiness, metrics)
    #[arg(long, env = "INGEST_HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    health_addr: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "INGEST_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Load feed configuration
    let feed = Feed::load(&args.feed)?;
    info!(feed = %feed.name, data_types = ?feed.data_types, "Loaded feed configuration");

    // Load environment configuration
    let env_config = Environment::load(&args.env)?;
    info!(env = %env_config.name, "Loaded environment configuration");

    let health_addr: SocketAddr = args.health_addr.parse()?;

    let tiers = env_config.enabled_tiers();
    let markets = feed.market_codes(&tiers);
    if markets.defaulted {
        warn!(
            tiers = ?tiers,
            codes = ?markets.codes,
            "No market codes configured for enabled tiers, using defaults"
        );
    }
    info!(tiers = ?tiers, markets = markets.codes.len(), "Resolved market codes");

    let transport = MiddlewareFactory::create_transport(&env_config).await?;
    info!(
        transport = ?env_config.transport.transport_type,
        exchange = %env_config.transport.exchange,
        "Transport ready"
    );

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    let throughput = Arc::new(RateCounters::new(CounterKind::Throughput));
    let failures = Arc::new(RateCounters::new(CounterKind::Failures));
    let metrics = ConnectorMetrics::new(&feed.name)?;

    let publisher = MarketDataPublisher::new(
        transport,
        env_config.transport.exchange.clone(),
        Arc::clone(&failures),
    );
    let pipeline = Arc::new(
        IngestPipeline::new(
            feed.data_types,
            UpbitNormalizer::new(feed.name.clone()),
            publisher,
            Arc::clone(&throughput),
        )
        .with_metrics(metrics.clone()),
    );

    let endpoint = feed.endpoint.clone().unwrap_or_else(|| UPBIT_WS_URL.to_string());
    let supervisor = UpbitSupervisor::new(
        endpoint,
        markets.codes,
        Arc::new(WebSocketTransport::default()),
        pipeline,
    )
    .with_metrics(metrics.clone());

    tokio::spawn(Arc::clone(&throughput).run_flusher(shutdown_rx.clone()));
    tokio::spawn(Arc::clone(&failures).run_flusher(shutdown_rx.clone()));

    let server_state = ServerState::new(
        &feed.name,
        supervisor.state(),
        metrics,
        throughput,
        failures,
    );
    let server_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            ingest_connector_lib::run_server(health_addr, server_state, server_shutdown).await
        {
            error!(error = %e, "HTTP server error");
        }
    });
    info!(addr = %health_addr, "HTTP server started");

    match supervisor.run(shutdown_rx).await {
        Ok(()) => {
            info!("Streamer stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Streamer stopped with error");
            Err(e.into())
        }
    }
}
