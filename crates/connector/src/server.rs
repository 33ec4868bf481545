use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::metrics::ConnectorMetrics;
use crate::throughput::{CounterSnapshot, DataTypeCounts, RateCounters};
use crate::upbit::ConnectionState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub feed: String,
    pub state: ConnectionState,
}

/// Failure view: the last window and the lifetime count
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSnapshot {
    pub last_second: DataTypeCounts,
    pub cumulative: DataTypeCounts,
}

impl From<CounterSnapshot> for FailureSnapshot {
    fn from(snapshot: CounterSnapshot) -> Self {
        Self {
            last_second: snapshot.last_second,
            cumulative: snapshot.cumulative,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub throughput: CounterSnapshot,
    pub failures: FailureSnapshot,
}

/// Shared state for the HTTP endpoints
#[derive(Clone)]
pub struct ServerState {
    pub feed_name: String,
    pub connection: watch::Receiver<ConnectionState>,
    pub metrics: ConnectorMetrics,
    pub throughput: Arc<RateCounters>,
    pub failures: Arc<RateCounters>,
}

impl ServerState {
    pub fn new(
        feed_name: impl Into<String>,
        connection: watch::Receiver<ConnectionState>,
        metrics: ConnectorMetrics,
        throughput: Arc<RateCounters>,
        failures: Arc<RateCounters>,
    ) -> Self {
        Self {
            feed_name: feed_name.into(),
            connection,
            metrics,
            throughput,
            failures,
        }
    }

    fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        feed: state.feed_name.clone(),
        state: state.connection_state(),
    })
}

/// Ready endpoint - returns 200 only while data is streaming
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let current = state.connection_state();
    let streaming = current == ConnectionState::Streaming;
    let status_code = if streaming {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if streaming { "ready" } else { "not_ready" }.to_string(),
            feed: state.feed_name.clone(),
            state: current,
        }),
    )
}

/// Prometheus text exposition
async fn metrics(State(state): State<ServerState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn throughput(State(state): State<ServerState>) -> Json<CounterSnapshot> {
    Json(state.throughput.snapshot())
}

async fn failures(State(state): State<ServerState>) -> Json<FailureSnapshot> {
    Json(state.failures.snapshot().into())
}

async fn summary(State(state): State<ServerState>) -> Json<SummaryResponse> {
    Json(SummaryResponse {
        throughput: state.throughput.snapshot(),
        failures: state.failures.snapshot().into(),
    })
}

/// Create the HTTP router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/api/metrics/throughput", get(throughput))
        .route("/api/metrics/failures", get(failures))
        .route("/api/metrics/summary", get(summary))
        .with_state(state)
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run_server(
    addr: SocketAddr,
    state: ServerState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::DataType;
    use crate::throughput::CounterKind;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct TestState {
        state: ServerState,
        connection_tx: watch::Sender<ConnectionState>,
    }

    fn create_test_state(connection: ConnectionState) -> TestState {
        let (connection_tx, connection_rx) = watch::channel(connection);
        TestState {
            state: ServerState::new(
                "test-feed",
                connection_rx,
                ConnectorMetrics::new("test-feed").unwrap(),
                Arc::new(RateCounters::new(CounterKind::Throughput)),
                Arc::new(RateCounters::new(CounterKind::Failures)),
            ),
            connection_tx,
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let test = create_test_state(ConnectionState::Connecting);
        let (status, json) = get_json(create_router(test.state), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "connecting");
        assert_eq!(json["feed"], "test-feed");
    }

    #[tokio::test]
    async fn test_ready_when_streaming() {
        let test = create_test_state(ConnectionState::Streaming);
        let (status, json) = get_json(create_router(test.state), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ready");
    }

    #[tokio::test]
    async fn test_ready_when_subscribed_but_idle() {
        let test = create_test_state(ConnectionState::Subscribed);
        let (status, _) = get_json(create_router(test.state), "/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ready_follows_state_changes() {
        let test = create_test_state(ConnectionState::Streaming);
        let app = create_router(test.state.clone());
        test.connection_tx.send(ConnectionState::Disconnected).unwrap();

        let (status, json) = get_json(app, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["state"], "disconnected");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let test = create_test_state(ConnectionState::Streaming);
        test.state.metrics.set_connected();
        let app = create_router(test.state);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("ingest_websocket_connected"));
    }

    #[tokio::test]
    async fn test_throughput_endpoint() {
        let test = create_test_state(ConnectionState::Streaming);
        test.state.throughput.record(DataType::Ticker);
        test.state.throughput.record(DataType::Ticker);
        test.state.throughput.flush();
        test.state.throughput.record(DataType::Trade);

        let (status, json) =
            get_json(create_router(test.state), "/api/metrics/throughput").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["lastSecond"]["ticker"], 2);
        assert_eq!(json["cumulative"]["total"], 3);
        assert!(json.get("average").is_some());
        assert!(json.get("elapsedSeconds").is_some());
    }

    #[tokio::test]
    async fn test_failures_endpoint() {
        let test = create_test_state(ConnectionState::Streaming);
        test.state.failures.record(DataType::OrderBook);

        let (status, json) = get_json(create_router(test.state), "/api/metrics/failures").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cumulative"]["orderbook"], 1);
        assert_eq!(json["lastSecond"]["total"], 0);
        assert!(json.get("average").is_none());
    }

    #[tokio::test]
    async fn test_summary_endpoint() {
        let test = create_test_state(ConnectionState::Streaming);
        test.state.throughput.record(DataType::Trade);
        test.state.failures.record(DataType::Ticker);

        let (status, json) = get_json(create_router(test.state), "/api/metrics/summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["throughput"]["cumulative"]["trade"], 1);
        assert_eq!(json["failures"]["cumulative"]["ticker"], 1);
    }
}
