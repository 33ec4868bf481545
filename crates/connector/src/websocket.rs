//! WebSocket implementation of the feed transport traits.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, trace, warn};
use url::Url;

use crate::error::FeedError;
use crate::traits::{FeedSession, FeedTransport};

/// Connects over `tokio-tungstenite` with connect and read timeouts.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl WebSocketTransport {
    /// Connect timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Read timeout in seconds (keepalive interval plus slack)
    pub const READ_TIMEOUT_SECS: u64 = 70;

    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(Self::CONNECT_TIMEOUT_SECS),
            Duration::from_secs(Self::READ_TIMEOUT_SECS),
        )
    }
}

#[async_trait]
impl FeedTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FeedSession>, FeedError> {
        let url = Url::parse(endpoint).map_err(|e| FeedError::Connection(e.to_string()))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(FeedError::Connection(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        info!(url = %endpoint, "Connecting to WebSocket");
        let (ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| FeedError::ConnectTimeout(self.connect_timeout.as_secs()))??;
        info!(status = ?response.status(), "WebSocket connected");

        Ok(Box::new(WebSocketSession {
            ws,
            read_timeout: self.read_timeout,
        }))
    }
}

struct WebSocketSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    read_timeout: Duration,
}

#[async_trait]
impl FeedSession for WebSocketSession {
    async fn send_text(&mut self, text: String) -> Result<(), FeedError> {
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, FeedError> {
        loop {
            let recv_result = tokio::time::timeout(self.read_timeout, self.ws.next()).await;

            match recv_result {
                Err(_) => {
                    warn!(
                        timeout_secs = self.read_timeout.as_secs(),
                        "WebSocket read timeout"
                    );
                    return Err(FeedError::ReadTimeout(self.read_timeout.as_secs()));
                }
                Ok(Some(Ok(Message::Text(text)))) => return Ok(Some(Bytes::from(text))),
                // Upbit delivers data as binary frames carrying UTF-8 JSON
                Ok(Some(Ok(Message::Binary(data)))) => return Ok(Some(Bytes::from(data))),
                Ok(Some(Ok(Message::Ping(data)))) => {
                    trace!("Received WS ping, sending pong");
                    self.ws.send(Message::Pong(data)).await?;
                }
                Ok(Some(Ok(Message::Pong(_)))) => {
                    trace!("Received WS pong");
                }
                Ok(Some(Ok(Message::Close(frame)))) => {
                    info!(frame = ?frame, "WebSocket closed by peer");
                    return Ok(None);
                }
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) => return Ok(None),
            }
        }
    }

    async fn ping(&mut self, payload: Vec<u8>) -> Result<(), FeedError> {
        self.ws.send(Message::Ping(payload)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
