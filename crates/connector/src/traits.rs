use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FeedError;

/// Opens streaming sessions to an upstream feed (WebSocket, test doubles, etc.)
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Establish a new session to the endpoint
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FeedSession>, FeedError>;
}

/// A live duplex connection.
///
/// `recv` must be cancel-safe: the supervisor races it against the keepalive
/// timer and the shutdown signal.
#[async_trait]
pub trait FeedSession: Send {
    /// Send a text frame
    async fn send_text(&mut self, text: String) -> Result<(), FeedError>;

    /// Next data frame. `Ok(None)` means the peer closed the session.
    async fn recv(&mut self) -> Result<Option<Bytes>, FeedError>;

    /// Transport-level ping
    async fn ping(&mut self, payload: Vec<u8>) -> Result<(), FeedError>;

    /// Close the session
    async fn close(&mut self) -> Result<(), FeedError>;
}
