use std::sync::Arc;

use ingest_metadata::{Environment, TransportType};
use tracing::info;

use crate::error::TransportError;
use crate::memory::InMemoryTransport;
use crate::nats::{NatsTransport, SubjectBuilder};
use crate::transport::Transport;

/// Factory for creating middleware instances based on environment config
pub struct MiddlewareFactory;

impl MiddlewareFactory {
    /// Create a transport based on environment configuration.
    /// For NATS with a configured stream, the stream is created for `{exchange}.>`.
    pub async fn create_transport(env: &Environment) -> Result<Arc<dyn Transport>, TransportError> {
        match env.transport.transport_type {
            TransportType::Memory => Ok(Arc::new(InMemoryTransport::new())),
            TransportType::Nats => {
                let url = env.transport.url.as_deref().ok_or_else(|| {
                    TransportError::ConnectionFailed("transport.url not set".to_string())
                })?;
                let transport = NatsTransport::connect(url).await?;
                info!(url = %url, "Connected to NATS");

                if let Some(stream) = &env.transport.stream {
                    let subjects = SubjectBuilder::new(env.transport.exchange.clone());
                    transport
                        .ensure_stream(stream, vec![subjects.all().to_string()])
                        .await?;
                    info!(stream = %stream, subjects = %subjects.all(), "JetStream stream ready");
                }
                Ok(Arc::new(transport))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_metadata::TransportConfig;

    fn make_test_env(transport_type: TransportType, url: Option<&str>) -> Environment {
        Environment {
            name: "test".to_string(),
            tiers: vec![],
            transport: TransportConfig {
                transport_type,
                url: url.map(|u| u.to_string()),
                exchange: "market.data".to_string(),
                stream: None,
            },
        }
    }

    #[tokio::test]
    async fn test_create_memory_transport() {
        let env = make_test_env(TransportType::Memory, None);
        let transport = MiddlewareFactory::create_transport(&env).await.unwrap();
        transport
            .publish("market.data.upbit.ticker.KRW-BTC", bytes::Bytes::from("{}"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_nats_without_url_fails() {
        let env = make_test_env(TransportType::Nats, None);
        let result = MiddlewareFactory::create_transport(&env).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
