use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MetadataError;

/// Tier used when an environment lists none.
pub const DEFAULT_TIER: &str = "tier1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Nats,
    Memory,
}

fn default_exchange() -> String {
    "market.data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    pub url: Option<String>,
    /// Topic every message is published under; routing keys are appended to it
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// NATS JetStream stream name (e.g., "MARKET_DATA"); created on startup when set
    pub stream: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub tiers: Vec<String>,
    pub transport: TransportConfig,
}

impl Environment {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        let env: Environment = serde_yaml::from_str(&content)?;
        env.validate()?;
        Ok(env)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.transport.exchange.trim().is_empty() {
            return Err(MetadataError::Validation(
                "transport.exchange is blank".to_string(),
            ));
        }
        if self.transport.transport_type == TransportType::Nats && self.transport.url.is_none() {
            return Err(MetadataError::Validation(
                "transport.url is required for nats".to_string(),
            ));
        }
        Ok(())
    }

    /// Tiers enabled for this environment, falling back to [`DEFAULT_TIER`].
    pub fn enabled_tiers(&self) -> Vec<String> {
        if self.tiers.is_empty() {
            vec![DEFAULT_TIER.to_string()]
        } else {
            self.tiers.clone()
        }
    }
}
