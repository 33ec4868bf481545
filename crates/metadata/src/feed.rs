use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::MetadataError;

/// Markets streamed when no configured tier yields any code.
pub const DEFAULT_MARKET_CODES: [&str; 3] = ["KRW-BTC", "KRW-ETH", "KRW-XRP"];

fn default_true() -> bool {
    true
}

/// Which upstream channels are subscribed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataTypeToggles {
    #[serde(default = "default_true")]
    pub ticker: bool,
    #[serde(default)]
    pub trade: bool,
    #[serde(default)]
    pub orderbook: bool,
}

impl Default for DataTypeToggles {
    fn default() -> Self {
        Self {
            ticker: true,
            trade: false,
            orderbook: false,
        }
    }
}

impl DataTypeToggles {
    pub fn enabled_count(&self) -> usize {
        [self.ticker, self.trade, self.orderbook]
            .iter()
            .filter(|enabled| **enabled)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// Source name stamped on every outbound message (e.g. "UPBIT")
    pub name: String,
    pub display_name: Option<String>,
    /// Overrides the built-in WebSocket endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub data_types: DataTypeToggles,
    /// Tier name -> market codes
    #[serde(default)]
    pub markets: HashMap<String, Vec<String>>,
}

/// Result of resolving tiers into market codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCodes {
    pub codes: Vec<String>,
    /// True when no tier produced a code and [`DEFAULT_MARKET_CODES`] was used
    pub defaulted: bool,
}

impl Feed {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        let feed: Feed = serde_yaml::from_str(&content)?;
        feed.validate()?;
        Ok(feed)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.name.trim().is_empty() {
            return Err(MetadataError::Validation("feed name is blank".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
                return Err(MetadataError::Validation(format!(
                    "endpoint must be a ws:// or wss:// URL, got {}",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// Concatenate the codes of each tier in order. Unknown tiers contribute nothing.
    pub fn market_codes(&self, tiers: &[String]) -> MarketCodes {
        let codes: Vec<String> = tiers
            .iter()
            .filter_map(|tier| self.markets.get(tier))
            .flatten()
            .filter(|code| !code.trim().is_empty())
            .cloned()
            .collect();

        if codes.is_empty() {
            MarketCodes {
                codes: DEFAULT_MARKET_CODES.iter().map(|c| c.to_string()).collect(),
                defaulted: true,
            }
        } else {
            MarketCodes {
                codes,
                defaulted: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn feed_with_tiers() -> Feed {
        let mut markets = HashMap::new();
        markets.insert(
            "tier1".to_string(),
            vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()],
        );
        markets.insert("tier2".to_string(), vec!["KRW-SOL".to_string()]);
        Feed {
            name: "UPBIT".to_string(),
            display_name: None,
            endpoint: None,
            data_types: DataTypeToggles::default(),
            markets,
        }
    }

    #[test]
    fn test_load_feed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
name: UPBIT
display_name: Upbit Exchange
endpoint: wss://api.upbit.com/websocket/v1
data_types:
  ticker: true
  trade: true
markets:
  tier1:
    - KRW-BTC
    - KRW-ETH
  tier2:
    - KRW-SOL
"#
        )
        .unwrap();

        let feed = Feed::load(file.path()).unwrap();
        assert_eq!(feed.name, "UPBIT");
        assert!(feed.data_types.ticker);
        assert!(feed.data_types.trade);
        assert!(!feed.data_types.orderbook);
        assert_eq!(feed.markets["tier1"], vec!["KRW-BTC", "KRW-ETH"]);
    }

    #[test]
    fn test_data_type_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: UPBIT").unwrap();

        let feed = Feed::load(file.path()).unwrap();
        assert_eq!(feed.data_types, DataTypeToggles::default());
        assert_eq!(feed.data_types.enabled_count(), 1);
        assert!(feed.endpoint.is_none());
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: \"  \"").unwrap();

        let err = Feed::load(file.path()).unwrap_err();
        assert!(matches!(err, MetadataError::Validation(_)));
    }

    #[test]
    fn test_non_websocket_endpoint_rejected() {
        let mut feed = feed_with_tiers();
        feed.endpoint = Some("https://api.upbit.com".to_string());
        assert!(feed.validate().is_err());
    }

    #[test]
    fn test_market_codes_concatenates_tiers_in_order() {
        let feed = feed_with_tiers();
        let resolved = feed.market_codes(&["tier2".to_string(), "tier1".to_string()]);
        assert_eq!(resolved.codes, vec!["KRW-SOL", "KRW-BTC", "KRW-ETH"]);
        assert!(!resolved.defaulted);
    }

    #[test]
    fn test_market_codes_falls_back_to_defaults() {
        let feed = feed_with_tiers();
        let resolved = feed.market_codes(&["tier9".to_string()]);
        assert_eq!(resolved.codes, vec!["KRW-BTC", "KRW-ETH", "KRW-XRP"]);
        assert!(resolved.defaulted);
    }

    #[test]
    fn test_enabled_count() {
        let toggles = DataTypeToggles {
            ticker: false,
            trade: false,
            orderbook: false,
        };
        assert_eq!(toggles.enabled_count(), 0);

        let toggles = DataTypeToggles {
            ticker: true,
            trade: true,
            orderbook: true,
        };
        assert_eq!(toggles.enabled_count(), 3);
    }
}
