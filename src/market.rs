//! Token market data.
//!
//! The feed is a boundary collaborator. [`MarketFeed::snapshot`] reads any
//! failure as an empty market; callers that must not overwrite good numbers
//! with zeros use [`MarketFeed::fetch`].

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::MarketSettings;
use crate::error::{Error, Result};

/// Price and holder numbers for the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: String,
    pub holders: u64,
    pub volume: String,
}

impl MarketSnapshot {
    /// What an unreachable market looks like.
    pub fn empty() -> Self {
        Self {
            price: "0".to_string(),
            holders: 0,
            volume: "0".to_string(),
        }
    }
}

/// Source of market data.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Fetch the snapshot for a token.
    async fn fetch(&self, token_address: &str) -> Result<MarketSnapshot>;

    /// Fetch the snapshot for a token, or an empty market on failure.
    async fn snapshot(&self, token_address: &str) -> MarketSnapshot {
        match self.fetch(token_address).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("market data for {} unavailable: {}", token_address, e);
                MarketSnapshot::empty()
            }
        }
    }
}

/// nad.fun market API client.
pub struct NadMarketClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NadMarketClient {
    /// Create a client. Reads `NAD_API_KEY` if no key is configured.
    pub fn new(settings: &MarketSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().or_else(|| env::var("NAD_API_KEY").ok()),
        })
    }
}

#[async_trait]
impl MarketFeed for NadMarketClient {
    async fn fetch(&self, token_address: &str) -> Result<MarketSnapshot> {
        let mut request = self
            .client
            .get(format!("{}/agent/market/{}", self.base_url, token_address));
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("market request failed: {}", e)))?;
        let body: MarketResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(format!("market response unreadable: {}", e)))?;

        let info = body.market_info.unwrap_or_default();
        Ok(MarketSnapshot {
            price: info.price_usd.unwrap_or_else(|| "0".to_string()),
            holders: info.holder_count.unwrap_or(0),
            volume: info.volume.unwrap_or_else(|| "0".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    #[serde(default)]
    market_info: Option<MarketInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketInfo {
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    holder_count: Option<u64>,
    #[serde(default)]
    volume: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str, api_key: Option<&str>) -> NadMarketClient {
        let settings = MarketSettings {
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
        };
        NadMarketClient::new(&settings, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_reads_market_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent/market/0xAMEN"))
            .and(header("X-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "market_info": {"price_usd": "0.0042", "holder_count": 17, "volume": "1000"}
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server.uri(), Some("secret")).snapshot("0xAMEN").await;
        assert_eq!(snapshot.price, "0.0042");
        assert_eq!(snapshot.holders, 17);
        assert_eq!(snapshot.volume, "1000");
    }

    #[tokio::test]
    async fn test_missing_fields_default_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent/market/0xAMEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "market_info": {"holder_count": 3}
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server.uri(), Some("k")).snapshot("0xAMEN").await;
        assert_eq!(snapshot.price, "0");
        assert_eq!(snapshot.holders, 3);
    }

    #[tokio::test]
    async fn test_garbage_reads_as_empty_market() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let market = client(&server.uri(), Some("k"));
        assert!(market.fetch("0xAMEN").await.is_err());
        assert_eq!(market.snapshot("0xAMEN").await, MarketSnapshot::empty());
    }
}
