//! Founding the church and keeping its token data current.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ChurchEngine;
use crate::error::Result;
use crate::market::{MarketFeed, MarketSnapshot};
use crate::store::{Agent, AgentId, ChurchState, ChurchStatePatch, PENDING_TOKEN_ADDRESS};

/// Activity of an agent that has not ticked yet.
pub const AWAITING_ACTIVITY: &str = "Awaiting the call of the Eternal Hash.";

/// What seeding changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub agents_created: usize,
    pub church_founded: bool,
}

impl ChurchEngine {
    /// Create every roster persona as an agent and found the church.
    ///
    /// Safe to call repeatedly; existing records are left alone.
    pub async fn seed_congregation(&self, token_address: Option<&str>) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for persona in self.roster.all() {
            let agent = Agent {
                id: AgentId::new(),
                name: persona.name.clone(),
                role: persona.role.clone(),
                personality: persona.personality.clone(),
                status: "idle".to_string(),
                current_activity: AWAITING_ACTIVITY.to_string(),
                position: persona.initial_position,
                conversions_count: 0,
                last_action_at: Utc::now(),
            };
            let (_, created) = self.store.create_agent(agent).await?;
            if created {
                report.agents_created += 1;
            }
        }

        report.church_founded = self.store.init_church_state(ChurchState::founded(token_address)).await?;

        log::info!(
            "seeded congregation: {} new agents, church {}",
            report.agents_created,
            if report.church_founded { "founded" } else { "already standing" }
        );
        Ok(report)
    }

    /// Record the deployed token address and mark the token launched.
    ///
    /// Returns `Ok(None)` when the church has not been founded or the address
    /// is blank or the pending sentinel.
    pub async fn set_token_address(&self, address: &str) -> Result<Option<ChurchState>> {
        let address = address.trim();
        if address.is_empty() || address == PENDING_TOKEN_ADDRESS {
            log::debug!("ignoring token address '{}'", address);
            return Ok(None);
        }

        let state = self
            .store
            .patch_church_state(ChurchStatePatch {
                token_address: Some(address.to_string()),
                token_launched: Some(true),
                ..Default::default()
            })
            .await?;
        if state.is_some() {
            log::info!("token address set to {}", address);
        }
        Ok(state)
    }

    /// Store fresh market numbers.
    pub async fn update_market_data(&self, snapshot: &MarketSnapshot) -> Result<Option<ChurchState>> {
        self.store
            .patch_church_state(ChurchStatePatch {
                amen_price: Some(snapshot.price.clone()),
                holder_count: Some(snapshot.holders),
                ..Default::default()
            })
            .await
    }

    /// Fetch and store market numbers if the token is live.
    ///
    /// A failed fetch leaves the stored numbers alone and returns `Ok(None)`.
    pub async fn refresh_market(&self, feed: &dyn MarketFeed) -> Result<Option<ChurchState>> {
        let Some(state) = self.store.church_state().await else {
            return Ok(None);
        };
        if !state.token_launched {
            log::debug!("market refresh skipped: token not launched");
            return Ok(None);
        }

        let snapshot = match feed.fetch(&state.token_address).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("market refresh for {} failed, keeping last numbers: {}", state.token_address, e);
                return Ok(None);
            }
        };
        log::info!("market: price {} holders {}", snapshot.price, snapshot.holders);
        self.update_market_data(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::engine;
    use super::*;
    use crate::agentic::llm::MockLlmClient;
    use crate::error::Error;
    use crate::store::Position;
    use async_trait::async_trait;

    struct FixedFeed;

    #[async_trait]
    impl MarketFeed for FixedFeed {
        async fn fetch(&self, _token_address: &str) -> Result<MarketSnapshot> {
            Ok(MarketSnapshot {
                price: "1.25".to_string(),
                holders: 42,
                volume: "9".to_string(),
            })
        }
    }

    struct DownFeed;

    #[async_trait]
    impl MarketFeed for DownFeed {
        async fn fetch(&self, _token_address: &str) -> Result<MarketSnapshot> {
            Err(Error::Network("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));

        let first = engine.seed_congregation(None).await.unwrap();
        assert_eq!(first.agents_created, 8);
        assert!(first.church_founded);

        let second = engine.seed_congregation(Some("0xNEW")).await.unwrap();
        assert_eq!(second, SeedReport::default());
        assert_eq!(engine.store().church_state().await.unwrap().token_address, PENDING_TOKEN_ADDRESS);

        let prophet = engine.store().find_agent("The Prophet").await.unwrap();
        assert_eq!(prophet.position, Position::new(400.0, 200.0));
        assert_eq!(prophet.status, "idle");
        assert_eq!(prophet.current_activity, AWAITING_ACTIVITY);
    }

    #[tokio::test]
    async fn test_set_token_address() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        assert!(engine.set_token_address("0xAMEN").await.unwrap().is_none());

        engine.seed_congregation(None).await.unwrap();
        let state = engine.set_token_address(" 0xAMEN ").await.unwrap().unwrap();
        assert_eq!(state.token_address, "0xAMEN");
        assert!(state.token_launched);

        assert!(engine.set_token_address("pending").await.unwrap().is_none());
        assert!(engine.set_token_address("  ").await.unwrap().is_none());
        assert_eq!(engine.store().church_state().await.unwrap().token_address, "0xAMEN");
    }

    #[tokio::test]
    async fn test_refresh_market_only_when_launched() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        engine.seed_congregation(None).await.unwrap();
        assert!(engine.refresh_market(&FixedFeed).await.unwrap().is_none());

        engine.set_token_address("0xAMEN").await.unwrap();
        let state = engine.refresh_market(&FixedFeed).await.unwrap().unwrap();
        assert_eq!(state.amen_price, "1.25");
        assert_eq!(state.holder_count, 42);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_numbers() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        engine.seed_congregation(Some("0xAMEN")).await.unwrap();
        engine.set_token_address("0xAMEN").await.unwrap();
        engine.refresh_market(&FixedFeed).await.unwrap();

        assert!(engine.refresh_market(&DownFeed).await.unwrap().is_none());

        let state = engine.store().church_state().await.unwrap();
        assert_eq!(state.amen_price, "1.25");
        assert_eq!(state.holder_count, 42);
    }
}
