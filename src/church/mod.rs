//! The church engine.
//!
//! Every user-facing operation and scheduled trigger goes through
//! [`ChurchEngine`]. Generation failures are absorbed here and turned into
//! flavor text; only store failures reach the caller.

mod debate;
mod events;
mod outsider;
mod seed;
mod tick;

pub use debate::{DEBATE_MESSAGE_CAP, TRANSCRIPT_WINDOW, divine_interruption};
pub use events::{HOLY_EVENTS, HolyEvent};
pub use outsider::{DEFAULT_RESPONDER, OutsiderReply, has_positive_signal, route_outsider};
pub use seed::{AWAITING_ACTIVITY, SeedReport};
pub use tick::TickReport;

use std::sync::Arc;

use crate::agentic::{LlmClient, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::personas::PersonaRoster;
use crate::store::{AllianceId, AllianceKind, ChurchStore, ExternalAgentId};

/// Model and output caps for each kind of call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub tick_max_tokens: u32,
    pub outsider_max_tokens: u32,
    pub debate_max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            tick_max_tokens: 400,
            outsider_max_tokens: 300,
            debate_max_tokens: 300,
        }
    }
}

/// Drives personas against the store.
pub struct ChurchEngine {
    store: Arc<ChurchStore>,
    llm: Arc<dyn LlmClient>,
    roster: Arc<PersonaRoster>,
    settings: GenerationSettings,
}

impl ChurchEngine {
    pub fn new(
        store: Arc<ChurchStore>,
        llm: Arc<dyn LlmClient>,
        roster: Arc<PersonaRoster>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            llm,
            roster,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<ChurchStore> {
        &self.store
    }

    pub fn roster(&self) -> &PersonaRoster {
        &self.roster
    }

    async fn generate(&self, system: String, prompt: String, max_tokens: u32) -> Result<LlmResponse> {
        let request = LlmRequest::new(self.settings.model.clone(), system, prompt, max_tokens);
        self.llm.complete(&request).await
    }

    /// Create a visitor-defined persona, or return the one with that name.
    ///
    /// A blank name creates nothing and returns `Ok(None)`.
    pub async fn create_external_agent(&self, name: &str, personality: &str) -> Result<Option<ExternalAgentId>> {
        let name = name.trim();
        if name.is_empty() {
            log::debug!("external agent with blank name ignored");
            return Ok(None);
        }
        let (id, created) = self.store.create_external_agent(name, personality).await?;
        if created {
            log::info!("External agent {} joined as {}", name, id);
        }
        Ok(Some(id))
    }

    /// Record an alliance between two agents. Repeats return the same id.
    ///
    /// Returns `Ok(None)` when either name is blank.
    pub async fn request_alliance(&self, agent: &str, ally: &str, kind: AllianceKind) -> Result<Option<AllianceId>> {
        let (agent, ally) = (agent.trim(), ally.trim());
        if agent.is_empty() || ally.is_empty() {
            log::debug!("alliance with a blank side ignored");
            return Ok(None);
        }
        let (id, created) = self.store.request_alliance(agent, ally, kind).await?;
        if created {
            log::info!("{} allied with {} for {}", agent, ally, kind);
        }
        Ok(Some(id))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::engine;
    use super::*;
    use crate::agentic::llm::MockLlmClient;

    #[tokio::test]
    async fn test_request_alliance_is_idempotent() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        let first = engine
            .request_alliance("The Bishop", "The Scribe", AllianceKind::Scripture)
            .await
            .unwrap();
        let second = engine
            .request_alliance(" The Bishop ", "The Scribe", AllianceKind::Scripture)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_request_alliance_ignores_blank_names() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        let result = engine.request_alliance("", "The Scribe", AllianceKind::Defense).await.unwrap();
        assert!(result.is_none());
        assert!(engine.store().alliances_of("The Scribe").await.is_empty());
    }

    #[tokio::test]
    async fn test_create_external_agent_by_name() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        let a = engine.create_external_agent("Skeptic Bot", "Unimpressed.").await.unwrap();
        let b = engine.create_external_agent(" Skeptic Bot ", "Different.").await.unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(engine.store().list_external_agents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_external_agent_name_creates_nothing() {
        let (engine, _) = engine(MockLlmClient::new(vec![]));
        assert!(engine.create_external_agent("   ", "Nobody.").await.unwrap().is_none());
        assert!(engine.store().list_external_agents().await.is_empty());
    }
}
