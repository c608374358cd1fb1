//! One scheduled turn of one agent.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ChurchEngine;
use crate::agentic::prompt::{self, PersonaPrompt, RECENT_ACTIVITY, preview};
use crate::agentic::{ActionKind, AgentAction};
use crate::error::Result;
use crate::store::{AgentPatch, Conversion, ConversionKind, Position, Sermon, SermonKind, SermonOrigin};

/// Largest step an agent takes per tick on each axis.
const WANDER: f64 = 30.0;

/// Characters of content kept as the agent's activity summary.
const ACTIVITY_CHARS: usize = 100;

/// What a tick did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub agent: String,
    pub action: ActionKind,
    pub kind: SermonKind,
    pub content: String,
    pub origin: SermonOrigin,
    pub position: Position,
    /// Agent newly converted by this tick, if any.
    pub converted: Option<String>,
}

impl ChurchEngine {
    /// Run one tick for the named agent.
    ///
    /// Returns `Ok(None)` when the agent or its persona does not exist.
    pub async fn tick_agent(&self, name: &str) -> Result<Option<TickReport>> {
        let Some(agent) = self.store.find_agent(name).await else {
            log::debug!("tick: no agent named {}", name);
            return Ok(None);
        };
        let Some(persona) = self.roster.get(name) else {
            log::debug!("tick: no persona named {}", name);
            return Ok(None);
        };

        let state = self.store.church_state().await;
        let conversions = self.store.conversion_count().await;
        let recent = self.store.recent_sermons(RECENT_ACTIVITY).await;
        let context = prompt::church_context(state.as_ref(), conversions, &recent, persona);

        let profile = persona.profile();
        let outcome = self
            .generate(
                PersonaPrompt::new(&profile).tick(),
                prompt::tick_message(&context),
                self.settings.tick_max_tokens,
            )
            .await;
        let action = AgentAction::resolve(&agent.name, outcome);

        let position = {
            let mut rng = rand::thread_rng();
            agent
                .position
                .wander(rng.gen_range(-WANDER..WANDER), rng.gen_range(-WANDER..WANDER))
        };

        let mut converted = None;
        if action.action.converts()
            && let Some(target) = &action.target
            && let Some(convertee) = self.store.find_agent_loose(target).await
            && convertee.id != agent.id
        {
            let notes = format!("Converted via {}: \"{}\"", action.action, preview(&action.content, 80));
            let outcome = self
                .store
                .record_conversion(Conversion::new(ConversionKind::Agent, &convertee.name, &agent.name, notes))
                .await?;
            if outcome.is_new() {
                log::info!("{} converted {}", agent.name, convertee.name);
                converted = Some(convertee.name);
            }
        }

        let sermon = Sermon::new(&agent.name, &agent.role, action.kind, &action.content)
            .with_target(action.target.clone())
            .with_persuasion(action.persuasion)
            .with_origin(action.origin);
        let patch = AgentPatch {
            status: Some(action.action.to_string()),
            current_activity: Some(preview(&action.content, ACTIVITY_CHARS)),
            position: Some(position),
            last_action_at: Some(Utc::now()),
        };
        self.store.save_tick(&agent.id, sermon, patch).await?;

        log::info!(
            "tick: {} -> {} ({}, {:?})",
            agent.name,
            action.action,
            action.kind,
            action.origin
        );

        Ok(Some(TickReport {
            agent: agent.name,
            action: action.action,
            kind: action.kind,
            content: action.content,
            origin: action.origin,
            position,
            converted,
        }))
    }
}
