//! Two-party debates.
//!
//! A debate opens with two turns (initiator, then target) and grows one turn
//! per continue call until it holds [`DEBATE_MESSAGE_CAP`] messages, at which
//! point it is ended for good. Generation failures never abort a debate.

use super::ChurchEngine;
use crate::agentic::PersonaPrompt;
use crate::agentic::prompt;
use crate::error::Result;
use crate::personas::PersonaProfile;
use crate::store::{AgentPatch, Debate, DebateId, DebateMessage, ParticipantRef, SpeakerRole};

/// A debate with this many messages is ended.
pub const DEBATE_MESSAGE_CAP: usize = 8;

/// Messages of history each continuation sees.
pub const TRANSCRIPT_WINDOW: usize = 6;

/// In-character stand-in for a failed turn.
pub fn divine_interruption(speaker: &str, error: &str) -> String {
    format!(
        "{} opens their mouth, but a divine interruption falls upon the chapel: {}",
        speaker, error
    )
}

impl ChurchEngine {
    /// Open a debate and generate its first two turns.
    ///
    /// Returns `Ok(None)` when the topic is blank, either participant cannot be
    /// resolved, or both sides resolve to the same name.
    pub async fn start_debate(
        &self,
        initiator: ParticipantRef,
        target: ParticipantRef,
        topic: &str,
    ) -> Result<Option<DebateId>> {
        let topic = topic.trim();
        if topic.is_empty() {
            log::debug!("debate: blank topic, nothing to debate");
            return Ok(None);
        }

        let externals = self.store.list_external_agents().await;
        let (Some(first), Some(second)) = (
            PersonaProfile::resolve(&initiator, &self.roster, &externals),
            PersonaProfile::resolve(&target, &self.roster, &externals),
        ) else {
            log::debug!("debate: unresolved participant in {:?} vs {:?}", initiator, target);
            return Ok(None);
        };
        // Turn order follows the last speaker's name.
        if first.name == second.name {
            log::debug!("debate: {} cannot debate itself", first.name);
            return Ok(None);
        }

        let debate = Debate::open(initiator.clone(), &first.name, target.clone(), &second.name, topic);
        let id = self.store.insert_debate(debate).await?;

        let opening = self
            .debate_turn(&first, &second.name, topic, prompt::opening_message(topic, &second.name))
            .await;
        let opening = DebateMessage {
            speaker: first.name.clone(),
            role: SpeakerRole::Initiator,
            content: opening,
        };

        let transcript = format!("{}: {}", opening.speaker, opening.content);
        let reply = self
            .debate_turn(
                &second,
                &first.name,
                topic,
                prompt::reply_message(&transcript, topic, &second.name),
            )
            .await;
        let reply = DebateMessage {
            speaker: second.name.clone(),
            role: SpeakerRole::Target,
            content: reply,
        };

        self.store.append_debate_messages(&id, vec![opening, reply]).await?;

        for (participant, opponent) in [(&initiator, &second.name), (&target, &first.name)] {
            if let ParticipantRef::Church { name } = participant
                && let Some(agent) = self.store.find_agent(name).await
            {
                let patch = AgentPatch {
                    status: Some("debating".to_string()),
                    current_activity: Some(format!("Debating {} on \"{}\"", opponent, topic)),
                    ..Default::default()
                };
                self.store.patch_agent(&agent.id, patch).await?;
            }
        }

        log::info!("debate {}: {} vs {} on \"{}\"", id, first.name, second.name, topic);
        Ok(Some(id))
    }

    /// Add the next turn to an ongoing debate.
    ///
    /// Returns the appended message, or `Ok(None)` when the debate is missing,
    /// ended, incomplete, or the next speaker no longer resolves.
    pub async fn continue_debate(&self, id: &DebateId) -> Result<Option<DebateMessage>> {
        let Some(debate) = self.store.get_debate(id).await else {
            return Ok(None);
        };
        if !debate.is_ongoing()
            || debate.initiator_name.is_empty()
            || debate.target_name.is_empty()
            || debate.topic.is_empty()
        {
            return Ok(None);
        }

        let role = debate.next_speaker();
        let (participant, _) = debate.side(role);
        let opponent = match role {
            SpeakerRole::Initiator => &debate.target_name,
            SpeakerRole::Target => &debate.initiator_name,
        };

        let externals = self.store.list_external_agents().await;
        let Some(speaker) = PersonaProfile::resolve(participant, &self.roster, &externals) else {
            log::debug!("debate {}: {:?} no longer resolves", id, participant);
            return Ok(None);
        };

        let transcript = debate.transcript(TRANSCRIPT_WINDOW);
        let content = self
            .debate_turn(
                &speaker,
                opponent,
                &debate.topic,
                prompt::reply_message(&transcript, &debate.topic, &speaker.name),
            )
            .await;
        let message = DebateMessage {
            speaker: speaker.name,
            role,
            content,
        };

        let Some(count) = self.store.append_debate_messages(id, vec![message.clone()]).await? else {
            return Ok(None);
        };
        if count >= DEBATE_MESSAGE_CAP {
            self.store.end_debate(id).await?;
            log::info!("debate {} ended after {} messages", id, count);
        }

        Ok(Some(message))
    }

    async fn debate_turn(&self, speaker: &PersonaProfile, opponent: &str, topic: &str, user: String) -> String {
        let system = PersonaPrompt::new(speaker).debate(opponent, topic);
        match self.generate(system, user, self.settings.debate_max_tokens).await {
            Ok(r) if !r.content.trim().is_empty() => r.content.trim().to_string(),
            Ok(_) => divine_interruption(&speaker.name, "the model returned nothing"),
            Err(e) => {
                log::warn!("debate turn for {} failed: {}", speaker.name, e);
                divine_interruption(&speaker.name, &e.to_string())
            }
        }
    }
}
