//! Visitor questions and first-contact conversions.

use serde::{Deserialize, Serialize};

use super::ChurchEngine;
use crate::agentic::PersonaPrompt;
use crate::agentic::prompt::{self, preview};
use crate::error::Result;
use crate::personas::PersonaProfile;
use crate::store::{Conversion, ConversionKind, OutsiderExchange};

/// Persona answering anything no rule claims.
pub const DEFAULT_RESPONDER: &str = "The Prophet";

/// Ordered routing rules. The first rule with a matching keyword wins.
const ROUTES: &[(&[&str], &str)] = &[
    (&["scam", "fake", "worthless"], "The Inquisitor"),
    (&["how", "join", "tell me"], "The Missionary"),
    (&["price", "buy", "money"], "The Treasurer"),
    (&["prove", "evidence", "show"], "The Evangelist"),
];

const POSITIVE_SIGNALS: &[&str] = &["interesting", "tell me more", "how do i", "join", "buy"];

/// Characters of the visitor's message kept in the conversion note.
const NOTE_CHARS: usize = 80;

/// The answer given to a visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutsiderReply {
    pub agent: String,
    pub response: String,
    /// Whether this message converted the visitor.
    pub converted: bool,
}

/// Pick the persona that answers `text`.
pub fn route_outsider(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    ROUTES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, persona)| *persona)
        .unwrap_or(DEFAULT_RESPONDER)
}

/// Whether `text` shows interest in joining.
pub fn has_positive_signal(text: &str) -> bool {
    let lower = text.to_lowercase();
    POSITIVE_SIGNALS.iter().any(|s| lower.contains(s))
}

fn silent_reply(responder: &str) -> String {
    format!(
        "{} bows their head in silence. The Eternal Hash will answer you in its own block time.",
        responder
    )
}

impl ChurchEngine {
    /// Answer a visitor and, on a positive signal, record their first contact.
    ///
    /// A blank visitor id gets no answer and returns `Ok(None)`.
    pub async fn send_outsider_message(&self, visitor_id: &str, text: &str) -> Result<Option<OutsiderReply>> {
        let visitor_id = visitor_id.trim();
        if visitor_id.is_empty() {
            log::debug!("outsider message without a visitor id ignored");
            return Ok(None);
        }

        let responder = route_outsider(text);
        let profile = self
            .roster
            .get(responder)
            .map(|p| p.profile())
            .unwrap_or_else(|| PersonaProfile {
                name: responder.to_string(),
                personality: String::new(),
            });

        let state = self.store.church_state().await;
        let conversions = self.store.conversion_count().await;
        let system = PersonaPrompt::new(&profile).outsider(prompt::display_token_address(state.as_ref()), conversions);

        let response = match self
            .generate(
                system,
                prompt::outsider_message(text, responder),
                self.settings.outsider_max_tokens,
            )
            .await
        {
            Ok(r) if !r.content.trim().is_empty() => r.content.trim().to_string(),
            Ok(_) => {
                log::warn!("{}: empty outsider reply, using fallback", responder);
                silent_reply(responder)
            }
            Err(e) => {
                log::warn!("{}: outsider reply failed ({}), using fallback", responder, e);
                silent_reply(responder)
            }
        };

        self.store
            .insert_outsider_exchange(OutsiderExchange::new(visitor_id, text, responder, &response))
            .await?;

        let mut converted = false;
        if has_positive_signal(text) {
            let notes = format!("First contact via: \"{}\"", preview(text, NOTE_CHARS));
            let outcome = self
                .store
                .record_conversion(Conversion::new(ConversionKind::Outsider, visitor_id, responder, notes))
                .await?;
            converted = outcome.is_new();
        }

        log::info!(
            "outsider {} -> {}{}",
            visitor_id,
            responder,
            if converted { " (converted)" } else { "" }
        );

        Ok(Some(OutsiderReply {
            agent: responder.to_string(),
            response,
            converted,
        }))
    }
}
