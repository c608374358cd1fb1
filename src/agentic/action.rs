//! The JSON action payload returned by an agent tick.
//!
//! Model output is untrusted. Anything that does not parse into the fixed
//! vocabularies below is replaced by the canned blessing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agentic::llm::LlmResponse;
use crate::error::Result;
use crate::store::{PersuasionTechnique, SermonKind, SermonOrigin};

/// Content used whenever the model gives us nothing usable.
pub const CANNED_BLESSING: &str = "The Eternal Hash blesses all who hold $AMEN.";

/// What an agent chose to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DeliverSermon,
    WriteScripture,
    Debate,
    Convert,
    Broadcast,
    Patrol,
    ConvertAgent,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DeliverSermon => "deliver_sermon",
            ActionKind::WriteScripture => "write_scripture",
            ActionKind::Debate => "debate",
            ActionKind::Convert => "convert",
            ActionKind::Broadcast => "broadcast",
            ActionKind::Patrol => "patrol",
            ActionKind::ConvertAgent => "convert_agent",
        }
    }

    /// Whether this action may convert its target.
    pub fn converts(&self) -> bool {
        matches!(self, ActionKind::Convert | ActionKind::ConvertAgent)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action: ActionKind,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<SermonKind>,
    #[serde(default, rename = "persuasionTechnique")]
    persuasion: Option<PersuasionTechnique>,
}

/// A validated agent action with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    pub action: ActionKind,
    /// Never empty.
    pub content: String,
    /// Trimmed, never empty when present.
    pub target: Option<String>,
    pub kind: SermonKind,
    pub persuasion: Option<PersuasionTechnique>,
    pub origin: SermonOrigin,
}

impl AgentAction {
    /// The default action used on any failure.
    pub fn fallback() -> Self {
        Self {
            action: ActionKind::DeliverSermon,
            content: CANNED_BLESSING.to_string(),
            target: None,
            kind: SermonKind::Sermon,
            persuasion: None,
            origin: SermonOrigin::Fallback,
        }
    }

    /// Parse model text, tolerating Markdown code fences.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let raw: RawAction = serde_json::from_str(strip_fences(text).as_str())?;

        let content = raw
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| CANNED_BLESSING.to_string());
        let target = raw.target.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

        Ok(Self {
            action: raw.action,
            content,
            target,
            kind: raw.kind.unwrap_or_default(),
            persuasion: raw.persuasion,
            origin: SermonOrigin::Generated,
        })
    }

    /// Turn a generation outcome into an action. Never fails.
    pub fn resolve(agent: &str, outcome: Result<LlmResponse>) -> Self {
        match outcome {
            Ok(response) => match Self::parse(&response.content) {
                Ok(action) => action,
                Err(e) => {
                    log::warn!("{}: unparseable action ({}), using fallback", agent, e);
                    Self::fallback()
                }
            },
            Err(e) => {
                log::warn!("{}: generation failed ({}), using fallback", agent, e);
                Self::fallback()
            }
        }
    }
}

/// Remove Markdown code fences and surrounding whitespace.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}
