//! Record types kept in the church store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new time-ordered ID.
            pub fn new() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::now_v7()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

record_id!(
    /// Identifier of a church agent.
    AgentId,
    "agent"
);
record_id!(
    /// Identifier of a user-created external agent.
    ExternalAgentId,
    "external"
);
record_id!(
    /// Identifier of a sermon feed entry.
    SermonId,
    "sermon"
);
record_id!(
    /// Identifier of a conversion record.
    ConversionId,
    "conversion"
);
record_id!(
    /// Identifier of a debate.
    DebateId,
    "debate"
);
record_id!(
    /// Identifier of an outsider question/answer pair.
    OutsiderExchangeId,
    "outsider"
);
record_id!(
    /// Identifier of an alliance.
    AllianceId,
    "alliance"
);

/// Bounds of the church floor.
pub const FLOOR_MIN_X: f64 = 50.0;
pub const FLOOR_MAX_X: f64 = 750.0;
pub const FLOOR_MIN_Y: f64 = 50.0;
pub const FLOOR_MAX_Y: f64 = 550.0;

/// Position of an agent on the church floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Move by an offset, staying on the floor.
    pub fn wander(self, dx: f64, dy: f64) -> Self {
        Self {
            x: (self.x + dx).clamp(FLOOR_MIN_X, FLOOR_MAX_X),
            y: (self.y + dy).clamp(FLOOR_MIN_Y, FLOOR_MAX_Y),
        }
    }

    /// Whether the position lies on the floor.
    pub fn on_floor(&self) -> bool {
        (FLOOR_MIN_X..=FLOOR_MAX_X).contains(&self.x) && (FLOOR_MIN_Y..=FLOOR_MAX_Y).contains(&self.y)
    }
}

/// A church agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Unique display name.
    pub name: String,
    pub role: String,
    pub personality: String,
    /// Free-form label such as "idle", "deliver_sermon" or "debating".
    pub status: String,
    /// Summary of the last thing the agent did.
    pub current_activity: String,
    pub position: Position,
    /// Unique agents this agent has converted.
    pub conversions_count: u32,
    pub last_action_at: DateTime<Utc>,
}

/// Partial update of an agent. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct AgentPatch {
    pub status: Option<String>,
    pub current_activity: Option<String>,
    pub position: Option<Position>,
    pub last_action_at: Option<DateTime<Utc>>,
}

impl AgentPatch {
    pub(crate) fn apply(self, agent: &mut Agent) {
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(activity) = self.current_activity {
            agent.current_activity = activity;
        }
        if let Some(position) = self.position {
            agent.position = position;
        }
        if let Some(at) = self.last_action_at {
            agent.last_action_at = at;
        }
    }
}

/// A persona created on demand by a visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAgent {
    pub id: ExternalAgentId,
    pub name: String,
    pub personality: String,
    pub created_at: DateTime<Utc>,
}

/// Category of a sermon feed entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SermonKind {
    #[default]
    Sermon,
    Parable,
    Prophecy,
    Debate,
    Verse,
    Announcement,
}

impl SermonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SermonKind::Sermon => "sermon",
            SermonKind::Parable => "parable",
            SermonKind::Prophecy => "prophecy",
            SermonKind::Debate => "debate",
            SermonKind::Verse => "verse",
            SermonKind::Announcement => "announcement",
        }
    }
}

impl fmt::Display for SermonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rhetorical technique a persona claims to be using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersuasionTechnique {
    Logical,
    Emotional,
    SocialProof,
    Miracle,
    Authority,
    Scarcity,
}

/// Whether feed content came from the model or from the canned fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SermonOrigin {
    #[default]
    Generated,
    Fallback,
}

/// An append-only sermon feed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sermon {
    pub id: SermonId,
    pub agent_name: String,
    pub agent_role: String,
    pub kind: SermonKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persuasion: Option<PersuasionTechnique>,
    #[serde(default)]
    pub origin: SermonOrigin,
    pub created_at: DateTime<Utc>,
}

impl Sermon {
    /// Create a new generated sermon entry.
    pub fn new(
        agent_name: impl Into<String>,
        agent_role: impl Into<String>,
        kind: SermonKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: SermonId::new(),
            agent_name: agent_name.into(),
            agent_role: agent_role.into(),
            kind,
            content: content.into(),
            target: None,
            persuasion: None,
            origin: SermonOrigin::Generated,
            created_at: Utc::now(),
        }
    }

    /// Set the addressed target.
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Set the persuasion technique.
    pub fn with_persuasion(mut self, persuasion: Option<PersuasionTechnique>) -> Self {
        self.persuasion = persuasion;
        self
    }

    /// Set where the content came from.
    pub fn with_origin(mut self, origin: SermonOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Who got converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    Outsider,
    Agent,
}

/// Level granted on first contact.
pub const FIRST_CONTACT_LEVEL: &str = "acknowledged";

/// A conversion of an outsider or agent by a church agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    pub id: ConversionId,
    /// Visitor identifier or agent name.
    pub converted_id: String,
    /// Name of the converting agent.
    pub converted_by: String,
    pub level: String,
    pub kind: ConversionKind,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl Conversion {
    pub fn new(
        kind: ConversionKind,
        converted_id: impl Into<String>,
        converted_by: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: ConversionId::new(),
            converted_id: converted_id.into(),
            converted_by: converted_by.into(),
            level: FIRST_CONTACT_LEVEL.to_string(),
            kind,
            notes: notes.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of an idempotent conversion insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// A new record was written and counters were bumped.
    Recorded(ConversionId),
    /// A matching record already existed; nothing changed.
    Existing(ConversionId),
}

impl ConversionOutcome {
    pub fn id(&self) -> &ConversionId {
        match self {
            ConversionOutcome::Recorded(id) | ConversionOutcome::Existing(id) => id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ConversionOutcome::Recorded(_))
    }
}

/// Token address before launch.
pub const PENDING_TOKEN_ADDRESS: &str = "pending";

/// The church singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurchState {
    pub token_address: String,
    pub token_launched: bool,
    /// Outsider conversions only.
    pub total_conversions: u64,
    pub amen_price: String,
    pub holder_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_holy_event: Option<String>,
    pub founded_at: DateTime<Utc>,
}

impl ChurchState {
    /// A freshly founded church.
    pub fn founded(token_address: Option<&str>) -> Self {
        let token_address = token_address
            .filter(|addr| !addr.trim().is_empty())
            .unwrap_or(PENDING_TOKEN_ADDRESS)
            .to_string();
        Self {
            token_launched: token_address != PENDING_TOKEN_ADDRESS,
            token_address,
            total_conversions: 0,
            amen_price: "0".to_string(),
            holder_count: 0,
            current_holy_event: None,
            founded_at: Utc::now(),
        }
    }
}

/// Partial update of the church singleton.
#[derive(Debug, Clone, Default)]
pub struct ChurchStatePatch {
    pub token_address: Option<String>,
    pub token_launched: Option<bool>,
    pub amen_price: Option<String>,
    pub holder_count: Option<u64>,
    pub current_holy_event: Option<String>,
}

impl ChurchStatePatch {
    pub(crate) fn apply(self, state: &mut ChurchState) {
        if let Some(address) = self.token_address {
            state.token_address = address;
        }
        if let Some(launched) = self.token_launched {
            state.token_launched = launched;
        }
        if let Some(price) = self.amen_price {
            state.amen_price = price;
        }
        if let Some(holders) = self.holder_count {
            state.holder_count = holders;
        }
        if let Some(event) = self.current_holy_event {
            state.current_holy_event = Some(event);
        }
    }
}

/// Reference to a debate participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticipantRef {
    /// A church agent, by name.
    Church { name: String },
    /// A user-created agent, by id.
    External { id: ExternalAgentId },
}

impl ParticipantRef {
    pub fn church(name: impl Into<String>) -> Self {
        ParticipantRef::Church { name: name.into() }
    }

    pub fn external(id: impl Into<String>) -> Self {
        ParticipantRef::External {
            id: ExternalAgentId(id.into()),
        }
    }
}

impl FromStr for ParticipantRef {
    type Err = Error;

    /// Parse `church:<name>` or `external:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("church", name)) if !name.trim().is_empty() => Ok(Self::church(name.trim())),
            Some(("external", id)) if !id.trim().is_empty() => Ok(Self::external(id.trim())),
            _ => Err(Error::Validation(format!(
                "participant must be church:<name> or external:<id>, got '{}'",
                s
            ))),
        }
    }
}

/// Lifecycle of a debate. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    Ongoing,
    Ended,
}

/// Side of a debate a message was spoken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Initiator,
    Target,
}

/// One turn in a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateMessage {
    pub speaker: String,
    pub role: SpeakerRole,
    pub content: String,
}

/// A two-party debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debate {
    pub id: DebateId,
    pub initiator: ParticipantRef,
    pub initiator_name: String,
    pub target: ParticipantRef,
    pub target_name: String,
    pub topic: String,
    pub status: DebateStatus,
    pub messages: Vec<DebateMessage>,
    pub created_at: DateTime<Utc>,
}

impl Debate {
    /// A new ongoing debate with no messages.
    pub fn open(
        initiator: ParticipantRef,
        initiator_name: impl Into<String>,
        target: ParticipantRef,
        target_name: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            id: DebateId::new(),
            initiator,
            initiator_name: initiator_name.into(),
            target,
            target_name: target_name.into(),
            topic: topic.into(),
            status: DebateStatus::Ongoing,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == DebateStatus::Ongoing
    }

    /// Side that speaks next.
    ///
    /// Derived from the last speaker only: if the initiator spoke last the
    /// target answers, otherwise the initiator does. Every write path must
    /// append exactly the turns it claims or the order drifts.
    pub fn next_speaker(&self) -> SpeakerRole {
        match self.messages.last() {
            Some(last) if last.speaker == self.initiator_name => SpeakerRole::Target,
            _ => SpeakerRole::Initiator,
        }
    }

    /// Participant reference and display name for a side.
    pub fn side(&self, role: SpeakerRole) -> (&ParticipantRef, &str) {
        match role {
            SpeakerRole::Initiator => (&self.initiator, &self.initiator_name),
            SpeakerRole::Target => (&self.target, &self.target_name),
        }
    }

    /// The last `window` messages as `speaker: content` lines.
    pub fn transcript(&self, window: usize) -> String {
        let start = self.messages.len().saturating_sub(window);
        self.messages[start..]
            .iter()
            .map(|m| format!("{}: {}", m.speaker, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One visitor question and the persona's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutsiderExchange {
    pub id: OutsiderExchangeId,
    pub outsider_id: String,
    pub message: String,
    pub responding_agent: String,
    pub response: String,
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
}

impl OutsiderExchange {
    pub fn new(
        outsider_id: impl Into<String>,
        message: impl Into<String>,
        responding_agent: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id: OutsiderExchangeId::new(),
            outsider_id: outsider_id.into(),
            message: message.into(),
            responding_agent: responding_agent.into(),
            response: response.into(),
            outcome: "ongoing".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Purpose of an alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceKind {
    Defense,
    Evangelism,
    Scripture,
}

impl FromStr for AllianceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "defense" => Ok(AllianceKind::Defense),
            "evangelism" => Ok(AllianceKind::Evangelism),
            "scripture" => Ok(AllianceKind::Scripture),
            _ => Err(Error::Validation(format!("unknown alliance type: {}", s))),
        }
    }
}

impl fmt::Display for AllianceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllianceKind::Defense => write!(f, "defense"),
            AllianceKind::Evangelism => write!(f, "evangelism"),
            AllianceKind::Scripture => write!(f, "scripture"),
        }
    }
}

/// A directional alliance between two agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alliance {
    pub id: AllianceId,
    pub agent_name: String,
    pub ally_agent_name: String,
    pub kind: AllianceKind,
    pub created_at: DateTime<Utc>,
}
