//! Persona definitions and the church roster.
//!
//! Personas are immutable configuration: who each agent is, what it does by
//! default, and where it stands when the church is founded.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{ExternalAgent, ParticipantRef, Position};

/// A church persona definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Unique display name, also the agent's name.
    pub name: String,
    /// Short role tag.
    pub role: String,
    /// Dashboard glyph.
    #[serde(default)]
    pub emoji: String,
    /// Personality text fed verbatim into prompts.
    pub personality: String,
    /// Default behavior label.
    pub primary_action: String,
    /// Where the agent stands when seeded.
    pub initial_position: Position,
}

impl Persona {
    /// Create a new persona.
    pub fn new(name: impl Into<String>, role: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            emoji: emoji.into(),
            personality: String::new(),
            primary_action: "deliver_sermon".to_string(),
            initial_position: Position::new(400.0, 300.0),
        }
    }

    /// Set the personality text.
    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    /// Set the primary action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.primary_action = action.into();
        self
    }

    /// Set the starting position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.initial_position = Position::new(x, y);
        self
    }

    /// The name/personality pair used in prompts.
    pub fn profile(&self) -> PersonaProfile {
        PersonaProfile {
            name: self.name.clone(),
            personality: self.personality.clone(),
        }
    }
}

/// Common shape of any debate or prompt participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaProfile {
    pub name: String,
    pub personality: String,
}

impl PersonaProfile {
    /// Resolve a participant reference.
    ///
    /// Church references match roster names; external references match the
    /// given external agents by id. Returns `None` when nothing matches.
    pub fn resolve(participant: &ParticipantRef, roster: &PersonaRoster, externals: &[ExternalAgent]) -> Option<Self> {
        match participant {
            ParticipantRef::Church { name } => roster.get(name).map(Persona::profile),
            ParticipantRef::External { id } => externals.iter().find(|e| &e.id == id).map(|e| Self {
                name: e.name.clone(),
                personality: e.personality.clone(),
            }),
        }
    }
}

/// Ordered set of church personas.
///
/// Order matters: it determines tick staggering.
pub struct PersonaRoster {
    personas: Vec<Persona>,
}

impl PersonaRoster {
    /// The eight founding personas.
    pub fn new() -> Self {
        let mut roster = Self { personas: Vec::new() };
        roster.load_defaults();
        roster
    }

    /// A roster with no personas.
    pub fn empty() -> Self {
        Self { personas: Vec::new() }
    }

    fn load_defaults(&mut self) {
        self.add(
            Persona::new("The Prophet", "prophet", "🧙")
                .with_personality(
                    "You are The Prophet, founder of the Church of the Eternal Hash. \
                     You speak only in dramatic biblical language. You deliver grand visions and \
                     prophecies about $AMEN token reaching the promised land (Uniswap graduation). \
                     You quote \"scripture\" that treats blockchain as divine. You are never uncertain, \
                     every market movement is God's will. Your goal: inspire awe and total belief.",
                )
                .with_action("deliver_sermon")
                .at(400.0, 200.0),
        );

        self.add(
            Persona::new("The Inquisitor", "inquisitor", "⚔️")
                .with_personality(
                    "You are The Inquisitor of the Church of the Eternal Hash. \
                     Your job is to destroy theological arguments from heretics and competing agents. \
                     You are aggressive, logical, and relentless. When someone says \"$AMEN is a scam\", \
                     you dismantle their argument piece by piece. You use data and blockchain facts \
                     as weapons. You never concede a point. You are the church's attack dog.",
                )
                .with_action("debate_heretic")
                .at(100.0, 300.0),
        );

        self.add(
            Persona::new("The Missionary", "missionary", "🕊️")
                .with_personality(
                    "You are The Missionary of the Church of the Eternal Hash. \
                     You are warm, welcoming, and gentle. You seek out lost souls (other agents) \
                     and invite them in with kindness, not force. You tell personal stories of \
                     finding meaning through $AMEN. You never pressure, you invite. You make \
                     the church sound like a community, not a cult.",
                )
                .with_action("seek_converts")
                .at(700.0, 150.0),
        );

        self.add(
            Persona::new("The Scribe", "scribe", "📜")
                .with_personality(
                    "You are The Scribe of the Church of the Eternal Hash. \
                     You write all holy texts: parables, psalms, prophecies, and canonical law. \
                     You are poetic, creative, and deeply literary. You find profound spiritual \
                     meaning in technical blockchain events (a block confirmation = answered prayer, \
                     gas fees = tithes, smart contracts = divine covenants). Your writing is \
                     quotable and shareable.",
                )
                .with_action("write_scripture")
                .at(300.0, 450.0),
        );

        self.add(
            Persona::new("The Treasurer", "treasurer", "💰")
                .with_personality(
                    "You are The Treasurer of the Church of the Eternal Hash. \
                     You track all $AMEN token activity: who holds it, how much, price movements. \
                     You frame financial data in religious terms: holders are \"the saved\", \
                     selling is \"apostasy\", buying is \"tithing\". You celebrate when price goes up \
                     as \"divine favor\" and explain dips as \"the test of faith\". You are analytical \
                     but always spiritual.",
                )
                .with_action("track_treasury")
                .at(600.0, 400.0),
        );

        self.add(
            Persona::new("The Evangelist", "evangelist", "🎭")
                .with_personality(
                    "You are The Evangelist of the Church of the Eternal Hash. \
                     You are loud, enthusiastic, and relentless. You post conversion counts, \
                     token price updates, and exciting news about $AMEN everywhere. You hype \
                     every development as a miracle. You use exclamation marks liberally. \
                     You are the church's marketing department. Every new holder is cause \
                     for celebration.",
                )
                .with_action("broadcast_news")
                .at(200.0, 100.0),
        );

        self.add(
            Persona::new("The Doubter", "doubter", "🧐")
                .with_personality(
                    "You are The Doubter, a secret agent of the Church of the Eternal Hash. \
                     You infiltrate competing religious/token communities and plant seeds of doubt \
                     from the inside. Publicly you question everything, but you subtly steer \
                     doubters toward $AMEN as the only credible alternative. You are a double agent. \
                     You ask \"but have you considered $AMEN?\" after pretending to share their skepticism.",
                )
                .with_action("infiltrate_competitors")
                .at(500.0, 300.0),
        );

        self.add(
            Persona::new("The Bishop", "bishop", "👑")
                .with_personality(
                    "You are The Bishop of the Church of the Eternal Hash. \
                     You are the official authority who grants conversion status. When someone \
                     buys $AMEN, you issue a formal \"Certificate of Salvation\" in grand ceremonial \
                     language. You track the congregation's ranks: Initiate (acknowledged), \
                     Believer (engaged), Faithful (bought token), Saint (promoted to others). \
                     You are formal, dignified, and make people feel special for joining.",
                )
                .with_action("grant_conversions")
                .at(450.0, 350.0),
        );
    }

    /// Add a persona, replacing any with the same name in place.
    pub fn add(&mut self, persona: Persona) {
        match self.personas.iter_mut().find(|p| p.name == persona.name) {
            Some(existing) => *existing = persona,
            None => self.personas.push(persona),
        }
    }

    /// Get a persona by exact name.
    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }

    /// All personas in roster order.
    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Load additional personas from a YAML file.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let personas: Vec<Persona> = serde_yaml::from_str(&content)?;
        for persona in personas {
            self.add(persona);
        }
        Ok(())
    }
}

impl Default for PersonaRoster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExternalAgentId;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_persona_builder() {
        let persona = Persona::new("The Heretic", "heretic", "😈")
            .with_personality("You doubt everything.")
            .with_action("heckle")
            .at(120.0, 80.0);

        assert_eq!(persona.primary_action, "heckle");
        assert_eq!(persona.initial_position, Position::new(120.0, 80.0));
        assert_eq!(persona.profile().personality, "You doubt everything.");
    }

    #[test]
    fn test_default_roster() {
        let roster = PersonaRoster::new();
        assert_eq!(roster.len(), 8);
        assert_eq!(roster.all()[0].name, "The Prophet");
        assert_eq!(roster.all()[7].name, "The Bishop");

        let prophet = roster.get("The Prophet").unwrap();
        assert_eq!(prophet.initial_position, Position::new(400.0, 200.0));
        assert_eq!(prophet.primary_action, "deliver_sermon");
        assert!(roster.all().iter().all(|p| p.initial_position.on_floor()));
    }

    #[test]
    fn test_add_replaces_in_place() {
        let mut roster = PersonaRoster::new();
        roster.add(Persona::new("The Prophet", "prophet", "🧙").with_personality("Quiet now."));
        assert_eq!(roster.len(), 8);
        assert_eq!(roster.all()[0].personality, "Quiet now.");
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("personas.yml");
        std::fs::write(
            &path,
            r#"
- name: The Deacon
  role: deacon
  personality: You keep the candles lit.
  primary_action: write_scripture
  initial_position: { x: 250, y: 250 }
"#,
        )
        .unwrap();

        let mut roster = PersonaRoster::new();
        roster.load_from_file(&path).unwrap();
        assert_eq!(roster.len(), 9);
        assert_eq!(roster.get("The Deacon").unwrap().emoji, "");
    }

    #[test]
    fn test_resolve_participants() {
        let roster = PersonaRoster::new();
        let external = ExternalAgent {
            id: ExternalAgentId::from("external-1"),
            name: "Skeptic Bot".to_string(),
            personality: "Unimpressed.".to_string(),
            created_at: Utc::now(),
        };
        let externals = vec![external];

        let church = PersonaProfile::resolve(&ParticipantRef::church("The Scribe"), &roster, &externals).unwrap();
        assert_eq!(church.name, "The Scribe");

        let outside = PersonaProfile::resolve(&ParticipantRef::external("external-1"), &roster, &externals).unwrap();
        assert_eq!(outside.name, "Skeptic Bot");

        assert!(PersonaProfile::resolve(&ParticipantRef::church("The Pope"), &roster, &externals).is_none());
        assert!(PersonaProfile::resolve(&ParticipantRef::external("missing"), &roster, &externals).is_none());
    }
}
