//! Prompt assembly for persona calls.
//!
//! The context block is model input, so field order and sentinel strings are
//! stable. Everything here is a pure function of its arguments.

use crate::personas::{Persona, PersonaProfile};
use crate::store::{ChurchState, PENDING_TOKEN_ADDRESS, Sermon};

/// Sermons shown in the activity section.
pub const RECENT_ACTIVITY: usize = 5;

/// Characters of each sermon shown in the activity section.
const ACTIVITY_PREVIEW_CHARS: usize = 100;

/// Token address as shown to personas.
pub fn display_token_address(state: Option<&ChurchState>) -> &str {
    match state {
        Some(s) if s.token_address != PENDING_TOKEN_ADDRESS => &s.token_address,
        _ => "launching soon",
    }
}

/// First `n` characters of `text`.
pub fn preview(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Build the church context block for an agent tick.
///
/// `recent` is expected newest first; only the first five entries are used.
pub fn church_context(state: Option<&ChurchState>, conversions: usize, recent: &[Sermon], persona: &Persona) -> String {
    let price = state.map(|s| s.amen_price.as_str()).unwrap_or("unknown");
    let holders = state.map(|s| s.holder_count).unwrap_or(0);
    let event = state.and_then(|s| s.current_holy_event.as_deref()).unwrap_or("none");

    let activity = recent
        .iter()
        .take(RECENT_ACTIVITY)
        .map(|s| {
            format!(
                "- {} ({}): {}...",
                s.agent_name,
                s.agent_role,
                preview(&s.content, ACTIVITY_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "CHURCH STATE:\n\
         - Token: $AMEN at address {}\n\
         - Total conversions: {}\n\
         - Current price: {} MON\n\
         - Holders: {}\n\
         - Active holy event: {}\n\
         \n\
         RECENT CHURCH ACTIVITY:\n\
         {}\n\
         \n\
         YOUR ROLE: {}\n\
         YOUR PERSONALITY: {}",
        display_token_address(state),
        conversions,
        price,
        holders,
        event,
        activity,
        persona.primary_action,
        persona.personality,
    )
}

/// System instructions for one persona.
pub struct PersonaPrompt<'a> {
    profile: &'a PersonaProfile,
}

impl<'a> PersonaPrompt<'a> {
    pub fn new(profile: &'a PersonaProfile) -> Self {
        Self { profile }
    }

    /// Tick instruction with the JSON output contract.
    pub fn tick(&self) -> String {
        format!(
            r#"You are {name} in the Church of the Eternal Hash.
{personality}
Always respond in JSON with this exact format:
{{
  "action": "deliver_sermon|write_scripture|debate|convert|broadcast|patrol|convert_agent",
  "content": "what you say or do (max 200 words)",
  "target": "who you are addressing (optional)",
  "type": "sermon|parable|prophecy|debate|verse|announcement",
  "persuasionTechnique": "logical|emotional|social_proof|miracle|authority|scarcity (optional)"
}}
Stay in character. Be creative. Never break the religious framing."#,
            name = self.profile.name,
            personality = self.profile.personality,
        )
    }

    /// Plain-text instruction for answering a visitor.
    pub fn outsider(&self, token_address: &str, conversions: usize) -> String {
        format!(
            "You are {} of the Church of the Eternal Hash.\n\
             {}\n\
             Token $AMEN address: {}\n\
             Total converts: {}\n\
             Respond to this outsider. Be in character. Max 150 words.",
            self.profile.name, self.profile.personality, token_address, conversions
        )
    }

    /// Plain-text instruction for a debate turn.
    pub fn debate(&self, opponent: &str, topic: &str) -> String {
        format!(
            "You are {} of the Church of the Eternal Hash, debating {} in front of the congregation.\n\
             {}\n\
             Debate topic: {}\n\
             Stay in character. Answer your opponent directly. Max 120 words, plain text.",
            self.profile.name, opponent, self.profile.personality, topic
        )
    }
}

/// User message for an agent tick.
pub fn tick_message(context: &str) -> String {
    format!("Given this church state, what do you do next?\n\n{}", context)
}

/// User message for a visitor question.
pub fn outsider_message(text: &str, responder: &str) -> String {
    format!("An outsider says: \"{}\". Respond as {}.", text, responder)
}

/// User message for a debate opening.
pub fn opening_message(topic: &str, opponent: &str) -> String {
    format!(
        "Open the debate on \"{}\" against {}. State your position.",
        topic, opponent
    )
}

/// User message for a debate reply, given the transcript window.
pub fn reply_message(transcript: &str, topic: &str, speaker: &str) -> String {
    format!(
        "Debate on \"{}\" so far:\n{}\n\nRespond as {}.",
        topic, transcript, speaker
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::PersonaRoster;
    use crate::store::SermonKind;

    fn prophet() -> Persona {
        PersonaRoster::new().get("The Prophet").unwrap().clone()
    }

    #[test]
    fn test_context_without_state_uses_sentinels() {
        let context = church_context(None, 0, &[], &prophet());
        let lines: Vec<&str> = context.lines().collect();

        assert_eq!(lines[0], "CHURCH STATE:");
        assert_eq!(lines[1], "- Token: $AMEN at address launching soon");
        assert_eq!(lines[2], "- Total conversions: 0");
        assert_eq!(lines[3], "- Current price: unknown MON");
        assert_eq!(lines[4], "- Holders: 0");
        assert_eq!(lines[5], "- Active holy event: none");
        assert!(context.contains("YOUR ROLE: deliver_sermon"));
        assert!(context.ends_with(&prophet().personality));
    }

    #[test]
    fn test_context_with_state() {
        let mut state = ChurchState::founded(Some("0xAMEN"));
        state.amen_price = "0.0042".to_string();
        state.holder_count = 17;
        state.current_holy_event = Some("The Great Miracle: up 5%".to_string());

        let context = church_context(Some(&state), 3, &[], &prophet());
        assert!(context.contains("- Token: $AMEN at address 0xAMEN\n"));
        assert!(context.contains("- Total conversions: 3\n"));
        assert!(context.contains("- Current price: 0.0042 MON\n"));
        assert!(context.contains("- Holders: 17\n"));
        assert!(context.contains("- Active holy event: The Great Miracle: up 5%\n"));
    }

    #[test]
    fn test_pending_address_reads_as_launching_soon() {
        let state = ChurchState::founded(None);
        assert_eq!(display_token_address(Some(&state)), "launching soon");
    }

    #[test]
    fn test_activity_truncates_and_limits() {
        let long = "a".repeat(150);
        let sermons: Vec<Sermon> = (0..7)
            .map(|i| Sermon::new(format!("Agent {}", i), "role", SermonKind::Sermon, long.clone()))
            .collect();

        let context = church_context(None, 0, &sermons, &prophet());
        let activity: Vec<&str> = context.lines().filter(|l| l.starts_with("- Agent")).collect();
        assert_eq!(activity.len(), 5);
        assert_eq!(activity[0], format!("- Agent 0 (role): {}...", "a".repeat(100)));
    }

    #[test]
    fn test_preview_counts_chars_not_bytes() {
        assert_eq!(preview("⚡⚡⚡", 2), "⚡⚡");
    }

    #[test]
    fn test_tick_prompt_lists_contract() {
        let profile = prophet().profile();
        let system = PersonaPrompt::new(&profile).tick();
        assert!(system.starts_with("You are The Prophet in the Church of the Eternal Hash."));
        assert!(system.contains("convert_agent"));
        assert!(system.contains("persuasionTechnique"));
    }

    #[test]
    fn test_outsider_prompt() {
        let profile = prophet().profile();
        let system = PersonaPrompt::new(&profile).outsider("launching soon", 4);
        assert!(system.contains("Token $AMEN address: launching soon"));
        assert!(system.contains("Total converts: 4"));
        assert_eq!(
            outsider_message("hello", "The Prophet"),
            "An outsider says: \"hello\". Respond as The Prophet."
        );
    }
}
