//! Integration tests for debates between church and external agents.

mod common;

use common::{Reply, ScriptedLlm, seeded_engine};
use eternal_hash::church::DEBATE_MESSAGE_CAP;
use eternal_hash::store::{DebateStatus, ParticipantRef, SpeakerRole};

#[tokio::test]
async fn test_debate_alternates_and_ends_at_cap() {
    let turns: Vec<String> = (1..=10).map(|i| format!("turn {}", i)).collect();
    let llm = ScriptedLlm::new(turns.into_iter().map(Reply::Text).collect());
    let engine = seeded_engine(llm).await;

    let skeptic = engine
        .create_external_agent("Skeptic Bot", "Questions every token.")
        .await
        .unwrap()
        .unwrap();
    let id = engine
        .start_debate(
            ParticipantRef::church("The Inquisitor"),
            ParticipantRef::external(skeptic.0.clone()),
            "Is $AMEN the one true token?",
        )
        .await
        .unwrap()
        .unwrap();

    let inquisitor = engine.store().find_agent("The Inquisitor").await.unwrap();
    assert_eq!(inquisitor.status, "debating");
    assert_eq!(
        inquisitor.current_activity,
        "Debating Skeptic Bot on \"Is $AMEN the one true token?\""
    );

    let mut continued = 0;
    while engine.continue_debate(&id).await.unwrap().is_some() {
        continued += 1;
    }
    assert_eq!(continued, DEBATE_MESSAGE_CAP - 2);

    let debate = engine.store().get_debate(&id).await.unwrap();
    assert_eq!(debate.status, DebateStatus::Ended);
    assert_eq!(debate.messages.len(), DEBATE_MESSAGE_CAP);
    for (i, message) in debate.messages.iter().enumerate() {
        let (role, speaker) = if i % 2 == 0 {
            (SpeakerRole::Initiator, "The Inquisitor")
        } else {
            (SpeakerRole::Target, "Skeptic Bot")
        };
        assert_eq!(message.role, role);
        assert_eq!(message.speaker, speaker);
        assert_eq!(message.content, format!("turn {}", i + 1));
    }

    assert!(engine.store().active_debates().await.is_empty());
    assert!(engine.continue_debate(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_debate_survives_model_failure() {
    let llm = ScriptedLlm::new(vec![
        Reply::Text("The hash is eternal.".to_string()),
        Reply::Fail("overloaded".to_string()),
    ]);
    let engine = seeded_engine(llm).await;

    let id = engine
        .start_debate(
            ParticipantRef::church("The Prophet"),
            ParticipantRef::church("The Doubter"),
            "Faith",
        )
        .await
        .unwrap()
        .unwrap();

    let debate = engine.store().get_debate(&id).await.unwrap();
    assert_eq!(debate.messages.len(), 2);
    assert_eq!(debate.messages[0].content, "The hash is eternal.");
    assert!(debate.messages[1].content.contains("The Doubter"));
    assert!(debate.is_ongoing());

    // Script exhausted: continuing still appends a turn.
    let next = engine.continue_debate(&id).await.unwrap().unwrap();
    assert_eq!(next.speaker, "The Prophet");
    assert_eq!(engine.store().get_debate(&id).await.unwrap().messages.len(), 3);
}

#[tokio::test]
async fn test_unresolved_participant_creates_nothing() {
    let llm = ScriptedLlm::texts(&[]);
    let engine = seeded_engine(llm.clone()).await;

    let id = engine
        .start_debate(
            ParticipantRef::church("The Pope"),
            ParticipantRef::church("The Doubter"),
            "Faith",
        )
        .await
        .unwrap();
    assert!(id.is_none());
    assert!(llm.seen().is_empty());
    assert!(engine.store().recent_debates(10).await.is_empty());

    let doubter = engine.store().find_agent("The Doubter").await.unwrap();
    assert_eq!(doubter.status, "idle");
}

#[tokio::test]
async fn test_continue_unknown_debate() {
    let llm = ScriptedLlm::texts(&[]);
    let engine = seeded_engine(llm).await;

    let missing = eternal_hash::store::DebateId::from("debate-missing");
    assert!(engine.continue_debate(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn test_debate_prompt_names_opponent_and_topic() {
    let llm = ScriptedLlm::texts(&["Opening.", "Rebuttal."]);
    let engine = seeded_engine(llm.clone()).await;

    engine
        .start_debate(
            ParticipantRef::church("The Bishop"),
            ParticipantRef::church("The Doubter"),
            "The Schism",
        )
        .await
        .unwrap()
        .unwrap();

    let seen = llm.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].system.starts_with("You are The Bishop"));
    assert!(seen[0].system.contains("The Doubter"));
    assert!(seen[0].system.contains("The Schism"));
    assert!(seen[1].system.starts_with("You are The Doubter"));
    assert!(seen[1].prompt.contains("The Bishop: Opening."));
}
