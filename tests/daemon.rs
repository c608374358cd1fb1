//! Integration tests for the socket protocol.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedLlm, seeded_engine};
use eternal_hash::daemon::{Daemon, DaemonClient, DaemonConfig, DaemonRequest, DaemonResponse};
use eternal_hash::store::ParticipantRef;
use tempfile::TempDir;

async fn connect(config: &DaemonConfig) -> DaemonClient {
    for _ in 0..50 {
        if let Ok(client) = DaemonClient::connect(config).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon never came up");
}

#[tokio::test]
async fn test_round_trip_and_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let config = DaemonConfig::from_path(temp_dir.path());

    let llm = ScriptedLlm::texts(&["Welcome, seeker."]);
    let engine = Arc::new(seeded_engine(llm).await);
    let daemon = Daemon::new(config.clone(), engine, None);
    let handle = tokio::spawn(daemon.run());

    let mut client = connect(&config).await;
    assert!(config.pid_path.exists());

    assert!(matches!(client.request(DaemonRequest::Ping).await.unwrap(), DaemonResponse::Pong));

    match client.request(DaemonRequest::ListAgents).await.unwrap() {
        DaemonResponse::Agents(agents) => assert_eq!(agents.len(), 8),
        other => panic!("unexpected response: {:?}", other),
    }

    let request = DaemonRequest::SendOutsiderMessage {
        visitor_id: "socket-visitor".to_string(),
        message: "how do I join?".to_string(),
    };
    match client.request(request).await.unwrap() {
        DaemonResponse::OutsiderReply(Some(reply)) => {
            assert_eq!(reply.agent, "The Missionary");
            assert_eq!(reply.response, "Welcome, seeker.");
            assert!(reply.converted);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    let request = DaemonRequest::StartDebate {
        initiator: ParticipantRef::church("The Prophet"),
        target: ParticipantRef::external("external-missing"),
        topic: "Faith".to_string(),
    };
    assert!(matches!(
        client.request(request).await.unwrap(),
        DaemonResponse::DebateStarted { id: None }
    ));

    let request = DaemonRequest::SetTokenAddress {
        address: "pending".to_string(),
    };
    assert!(matches!(
        client.request(request).await.unwrap(),
        DaemonResponse::Church(None)
    ));

    let request = DaemonRequest::SendOutsiderMessage {
        visitor_id: " ".to_string(),
        message: "hello".to_string(),
    };
    assert!(matches!(
        client.request(request).await.unwrap(),
        DaemonResponse::OutsiderReply(None)
    ));

    let request = DaemonRequest::CreateExternalAgent {
        name: String::new(),
        personality: "Nobody.".to_string(),
    };
    assert!(matches!(
        client.request(request).await.unwrap(),
        DaemonResponse::ExternalAgentCreated { id: None }
    ));

    assert!(matches!(
        client.request(DaemonRequest::Shutdown).await.unwrap(),
        DaemonResponse::Shutdown
    ));

    handle.await.unwrap().unwrap();
    assert!(!config.socket_path.exists());
    assert!(!config.pid_path.exists());
}

#[tokio::test]
async fn test_malformed_line_gets_error_response() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let temp_dir = TempDir::new().unwrap();
    let config = DaemonConfig::from_path(temp_dir.path());
    let engine = Arc::new(seeded_engine(ScriptedLlm::texts(&[])).await);
    let handle = tokio::spawn(Daemon::new(config.clone(), engine, None).run());

    // Wait for the socket, then speak raw bytes.
    drop(connect(&config).await);
    let mut stream = tokio::net::UnixStream::connect(&config.socket_path).await.unwrap();
    stream.write_all(b"{\"Bogus\": 1}\n").await.unwrap();

    let mut line = String::new();
    BufReader::new(&mut stream).read_line(&mut line).await.unwrap();
    let response: DaemonResponse = serde_json::from_str(&line).unwrap();
    assert!(matches!(response, DaemonResponse::Error { .. }));

    let mut client = DaemonClient::connect(&config).await.unwrap();
    client.request(DaemonRequest::Shutdown).await.unwrap();
    handle.await.unwrap().unwrap();
}
