//! The church daemon: runs the timers and answers requests on a Unix socket.
//!
//! The protocol is one JSON request per line, one JSON response per line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::agentic::{AnthropicClient, LlmClient};
use crate::church::{ChurchEngine, OutsiderReply, TickReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::market::NadMarketClient;
use crate::personas::PersonaRoster;
use crate::scheduler::TickDriver;
use crate::store::{
    Agent, Alliance, AllianceId, AllianceKind, ChurchState, ChurchStore, Conversion, Debate, DebateId, DebateMessage,
    ExternalAgent, ExternalAgentId, OutsiderExchange, ParticipantRef, Sermon,
};

/// Sermons returned when no limit is given.
pub const DEFAULT_SERMON_LIMIT: usize = 20;

/// Debates and outsider exchanges returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,
    /// Path to the PID file.
    pub pid_path: PathBuf,
    /// Path to the data directory (for the state snapshot).
    pub data_path: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eternal-hash");
        Self::from_path(&base)
    }
}

impl DaemonConfig {
    /// Create config from a data directory path.
    pub fn from_path(path: &Path) -> Self {
        Self {
            socket_path: path.join("amen.sock"),
            pid_path: path.join("amen.pid"),
            data_path: path.to_path_buf(),
        }
    }
}

/// Request to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonRequest {
    /// Ping to check if daemon is alive.
    Ping,
    /// Get the church singleton.
    ChurchState,
    /// List all agents.
    ListAgents,
    /// Most recent sermons, newest first.
    RecentSermons { limit: Option<usize> },
    /// All conversions.
    ListConversions,
    /// All external agents.
    ListExternalAgents,
    /// Ongoing debates.
    ActiveDebates,
    /// Most recent debates of any status.
    RecentDebates { limit: Option<usize> },
    /// One debate by id.
    GetDebate { id: String },
    /// Most recent outsider exchanges.
    RecentOutsiderExchanges { limit: Option<usize> },
    /// Alliances an agent is part of.
    Alliances { agent: String },
    /// Create an external agent.
    CreateExternalAgent { name: String, personality: String },
    /// Send a visitor message.
    SendOutsiderMessage { visitor_id: String, message: String },
    /// Start a debate.
    StartDebate {
        initiator: ParticipantRef,
        target: ParticipantRef,
        topic: String,
    },
    /// Add one turn to a debate.
    ContinueDebate { id: String },
    /// Form an alliance.
    RequestAlliance {
        agent: String,
        ally: String,
        kind: AllianceKind,
    },
    /// Record the deployed token address.
    SetTokenAddress { address: String },
    /// Proclaim a random holy event now.
    TriggerHolyEvent,
    /// Tick one agent now.
    TickAgent { name: String },
    /// Shutdown daemon.
    Shutdown,
}

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonResponse {
    /// Pong response.
    Pong,
    /// Church singleton, if founded.
    Church(Option<ChurchState>),
    Agents(Vec<Agent>),
    Sermons(Vec<Sermon>),
    Conversions(Vec<Conversion>),
    ExternalAgents(Vec<ExternalAgent>),
    /// `None` when the name was blank.
    ExternalAgentCreated { id: Option<ExternalAgentId> },
    Debates(Vec<Debate>),
    Debate(Option<Debate>),
    /// `None` when the topic was blank or a participant could not be resolved.
    DebateStarted { id: Option<DebateId> },
    /// `None` when the debate was missing or already ended.
    DebateTurn(Option<DebateMessage>),
    OutsiderExchanges(Vec<OutsiderExchange>),
    /// `None` when the visitor id was blank.
    OutsiderReply(Option<OutsiderReply>),
    Alliances(Vec<Alliance>),
    /// `None` when either name was blank.
    AllianceFormed { id: Option<AllianceId> },
    /// `None` when no such agent exists.
    Tick(Option<TickReport>),
    HolyEvent { name: String, description: String },
    /// Error response.
    Error { message: String },
    /// Shutdown acknowledgment.
    Shutdown,
}

impl<T: Into<DaemonResponse>> From<Result<T>> for DaemonResponse {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(e) => DaemonResponse::Error { message: e.to_string() },
        }
    }
}

impl From<Option<OutsiderReply>> for DaemonResponse {
    fn from(reply: Option<OutsiderReply>) -> Self {
        DaemonResponse::OutsiderReply(reply)
    }
}

impl From<Option<TickReport>> for DaemonResponse {
    fn from(report: Option<TickReport>) -> Self {
        DaemonResponse::Tick(report)
    }
}

impl From<Option<DebateMessage>> for DaemonResponse {
    fn from(message: Option<DebateMessage>) -> Self {
        DaemonResponse::DebateTurn(message)
    }
}

impl From<Option<ChurchState>> for DaemonResponse {
    fn from(state: Option<ChurchState>) -> Self {
        DaemonResponse::Church(state)
    }
}

/// The church daemon.
pub struct Daemon {
    config: DaemonConfig,
    engine: Arc<ChurchEngine>,
    driver: Option<TickDriver>,
    seed_token: Option<String>,
    shutdown: tokio::sync::broadcast::Sender<()>,
}

impl Daemon {
    /// Create a daemon around an existing engine.
    ///
    /// Without a driver the church only acts on request.
    pub fn new(config: DaemonConfig, engine: Arc<ChurchEngine>, driver: Option<TickDriver>) -> Self {
        let (shutdown, _) = tokio::sync::broadcast::channel(1);
        Self {
            config,
            engine,
            driver,
            seed_token: None,
            shutdown,
        }
    }

    /// Token address used when founding the church.
    pub fn with_seed_token(mut self, token_address: Option<String>) -> Self {
        self.seed_token = token_address;
        self
    }

    /// Build the full production stack from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let daemon_config = config.to_daemon_config();
        std::fs::create_dir_all(&daemon_config.data_path)?;

        let timeout = Duration::from_secs(config.api.timeout_secs);
        let store = Arc::new(ChurchStore::open(config.snapshot_path())?);
        let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::new(
            config.api.anthropic_key.clone(),
            config.api.base_url.clone(),
            timeout,
        )?);
        let mut roster = PersonaRoster::new();
        if let Some(path) = &config.church.personas_file {
            roster.load_from_file(path)?;
            log::info!("loaded personas from {}, roster has {}", path.display(), roster.len());
        }

        let engine = Arc::new(ChurchEngine::new(
            store,
            llm,
            Arc::new(roster),
            config.generation_settings(),
        ));

        let driver = if config.schedule.enabled {
            let market = Arc::new(NadMarketClient::new(&config.market, timeout)?);
            Some(TickDriver::new(Arc::clone(&engine), config.schedule.clone()).with_market(market))
        } else {
            None
        };

        Ok(Self::new(daemon_config, engine, driver).with_seed_token(config.church.token_address.clone()))
    }

    /// Run the daemon.
    pub async fn run(mut self) -> Result<()> {
        // Remove existing socket if present
        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }

        std::fs::write(&self.config.pid_path, std::process::id().to_string())?;

        self.engine.seed_congregation(self.seed_token.as_deref()).await?;

        let listener = UnixListener::bind(&self.config.socket_path)?;
        log::info!("Daemon listening on {:?}", self.config.socket_path);

        let timers = match self.driver.take() {
            Some(driver) => driver.spawn(&self.shutdown),
            None => Vec::new(),
        };

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let engine = Arc::clone(&self.engine);
                            let shutdown_tx = self.shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, engine, shutdown_tx).await {
                                    log::error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            log::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    log::info!("Shutdown signal received");
                    break;
                }
            }
        }

        for timer in timers {
            if let Err(e) = timer.await {
                log::warn!("timer did not stop cleanly: {}", e);
            }
        }

        self.cleanup()?;
        Ok(())
    }

    /// Clean up daemon resources.
    fn cleanup(&self) -> Result<()> {
        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }
        if self.config.pid_path.exists() {
            std::fs::remove_file(&self.config.pid_path)?;
        }
        Ok(())
    }
}

/// Handle a single client connection.
async fn handle_connection(
    stream: UnixStream,
    engine: Arc<ChurchEngine>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => process_request(request, &engine, &shutdown_tx).await,
            Err(e) => DaemonResponse::Error {
                message: format!("malformed request: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        if matches!(response, DaemonResponse::Shutdown) {
            break;
        }

        line.clear();
    }

    Ok(())
}

/// Process a daemon request.
async fn process_request(
    request: DaemonRequest,
    engine: &ChurchEngine,
    shutdown_tx: &tokio::sync::broadcast::Sender<()>,
) -> DaemonResponse {
    let store = engine.store();
    match request {
        DaemonRequest::Ping => DaemonResponse::Pong,

        DaemonRequest::ChurchState => DaemonResponse::Church(store.church_state().await),

        DaemonRequest::ListAgents => DaemonResponse::Agents(store.list_agents().await),

        DaemonRequest::RecentSermons { limit } => {
            DaemonResponse::Sermons(store.recent_sermons(limit.unwrap_or(DEFAULT_SERMON_LIMIT)).await)
        }

        DaemonRequest::ListConversions => DaemonResponse::Conversions(store.list_conversions().await),

        DaemonRequest::ListExternalAgents => DaemonResponse::ExternalAgents(store.list_external_agents().await),

        DaemonRequest::ActiveDebates => DaemonResponse::Debates(store.active_debates().await),

        DaemonRequest::RecentDebates { limit } => {
            DaemonResponse::Debates(store.recent_debates(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).await)
        }

        DaemonRequest::GetDebate { id } => DaemonResponse::Debate(store.get_debate(&DebateId(id)).await),

        DaemonRequest::RecentOutsiderExchanges { limit } => DaemonResponse::OutsiderExchanges(
            store
                .recent_outsider_exchanges(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
                .await,
        ),

        DaemonRequest::Alliances { agent } => DaemonResponse::Alliances(store.alliances_of(agent.trim()).await),

        DaemonRequest::CreateExternalAgent { name, personality } => {
            match engine.create_external_agent(&name, &personality).await {
                Ok(id) => DaemonResponse::ExternalAgentCreated { id },
                Err(e) => DaemonResponse::Error { message: e.to_string() },
            }
        }

        DaemonRequest::SendOutsiderMessage { visitor_id, message } => {
            engine.send_outsider_message(&visitor_id, &message).await.into()
        }

        DaemonRequest::StartDebate {
            initiator,
            target,
            topic,
        } => match engine.start_debate(initiator, target, &topic).await {
            Ok(id) => DaemonResponse::DebateStarted { id },
            Err(e) => DaemonResponse::Error { message: e.to_string() },
        },

        DaemonRequest::ContinueDebate { id } => engine.continue_debate(&DebateId(id)).await.into(),

        DaemonRequest::RequestAlliance { agent, ally, kind } => {
            match engine.request_alliance(&agent, &ally, kind).await {
                Ok(id) => DaemonResponse::AllianceFormed { id },
                Err(e) => DaemonResponse::Error { message: e.to_string() },
            }
        }

        DaemonRequest::SetTokenAddress { address } => engine.set_token_address(&address).await.into(),

        DaemonRequest::TriggerHolyEvent => match engine.trigger_holy_event().await {
            Ok(event) => DaemonResponse::HolyEvent {
                name: event.name.to_string(),
                description: event.description.to_string(),
            },
            Err(e) => DaemonResponse::Error { message: e.to_string() },
        },

        DaemonRequest::TickAgent { name } => engine.tick_agent(name.trim()).await.into(),

        DaemonRequest::Shutdown => {
            let _ = shutdown_tx.send(());
            DaemonResponse::Shutdown
        }
    }
}

/// Check if the daemon is running.
pub fn is_daemon_running(config: &DaemonConfig) -> bool {
    if !config.pid_path.exists() {
        return false;
    }

    // Read PID and check if process exists
    if let Ok(pid_str) = std::fs::read_to_string(&config.pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // Check if process exists (kill with signal 0)
        unsafe {
            return libc::kill(pid, 0) == 0;
        }
    }

    false
}

/// Client for connecting to the daemon.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Connect to the daemon.
    pub async fn connect(config: &DaemonConfig) -> Result<Self> {
        let stream = UnixStream::connect(&config.socket_path).await.map_err(|e| {
            Error::Daemon(format!(
                "Failed to connect to daemon at {:?}: {}",
                config.socket_path, e
            ))
        })?;
        Ok(Self { stream })
    }

    /// Send a request and receive a response.
    pub async fn request(&mut self, request: DaemonRequest) -> Result<DaemonResponse> {
        let request_json = serde_json::to_string(&request)?;

        let (reader, mut writer) = self.stream.split();

        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::Daemon("daemon closed the connection".to_string()));
        }

        let response: DaemonResponse = serde_json::from_str(&line)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_config_default() {
        let config = DaemonConfig::default();
        assert!(config.socket_path.to_string_lossy().contains("amen.sock"));
        assert!(config.pid_path.to_string_lossy().contains("amen.pid"));
    }

    #[test]
    fn test_daemon_config_from_path() {
        let path = Path::new("/tmp/test");
        let config = DaemonConfig::from_path(path);
        assert_eq!(config.socket_path, path.join("amen.sock"));
        assert_eq!(config.pid_path, path.join("amen.pid"));
        assert_eq!(config.data_path, path);
    }

    #[test]
    fn test_request_serialization() {
        let request = DaemonRequest::StartDebate {
            initiator: ParticipantRef::church("The Prophet"),
            target: ParticipantRef::external("external-1"),
            topic: "The One True Token".to_string(),
        };

        let json = serde_json::to_string(&request).unwrap();
        let parsed: DaemonRequest = serde_json::from_str(&json).unwrap();

        if let DaemonRequest::StartDebate { initiator, target, topic } = parsed {
            assert_eq!(initiator, ParticipantRef::church("The Prophet"));
            assert_eq!(target, ParticipantRef::external("external-1"));
            assert_eq!(topic, "The One True Token");
        } else {
            panic!("Wrong request type");
        }
    }

    #[test]
    fn test_error_results_become_error_responses() {
        let result: Result<Option<TickReport>> = Err(Error::Storage("disk full".to_string()));
        match DaemonResponse::from(result) {
            DaemonResponse::Error { message } => assert!(message.contains("disk full")),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_response_serialization() {
        let response = DaemonResponse::HolyEvent {
            name: "The Sacred Upgrade".to_string(),
            description: "Monad processes 10,000 TPS".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        let parsed: DaemonResponse = serde_json::from_str(&json).unwrap();

        if let DaemonResponse::HolyEvent { name, .. } = parsed {
            assert_eq!(name, "The Sacred Upgrade");
        } else {
            panic!("Wrong response type");
        }
    }
}
