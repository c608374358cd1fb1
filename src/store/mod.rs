//! Persistent church state.
//!
//! All tables live behind one async mutex. Every mutation takes the lock,
//! applies its check-then-insert logic, and (when a snapshot path is set)
//! writes the whole state to disk before releasing it. Idempotent inserts
//! therefore cannot race.

mod records;

pub use records::*;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tables {
    agents: Vec<Agent>,
    external_agents: Vec<ExternalAgent>,
    sermons: Vec<Sermon>,
    conversions: Vec<Conversion>,
    church_state: Option<ChurchState>,
    debates: Vec<Debate>,
    outsider_exchanges: Vec<OutsiderExchange>,
    alliances: Vec<Alliance>,
}

/// The church's system of record.
pub struct ChurchStore {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl ChurchStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a JSON snapshot, loading it if present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Storage(format!("corrupt snapshot {}: {}", path.display(), e)))?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Tables::default()
        };

        log::info!("Opened church store at {}", path.display());
        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Apply a mutation under the lock, then persist.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T> {
        let mut tables = self.tables.lock().await;
        let out = f(&mut tables);
        self.persist(&tables)?;
        Ok(out)
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(tables)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path).map_err(|e| Error::Storage(format!("failed to replace snapshot: {}", e)))?;
        Ok(())
    }

    // ----- agents -----

    /// Insert an agent unless one with the same name exists. Returns the id
    /// of the stored agent and whether it was created.
    pub async fn create_agent(&self, agent: Agent) -> Result<(AgentId, bool)> {
        self.mutate(|t| {
            if let Some(existing) = t.agents.iter().find(|a| a.name == agent.name) {
                return (existing.id.clone(), false);
            }
            let id = agent.id.clone();
            t.agents.push(agent);
            (id, true)
        })
        .await
    }

    pub async fn get_agent(&self, id: &AgentId) -> Option<Agent> {
        self.tables.lock().await.agents.iter().find(|a| &a.id == id).cloned()
    }

    /// Look up an agent by exact name.
    pub async fn find_agent(&self, name: &str) -> Option<Agent> {
        self.tables.lock().await.agents.iter().find(|a| a.name == name).cloned()
    }

    /// Look up an agent by name, ignoring case and surrounding whitespace.
    pub async fn find_agent_loose(&self, name: &str) -> Option<Agent> {
        let needle = name.trim().to_lowercase();
        self.tables
            .lock()
            .await
            .agents
            .iter()
            .find(|a| a.name.to_lowercase() == needle)
            .cloned()
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.tables.lock().await.agents.clone()
    }

    /// Patch an agent. Returns the updated record, or `None` if missing.
    pub async fn patch_agent(&self, id: &AgentId, patch: AgentPatch) -> Result<Option<Agent>> {
        self.mutate(|t| {
            let agent = t.agents.iter_mut().find(|a| &a.id == id)?;
            patch.apply(agent);
            Some(agent.clone())
        })
        .await
    }

    /// Set the status of every named agent that exists.
    pub async fn set_status_by_name(&self, names: &[&str], status: &str) -> Result<usize> {
        self.mutate(|t| {
            let mut touched = 0;
            for agent in t.agents.iter_mut().filter(|a| names.contains(&a.name.as_str())) {
                agent.status = status.to_string();
                touched += 1;
            }
            touched
        })
        .await
    }

    /// Append a sermon and patch its author in one step.
    pub async fn save_tick(&self, id: &AgentId, sermon: Sermon, patch: AgentPatch) -> Result<Option<SermonId>> {
        self.mutate(|t| {
            let agent = t.agents.iter_mut().find(|a| &a.id == id)?;
            patch.apply(agent);
            let sermon_id = sermon.id.clone();
            t.sermons.push(sermon);
            Some(sermon_id)
        })
        .await
    }

    // ----- external agents -----

    /// Create an external agent unless one with the same name exists.
    pub async fn create_external_agent(&self, name: &str, personality: &str) -> Result<(ExternalAgentId, bool)> {
        let name = name.trim();
        self.mutate(|t| {
            if let Some(existing) = t.external_agents.iter().find(|e| e.name == name) {
                return (existing.id.clone(), false);
            }
            let agent = ExternalAgent {
                id: ExternalAgentId::new(),
                name: name.to_string(),
                personality: personality.to_string(),
                created_at: Utc::now(),
            };
            let id = agent.id.clone();
            t.external_agents.push(agent);
            (id, true)
        })
        .await
    }

    pub async fn get_external_agent(&self, id: &ExternalAgentId) -> Option<ExternalAgent> {
        self.tables
            .lock()
            .await
            .external_agents
            .iter()
            .find(|e| &e.id == id)
            .cloned()
    }

    /// External agents, newest first.
    pub async fn list_external_agents(&self) -> Vec<ExternalAgent> {
        let mut agents = self.tables.lock().await.external_agents.clone();
        agents.reverse();
        agents
    }

    // ----- sermons -----

    pub async fn insert_sermon(&self, sermon: Sermon) -> Result<SermonId> {
        self.mutate(|t| {
            let id = sermon.id.clone();
            t.sermons.push(sermon);
            id
        })
        .await
    }

    /// The most recent sermons, newest first.
    pub async fn recent_sermons(&self, limit: usize) -> Vec<Sermon> {
        self.tables.lock().await.sermons.iter().rev().take(limit).cloned().collect()
    }

    // ----- conversions -----

    /// Record a conversion at most once.
    ///
    /// No two conversions share a (converted, converter) pair, whatever their
    /// kind. An outsider conversion is skipped when any conversion of that id
    /// exists. Agent conversions bump the converter's counter; outsider
    /// conversions bump the church total.
    pub async fn record_conversion(&self, conversion: Conversion) -> Result<ConversionOutcome> {
        self.mutate(|t| {
            let existing = t.conversions.iter().find(|c| {
                c.converted_id == conversion.converted_id
                    && (conversion.kind == ConversionKind::Outsider || c.converted_by == conversion.converted_by)
            });
            if let Some(existing) = existing {
                return ConversionOutcome::Existing(existing.id.clone());
            }

            match conversion.kind {
                ConversionKind::Agent => {
                    if let Some(converter) = t.agents.iter_mut().find(|a| a.name == conversion.converted_by) {
                        converter.conversions_count += 1;
                    }
                }
                ConversionKind::Outsider => {
                    if let Some(state) = t.church_state.as_mut() {
                        state.total_conversions += 1;
                    }
                }
            }

            let id = conversion.id.clone();
            t.conversions.push(conversion);
            ConversionOutcome::Recorded(id)
        })
        .await
    }

    /// All conversions, newest first.
    pub async fn list_conversions(&self) -> Vec<Conversion> {
        let mut conversions = self.tables.lock().await.conversions.clone();
        conversions.reverse();
        conversions
    }

    pub async fn conversion_count(&self) -> usize {
        self.tables.lock().await.conversions.len()
    }

    // ----- church state -----

    /// Create the singleton if absent. Returns true when created.
    pub async fn init_church_state(&self, state: ChurchState) -> Result<bool> {
        self.mutate(|t| {
            if t.church_state.is_some() {
                return false;
            }
            t.church_state = Some(state);
            true
        })
        .await
    }

    pub async fn church_state(&self) -> Option<ChurchState> {
        self.tables.lock().await.church_state.clone()
    }

    /// Patch the singleton. Returns `None` if it was never created.
    pub async fn patch_church_state(&self, patch: ChurchStatePatch) -> Result<Option<ChurchState>> {
        self.mutate(|t| {
            let state = t.church_state.as_mut()?;
            patch.apply(state);
            Some(state.clone())
        })
        .await
    }

    // ----- debates -----

    pub async fn insert_debate(&self, debate: Debate) -> Result<DebateId> {
        self.mutate(|t| {
            let id = debate.id.clone();
            t.debates.push(debate);
            id
        })
        .await
    }

    pub async fn get_debate(&self, id: &DebateId) -> Option<Debate> {
        self.tables.lock().await.debates.iter().find(|d| &d.id == id).cloned()
    }

    /// Append messages to an ongoing debate. Returns the new message count,
    /// or `None` if the debate is missing or ended.
    pub async fn append_debate_messages(&self, id: &DebateId, messages: Vec<DebateMessage>) -> Result<Option<usize>> {
        self.mutate(|t| {
            let debate = t.debates.iter_mut().find(|d| &d.id == id && d.is_ongoing())?;
            debate.messages.extend(messages);
            Some(debate.messages.len())
        })
        .await
    }

    /// Mark a debate ended. Returns false if it was missing.
    pub async fn end_debate(&self, id: &DebateId) -> Result<bool> {
        self.mutate(|t| match t.debates.iter_mut().find(|d| &d.id == id) {
            Some(debate) => {
                debate.status = DebateStatus::Ended;
                true
            }
            None => false,
        })
        .await
    }

    /// Ongoing debates, newest first.
    pub async fn active_debates(&self) -> Vec<Debate> {
        self.tables
            .lock()
            .await
            .debates
            .iter()
            .rev()
            .filter(|d| d.is_ongoing())
            .cloned()
            .collect()
    }

    /// The most recent debates of any status, newest first.
    pub async fn recent_debates(&self, limit: usize) -> Vec<Debate> {
        self.tables.lock().await.debates.iter().rev().take(limit).cloned().collect()
    }

    // ----- outsider exchanges -----

    pub async fn insert_outsider_exchange(&self, exchange: OutsiderExchange) -> Result<OutsiderExchangeId> {
        self.mutate(|t| {
            let id = exchange.id.clone();
            t.outsider_exchanges.push(exchange);
            id
        })
        .await
    }

    /// The most recent exchanges, newest first.
    pub async fn recent_outsider_exchanges(&self, limit: usize) -> Vec<OutsiderExchange> {
        self.tables
            .lock()
            .await
            .outsider_exchanges
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    // ----- alliances -----

    /// Record an alliance at most once per (agent, ally, kind).
    pub async fn request_alliance(&self, agent_name: &str, ally_agent_name: &str, kind: AllianceKind) -> Result<(AllianceId, bool)> {
        self.mutate(|t| {
            if let Some(existing) = t
                .alliances
                .iter()
                .find(|a| a.agent_name == agent_name && a.ally_agent_name == ally_agent_name && a.kind == kind)
            {
                return (existing.id.clone(), false);
            }
            let alliance = Alliance {
                id: AllianceId::new(),
                agent_name: agent_name.to_string(),
                ally_agent_name: ally_agent_name.to_string(),
                kind,
                created_at: Utc::now(),
            };
            let id = alliance.id.clone();
            t.alliances.push(alliance);
            (id, true)
        })
        .await
    }

    /// Alliances the agent is part of, on either side.
    pub async fn alliances_of(&self, agent_name: &str) -> Vec<Alliance> {
        self.tables
            .lock()
            .await
            .alliances
            .iter()
            .filter(|a| a.agent_name == agent_name || a.ally_agent_name == agent_name)
            .cloned()
            .collect()
    }
}
