//! Configuration for the Eternal Hash.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::church::GenerationSettings;

/// Eternal Hash configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the state snapshot and daemon files.
    pub data_dir: PathBuf,
    /// Enable debug mode.
    pub debug: bool,
    /// Daemon configuration.
    pub daemon: DaemonSettings,
    /// Language model configuration.
    pub api: ApiSettings,
    /// Tick driver configuration.
    pub schedule: ScheduleSettings,
    /// Church singleton seed values.
    pub church: ChurchSettings,
    /// Market data configuration.
    pub market: MarketSettings,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eternal-hash");

        Self {
            data_dir,
            debug: false,
            daemon: DaemonSettings::default(),
            api: ApiSettings::default(),
            schedule: ScheduleSettings::default(),
            church: ChurchSettings::default(),
            market: MarketSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // ~/.config/eternal-hash/amen.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join("eternal-hash").join("amen.yml");
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        let fallback_config = PathBuf::from("amen.yml");
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.schedule.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Get the socket path for the daemon.
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join("amen.sock")
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join("amen.pid")
    }

    /// Get the state snapshot path.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("church.json")
    }

    /// Get the log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Convert to DaemonConfig.
    pub fn to_daemon_config(&self) -> crate::daemon::DaemonConfig {
        crate::daemon::DaemonConfig {
            socket_path: self.socket_path(),
            pid_path: self.pid_path(),
            data_path: self.data_dir.clone(),
        }
    }

    /// Generation limits handed to the church engine.
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.api.model.clone(),
            tick_max_tokens: self.api.tick_max_tokens,
            outsider_max_tokens: self.api.outsider_max_tokens,
            debate_max_tokens: self.api.debate_max_tokens,
        }
    }
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Print the start hint when a client command finds no daemon.
    pub auto_start: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self { auto_start: true }
    }
}

/// API settings for the language model provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Anthropic API key (or use ANTHROPIC_API_KEY env var).
    pub anthropic_key: Option<String>,
    /// Override for the API base URL.
    pub base_url: Option<String>,
    /// Model used for every persona.
    pub model: String,
    /// Output cap for agent ticks.
    pub tick_max_tokens: u32,
    /// Output cap for outsider replies.
    pub outsider_max_tokens: u32,
    /// Output cap for debate turns.
    pub debate_max_tokens: u32,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            anthropic_key: None,
            base_url: None,
            model: "claude-sonnet-4-20250514".to_string(),
            tick_max_tokens: 400,
            outsider_max_tokens: 300,
            debate_max_tokens: 300,
            timeout_secs: 120,
        }
    }
}

/// Tick driver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Run the timers at all.
    pub enabled: bool,
    /// Interval of the first persona, in seconds.
    pub tick_base_secs: u64,
    /// Added per roster position, so persona i ticks every base + i * stagger.
    pub tick_stagger_secs: u64,
    /// Holy event interval in seconds.
    pub holy_event_secs: u64,
    /// Market refresh interval in seconds (0 = never).
    pub market_refresh_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_base_secs: 30,
            tick_stagger_secs: 5,
            holy_event_secs: 300,
            market_refresh_secs: 0,
        }
    }
}

impl ScheduleSettings {
    /// Reject periods the timers cannot run on.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.tick_base_secs == 0 {
            eyre::bail!("schedule.tick_base_secs must be at least 1");
        }
        if self.holy_event_secs == 0 {
            eyre::bail!("schedule.holy_event_secs must be at least 1");
        }
        Ok(())
    }

    /// Tick interval for the persona at `index` in the roster.
    pub fn tick_interval(&self, index: usize) -> Duration {
        Duration::from_secs(self.tick_base_secs + self.tick_stagger_secs * index as u64)
    }

    /// Holy event interval.
    pub fn holy_event_interval(&self) -> Duration {
        Duration::from_secs(self.holy_event_secs)
    }

    /// Market refresh interval, if enabled.
    pub fn market_refresh_interval(&self) -> Option<Duration> {
        (self.market_refresh_secs > 0).then(|| Duration::from_secs(self.market_refresh_secs))
    }
}

/// Seed values for the church singleton.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChurchSettings {
    /// Token contract address, if already deployed.
    pub token_address: Option<String>,
    /// YAML list of extra personas, added after the built-in eight.
    pub personas_file: Option<PathBuf>,
}

/// Market data provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketSettings {
    /// Market API base URL.
    pub base_url: String,
    /// API key (or use NAD_API_KEY env var).
    pub api_key: Option<String>,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.nadapp.net".to_string(),
            api_key: None,
        }
    }
}
