//! CLI argument parsing for amen.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::LazyLock;

use eternal_hash::store::{AllianceKind, ParticipantRef};

/// Generate the after-help text with key and daemon status.
fn generate_after_help() -> String {
    let mut lines = Vec::new();

    lines.push("\x1b[1mEnvironment:\x1b[0m".to_string());
    for key in ["ANTHROPIC_API_KEY", "NAD_API_KEY"] {
        let status = if std::env::var_os(key).is_some() {
            format!("  ✅ {:<18} set", key)
        } else {
            format!("  ❌ {:<18} not set", key)
        };
        lines.push(status);
    }

    lines.push(String::new());

    let daemon_status = check_daemon_status();
    lines.push(format!(
        "\x1b[1mDaemon:\x1b[0m\n  {} {}",
        daemon_status.0, daemon_status.1
    ));

    lines.push(String::new());
    lines.push("Logs are written to: ~/.local/share/eternal-hash/logs/amen.log".to_string());

    lines.join("\n")
}

/// Check if daemon is running and return (icon, status_text).
fn check_daemon_status() -> (&'static str, &'static str) {
    let socket_path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eternal-hash")
        .join("amen.sock");

    if socket_path.exists() {
        if std::os::unix::net::UnixStream::connect(&socket_path).is_ok() {
            ("✅", "running")
        } else {
            ("❌", "stale socket")
        }
    } else {
        ("❌", "not running")
    }
}

static AFTER_HELP: LazyLock<String> = LazyLock::new(generate_after_help);

#[derive(Parser)]
#[command(
    name = "amen",
    about = "Church of the Eternal Hash: AI personas preaching $AMEN",
    version = env!("CARGO_PKG_VERSION"),
    after_help = AFTER_HELP.as_str()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Daemon lifecycle commands.
#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,

        /// Restart: stop daemon first if already running
        #[arg(short, long)]
        restart: bool,
    },

    /// Stop the daemon
    Stop,

    /// Check daemon status
    Status,
}

/// Debate commands.
#[derive(Subcommand)]
pub enum DebateCommand {
    /// Start a debate between two participants (church:<name> or external:<id>)
    Start {
        /// Initiating participant
        initiator: ParticipantRef,

        /// Opposing participant
        target: ParticipantRef,

        /// Debate topic
        topic: String,
    },

    /// Generate the next turn of a debate
    Continue {
        /// Debate ID
        id: String,
    },

    /// List debates
    #[command(alias = "ls")]
    List {
        /// Show ended debates too
        #[arg(short, long)]
        all: bool,

        /// Maximum number of debates (with --all)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a debate transcript
    Show {
        /// Debate ID
        id: String,
    },
}

/// External agent commands.
#[derive(Subcommand)]
pub enum ExternalCommand {
    /// Register an outside agent that can debate the church
    Create {
        /// Agent name
        name: String,

        /// Personality description
        #[arg(short, long, default_value = "")]
        personality: String,
    },

    /// List external agents
    #[command(alias = "ls")]
    List,
}

/// Token commands.
#[derive(Subcommand)]
pub enum TokenCommand {
    /// Record the deployed $AMEN address
    Set {
        /// Contract address
        address: String,
    },
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage the amen daemon
    #[command(subcommand)]
    Daemon(DaemonCommand),

    /// Show the church state
    Status,

    /// List the congregation
    Agents,

    /// Show the sermon feed
    Sermons {
        /// Maximum number of sermons
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List conversions
    Conversions,

    /// Speak to the church as a visitor
    Say {
        /// Message text
        message: String,

        /// Visitor identifier
        #[arg(long, default_value = "cli-visitor")]
        visitor: String,
    },

    /// Show recent visitor exchanges
    Visitors {
        /// Maximum number of exchanges
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Debate commands
    #[command(subcommand)]
    Debate(DebateCommand),

    /// External agent commands
    #[command(subcommand)]
    External(ExternalCommand),

    /// Form an alliance between two agents
    Ally {
        /// Requesting agent
        agent: String,

        /// Ally agent
        ally: String,

        /// Alliance kind (defense, evangelism, scripture)
        #[arg(short, long, default_value = "evangelism")]
        kind: AllianceKind,
    },

    /// List an agent's alliances
    Alliances {
        /// Agent name
        agent: String,
    },

    /// Token commands
    #[command(subcommand)]
    Token(TokenCommand),

    /// Trigger a holy event now
    Event,

    /// Tick one agent now
    Tick {
        /// Agent name
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_daemon_start_default() {
        let cli = Cli::parse_from(["amen", "daemon", "start"]);
        assert!(matches!(
            cli.command,
            Some(Command::Daemon(DaemonCommand::Start {
                foreground: false,
                restart: false
            }))
        ));
    }

    #[test]
    fn test_daemon_start_foreground_restart() {
        let cli = Cli::parse_from(["amen", "daemon", "start", "-f", "-r"]);
        assert!(matches!(
            cli.command,
            Some(Command::Daemon(DaemonCommand::Start {
                foreground: true,
                restart: true
            }))
        ));
    }

    #[test]
    fn test_daemon_stop() {
        let cli = Cli::parse_from(["amen", "daemon", "stop"]);
        assert!(matches!(cli.command, Some(Command::Daemon(DaemonCommand::Stop))));
    }

    #[test]
    fn test_debate_start_parses_participants() {
        let cli = Cli::parse_from([
            "amen",
            "debate",
            "start",
            "church:The Inquisitor",
            "external:external-1",
            "Is $AMEN the one true token?",
        ]);
        match cli.command {
            Some(Command::Debate(DebateCommand::Start { initiator, target, topic })) => {
                assert_eq!(initiator, ParticipantRef::church("The Inquisitor"));
                assert_eq!(target, ParticipantRef::external("external-1"));
                assert_eq!(topic, "Is $AMEN the one true token?");
            }
            _ => panic!("expected debate start"),
        }
    }

    #[test]
    fn test_debate_start_rejects_bare_name() {
        let result = Cli::try_parse_from(["amen", "debate", "start", "Prophet", "church:The Doubter", "topic"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ally_kind() {
        let cli = Cli::parse_from(["amen", "ally", "The Bishop", "Other Bot", "--kind", "Defense"]);
        match cli.command {
            Some(Command::Ally { agent, ally, kind }) => {
                assert_eq!(agent, "The Bishop");
                assert_eq!(ally, "Other Bot");
                assert_eq!(kind, AllianceKind::Defense);
            }
            _ => panic!("expected ally"),
        }
    }

    #[test]
    fn test_say_default_visitor() {
        let cli = Cli::parse_from(["amen", "say", "interesting, how do I join?"]);
        match cli.command {
            Some(Command::Say { message, visitor }) => {
                assert_eq!(message, "interesting, how do I join?");
                assert_eq!(visitor, "cli-visitor");
            }
            _ => panic!("expected say"),
        }
    }
}
