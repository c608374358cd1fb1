//! amen CLI entry point.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use fork::{Fork, daemon};
use log::info;
use std::fs;
use std::time::Duration;

mod cli;

use cli::{Cli, Command, DaemonCommand, DebateCommand, ExternalCommand, TokenCommand};
use eternal_hash::config::Config;
use eternal_hash::daemon::{Daemon, DaemonClient, DaemonConfig, DaemonRequest, DaemonResponse, is_daemon_running};
use eternal_hash::store::{Agent, Debate, DebateStatus, Sermon, SermonOrigin};

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("amen.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose || config.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI args first (before any async runtime)
    let cli = Cli::parse();

    if let Some(Command::Daemon(DaemonCommand::Start {
        foreground: false,
        restart,
    })) = &cli.command
    {
        // Daemonize BEFORE starting the multi-threaded runtime
        let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
        let daemon_config = config.to_daemon_config();

        if is_daemon_running(&daemon_config) {
            if !restart {
                eprintln!("{} Daemon is already running", "!".yellow());
                return Ok(());
            }
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            rt.block_on(stop_daemon(&daemon_config))?;
        }

        return daemonize(config, cli.verbose);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(&config, cli.verbose).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    match cli.command {
        Some(Command::Daemon(DaemonCommand::Start {
            foreground: true,
            restart,
        })) => {
            let daemon_config = config.to_daemon_config();
            if is_daemon_running(&daemon_config) {
                if !restart {
                    eprintln!("{} Daemon is already running", "!".yellow());
                    return Ok(());
                }
                stop_daemon(&daemon_config).await?;
            }
            println!("{} Starting daemon in foreground...", "→".blue());
            let daemon = Daemon::from_config(&config)?;
            daemon.run().await?;
            Ok(())
        }
        Some(Command::Daemon(DaemonCommand::Start { foreground: false, .. })) => {
            unreachable!("Background daemon should be handled before tokio starts")
        }
        Some(Command::Daemon(DaemonCommand::Stop)) => {
            let daemon_config = config.to_daemon_config();
            if is_daemon_running(&daemon_config) {
                stop_daemon(&daemon_config).await?;
            } else {
                println!("{} Daemon is not running", "○".yellow());
            }
            Ok(())
        }
        Some(Command::Daemon(DaemonCommand::Status)) | None => show_status(&config).await,
        Some(cmd) => run_client_command(&config, cmd).await,
    }
}

fn daemonize(config: Config, verbose: bool) -> Result<()> {
    // The tokio runtime can't survive a fork, so it is created in the child.
    match daemon(false, false) {
        Ok(Fork::Child) => {
            setup_logging(&config, verbose).ok();

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let daemon = Daemon::from_config(&config)?;
                daemon.run().await?;
                Ok::<(), eyre::Error>(())
            })?;

            Ok(())
        }
        Ok(Fork::Parent(_)) => {
            println!("{} Daemon started in background", "✓".green());
            std::process::exit(0);
        }
        Err(e) => Err(eyre::eyre!("Failed to daemonize: {:?}", e)),
    }
}

/// Ask the daemon to shut down and wait for its PID file to go away.
async fn stop_daemon(daemon_config: &DaemonConfig) -> Result<()> {
    let mut client = DaemonClient::connect(daemon_config).await?;
    match client.request(DaemonRequest::Shutdown).await? {
        DaemonResponse::Shutdown => {}
        DaemonResponse::Error { message } => return Err(eyre::eyre!(message)),
        other => return Err(eyre::eyre!("Unexpected response: {:?}", other)),
    }

    for _ in 0..50 {
        if !is_daemon_running(daemon_config) {
            println!("{} Daemon stopped", "✓".green());
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(eyre::eyre!("Daemon did not stop within 5 seconds"))
}

async fn run_client_command(config: &Config, command: Command) -> Result<()> {
    let daemon_config = config.to_daemon_config();

    if !is_daemon_running(&daemon_config) {
        if config.daemon.auto_start {
            eprintln!("{} Daemon not running. Start with: amen daemon start", "!".yellow());
        } else {
            eprintln!("{} Daemon not running", "!".red());
        }
        return Ok(());
    }

    let mut client = DaemonClient::connect(&daemon_config).await?;

    match command {
        Command::Daemon(_) => unreachable!(),

        Command::Status => {
            let response = client.request(DaemonRequest::ChurchState).await?;
            handle_church_response(response);
        }

        Command::Agents => {
            let response = client.request(DaemonRequest::ListAgents).await?;
            match response {
                DaemonResponse::Agents(agents) if agents.is_empty() => {
                    println!("{} The congregation is empty", "○".yellow());
                }
                DaemonResponse::Agents(agents) => agents.iter().for_each(print_agent),
                other => handle_unexpected(other),
            }
        }

        Command::Sermons { limit } => {
            let response = client.request(DaemonRequest::RecentSermons { limit }).await?;
            match response {
                DaemonResponse::Sermons(sermons) if sermons.is_empty() => {
                    println!("{} No sermons yet", "○".yellow());
                }
                DaemonResponse::Sermons(sermons) => sermons.iter().for_each(print_sermon),
                other => handle_unexpected(other),
            }
        }

        Command::Conversions => {
            let response = client.request(DaemonRequest::ListConversions).await?;
            match response {
                DaemonResponse::Conversions(conversions) if conversions.is_empty() => {
                    println!("{} No conversions yet", "○".yellow());
                }
                DaemonResponse::Conversions(conversions) => {
                    for conversion in conversions {
                        println!(
                            "{} {} by {} ({:?}, {})",
                            "✝".green(),
                            conversion.converted_id.cyan(),
                            conversion.converted_by,
                            conversion.kind,
                            conversion.level
                        );
                        if !conversion.notes.is_empty() {
                            println!("  {}", conversion.notes.dimmed());
                        }
                    }
                }
                other => handle_unexpected(other),
            }
        }

        Command::Say { message, visitor } => {
            let request = DaemonRequest::SendOutsiderMessage {
                visitor_id: visitor,
                message,
            };
            match client.request(request).await? {
                DaemonResponse::OutsiderReply(Some(reply)) => {
                    println!("{} {}", reply.agent.cyan().bold(), reply.response);
                    if reply.converted {
                        println!("{} You have been acknowledged by the church", "✓".green());
                    }
                }
                DaemonResponse::OutsiderReply(None) => println!("{} A visitor id is required", "!".yellow()),
                other => handle_unexpected(other),
            }
        }

        Command::Visitors { limit } => {
            let response = client.request(DaemonRequest::RecentOutsiderExchanges { limit }).await?;
            match response {
                DaemonResponse::OutsiderExchanges(exchanges) if exchanges.is_empty() => {
                    println!("{} No visitors yet", "○".yellow());
                }
                DaemonResponse::OutsiderExchanges(exchanges) => {
                    for exchange in exchanges {
                        println!("{} {}: {}", "?".yellow(), exchange.outsider_id.cyan(), exchange.message);
                        println!("  {} {}", exchange.responding_agent.bold(), exchange.response);
                    }
                }
                other => handle_unexpected(other),
            }
        }

        Command::Debate(DebateCommand::Start {
            initiator,
            target,
            topic,
        }) => {
            let request = DaemonRequest::StartDebate {
                initiator,
                target,
                topic,
            };
            match client.request(request).await? {
                DaemonResponse::DebateStarted { id: Some(id) } => {
                    println!("{} Debate started: {}", "✓".green(), id.0.cyan());
                    let response = client.request(DaemonRequest::GetDebate { id: id.0 }).await?;
                    if let DaemonResponse::Debate(Some(debate)) = response {
                        print_debate(&debate);
                    }
                }
                DaemonResponse::DebateStarted { id: None } => {
                    eprintln!("{} Unknown participant", "✗".red());
                }
                other => handle_unexpected(other),
            }
        }

        Command::Debate(DebateCommand::Continue { id }) => {
            match client.request(DaemonRequest::ContinueDebate { id }).await? {
                DaemonResponse::DebateTurn(Some(message)) => {
                    println!("{} {}", message.speaker.cyan().bold(), message.content);
                }
                DaemonResponse::DebateTurn(None) => {
                    println!("{} Debate not found or already ended", "○".yellow());
                }
                other => handle_unexpected(other),
            }
        }

        Command::Debate(DebateCommand::List { all, limit }) => {
            let request = if all {
                DaemonRequest::RecentDebates { limit }
            } else {
                DaemonRequest::ActiveDebates
            };
            match client.request(request).await? {
                DaemonResponse::Debates(debates) if debates.is_empty() => {
                    println!("{} No debates found", "○".yellow());
                }
                DaemonResponse::Debates(debates) => {
                    for debate in debates {
                        let icon = match debate.status {
                            DebateStatus::Ongoing => "●".green(),
                            DebateStatus::Ended => "○".white(),
                        };
                        println!(
                            "{} {} {} vs {} on \"{}\" ({} messages)",
                            icon,
                            debate.id.0.cyan(),
                            debate.initiator_name,
                            debate.target_name,
                            debate.topic,
                            debate.messages.len()
                        );
                    }
                }
                other => handle_unexpected(other),
            }
        }

        Command::Debate(DebateCommand::Show { id }) => match client.request(DaemonRequest::GetDebate { id }).await? {
            DaemonResponse::Debate(Some(debate)) => print_debate(&debate),
            DaemonResponse::Debate(None) => println!("{} Debate not found", "!".yellow()),
            other => handle_unexpected(other),
        },

        Command::External(ExternalCommand::Create { name, personality }) => {
            let request = DaemonRequest::CreateExternalAgent { name, personality };
            match client.request(request).await? {
                DaemonResponse::ExternalAgentCreated { id: Some(id) } => {
                    println!("{} External agent: {}", "✓".green(), id.0.cyan());
                }
                DaemonResponse::ExternalAgentCreated { id: None } => {
                    println!("{} An external agent needs a name", "!".yellow());
                }
                other => handle_unexpected(other),
            }
        }

        Command::External(ExternalCommand::List) => match client.request(DaemonRequest::ListExternalAgents).await? {
            DaemonResponse::ExternalAgents(agents) if agents.is_empty() => {
                println!("{} No external agents", "○".yellow());
            }
            DaemonResponse::ExternalAgents(agents) => {
                for agent in agents {
                    println!("{} {} {}", "◆".blue(), agent.id.0.cyan(), agent.name.bold());
                    if !agent.personality.is_empty() {
                        println!("  {}", agent.personality.dimmed());
                    }
                }
            }
            other => handle_unexpected(other),
        },

        Command::Ally { agent, ally, kind } => {
            let request = DaemonRequest::RequestAlliance { agent, ally, kind };
            match client.request(request).await? {
                DaemonResponse::AllianceFormed { id: Some(id) } => {
                    println!("{} Alliance formed: {}", "✓".green(), id.0.cyan());
                }
                DaemonResponse::AllianceFormed { id: None } => {
                    println!("{} An alliance needs two agent names", "!".yellow());
                }
                other => handle_unexpected(other),
            }
        }

        Command::Alliances { agent } => match client.request(DaemonRequest::Alliances { agent }).await? {
            DaemonResponse::Alliances(alliances) if alliances.is_empty() => {
                println!("{} No alliances", "○".yellow());
            }
            DaemonResponse::Alliances(alliances) => {
                for alliance in alliances {
                    println!(
                        "{} {} ⇄ {} ({})",
                        "◆".blue(),
                        alliance.agent_name,
                        alliance.ally_agent_name,
                        alliance.kind
                    );
                }
            }
            other => handle_unexpected(other),
        },

        Command::Token(TokenCommand::Set { address }) => {
            match client.request(DaemonRequest::SetTokenAddress { address }).await? {
                DaemonResponse::Church(Some(state)) => {
                    println!("{} $AMEN launched at {}", "✓".green(), state.token_address.cyan());
                }
                DaemonResponse::Church(None) => {
                    println!("{} Token address unchanged: church not founded or address not usable", "!".yellow());
                }
                other => handle_unexpected(other),
            }
        }

        Command::Event => match client.request(DaemonRequest::TriggerHolyEvent).await? {
            DaemonResponse::HolyEvent { name, description } => {
                println!("{} {}", "⚡".yellow(), name.bold());
                println!("  {}", description);
            }
            other => handle_unexpected(other),
        },

        Command::Tick { name } => match client.request(DaemonRequest::TickAgent { name }).await? {
            DaemonResponse::Tick(Some(report)) => {
                println!("{} {} [{}]", "●".green(), report.agent.cyan().bold(), report.action);
                println!("  {}", report.content);
                if report.origin == SermonOrigin::Fallback {
                    println!("  {}", "(fallback blessing)".dimmed());
                }
                if let Some(converted) = report.converted {
                    println!("{} Converted {}", "✝".green(), converted.cyan());
                }
            }
            DaemonResponse::Tick(None) => println!("{} No such agent", "!".yellow()),
            other => handle_unexpected(other),
        },
    }
    Ok(())
}

async fn show_status(config: &Config) -> Result<()> {
    let daemon_config = config.to_daemon_config();

    if is_daemon_running(&daemon_config) {
        println!("{} Daemon is running", "✓".green());

        if let Ok(mut client) = DaemonClient::connect(&daemon_config).await {
            let response = client.request(DaemonRequest::ChurchState).await?;
            handle_church_response(response);
        }
    } else {
        println!("{} Daemon is not running", "○".yellow());
        println!("Start with: {} daemon start", "amen".cyan());
    }

    Ok(())
}

fn handle_church_response(response: DaemonResponse) {
    match response {
        DaemonResponse::Church(Some(state)) => {
            println!("{} Church of the Eternal Hash", "✝".blue());
            println!();
            println!("  Token:        {}", state.token_address.cyan());
            println!("  Launched:     {}", state.token_launched);
            println!("  Price:        {}", state.amen_price);
            println!("  Holders:      {}", state.holder_count);
            println!("  Conversions:  {}", state.total_conversions.to_string().green());
            if let Some(event) = &state.current_holy_event {
                println!("  Holy event:   {}", event.yellow());
            }
            println!("  Founded:      {}", state.founded_at.format("%Y-%m-%d %H:%M:%S"));
        }
        DaemonResponse::Church(None) => println!("{} The church has not been founded", "!".yellow()),
        other => handle_unexpected(other),
    }
}

fn handle_unexpected(response: DaemonResponse) {
    match response {
        DaemonResponse::Error { message } => eprintln!("{} {}", "✗".red(), message),
        other => eprintln!("{} Unexpected response: {:?}", "✗".red(), other),
    }
}

fn print_agent(agent: &Agent) {
    let icon = match agent.status.as_str() {
        "debating" => "⚔".red(),
        "idle" => "○".white(),
        _ => "●".green(),
    };
    println!(
        "{} {} ({}) at ({:.0}, {:.0}), {} conversions",
        icon,
        agent.name.cyan().bold(),
        agent.role,
        agent.position.x,
        agent.position.y,
        agent.conversions_count
    );
    println!("  {}", agent.current_activity.dimmed());
}

fn print_sermon(sermon: &Sermon) {
    println!(
        "{} {} [{}] {}",
        sermon.created_at.format("%H:%M:%S").to_string().dimmed(),
        sermon.agent_name.cyan().bold(),
        sermon.kind,
        sermon.content
    );
}

fn print_debate(debate: &Debate) {
    println!(
        "{} {} vs {} on \"{}\" ({:?})",
        "⚔".red(),
        debate.initiator_name.bold(),
        debate.target_name.bold(),
        debate.topic,
        debate.status
    );
    for message in &debate.messages {
        println!("  {} {}", format!("{}:", message.speaker).cyan(), message.content);
    }
}
