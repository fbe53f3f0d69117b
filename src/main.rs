#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{theme::ColorfulTheme, FuzzySelect};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use stagehand::backend::HttpChatBackend;
use stagehand::catalog::{Agent, CatalogIndex, HttpCatalogSource, Stage};
use stagehand::channel::{ChannelState, WsConnector};
use stagehand::config::Config;
use stagehand::error::{CatalogError, SessionError};
use stagehand::orchestrator::{Orchestrator, ViewSink};
use stagehand::session::{Conversation, ConversationSession, LogEntry, Origin};

/// Stagehand - chat with pipeline-stage AI agents.
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(version)]
#[command(about = "Chat with pipeline-stage AI agents.", long_about = None)]
struct Cli {
    /// Override the config directory (default: ~/.stagehand)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List catalog agents grouped by pipeline stage
    Agents {
        /// Only show one stage (targeting, origination, progression, growth)
        #[arg(long)]
        stage: Option<String>,
    },

    /// Start an interactive chat with an agent
    #[command(long_about = "\
Start an interactive chat with an agent.

Picks an agent from the catalog (fuzzy search) unless --agent is given, \
starts a conversation, and streams replies as they arrive. Inside the \
chat: /agents lists the catalog, /switch picks another agent, /quit exits.

Examples:
  stagehand chat
  stagehand chat --agent prospector
  stagehand chat --agent prospector --input region=emea --input segment=smb")]
    Chat {
        /// Agent id to chat with (skips the interactive picker)
        #[arg(short, long)]
        agent: Option<String>,

        /// Conversation inputs as key=value pairs, forwarded on start
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
    },

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config_dir.as_deref()).await?;

    match cli.command {
        Commands::Agents { stage } => run_agents(config, stage).await,
        Commands::Chat { agent, inputs } => run_chat(config, agent, inputs).await,
        Commands::Init => run_init(config).await,
    }
}

async fn run_agents(config: Config, stage: Option<String>) -> Result<()> {
    let stage = stage
        .map(|s| {
            Stage::parse(&s).with_context(|| {
                format!("unknown stage: {s} (expected targeting, origination, progression, growth)")
            })
        })
        .transpose()?;

    let http = reqwest::Client::new();
    let source = HttpCatalogSource::new(http, config.services.base_url.clone());
    let view = TerminalView;
    let catalog = Orchestrator::load_catalog(&source, &view).await;

    print_catalog(&catalog, stage);
    Ok(())
}

async fn run_init(config: Config) -> Result<()> {
    config.save().await?;
    println!("Wrote {}", config.config_path.display());
    Ok(())
}

async fn run_chat(config: Config, agent_id: Option<String>, inputs: Vec<String>) -> Result<()> {
    let inputs = parse_inputs(&inputs)?;
    let http = reqwest::Client::new();
    let view = Arc::new(TerminalView);

    let source = HttpCatalogSource::new(http.clone(), config.services.base_url.clone());
    let catalog = Orchestrator::load_catalog(&source, view.as_ref()).await;
    if catalog.is_empty() {
        bail!("no agents available");
    }

    let backend = Arc::new(HttpChatBackend::new(http, config.services.base_url.clone()));
    let connector = Arc::new(WsConnector::new(config.services.channel_endpoint()));
    let session = Arc::new(ConversationSession::new(backend, connector));
    let subscription = session.subscribe();
    let orchestrator = Arc::new(Orchestrator::new(session, view));

    {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_events(subscription).await });
    }

    let initial = match agent_id.or_else(|| config.chat.default_agent.clone()) {
        Some(id) => catalog
            .find(&id)
            .cloned()
            .with_context(|| format!("unknown agent id: {id}"))?,
        None => pick_agent(&catalog)?,
    };
    if orchestrator.select_agent(&initial, &inputs).await.is_err() {
        bail!("could not start conversation");
    }

    println!(
        "{}",
        style("Type a message and press enter. /agents, /switch, /quit").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/agents" => print_catalog(&catalog, None),
            "/switch" => {
                let agent = pick_agent(&catalog)?;
                // Failures are already rendered by the view.
                let _ = orchestrator.select_agent(&agent, &inputs).await;
            }
            text => {
                let _ = orchestrator.submit(text).await;
            }
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Parse `key=value` arguments into the inputs object sent on start.
fn parse_inputs(pairs: &[String]) -> Result<serde_json::Value> {
    let mut inputs = serde_json::Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid input {pair:?}: expected KEY=VALUE");
        };
        inputs.insert(
            key.trim().to_string(),
            serde_json::Value::String(value.to_string()),
        );
    }
    Ok(serde_json::Value::Object(inputs))
}

fn pick_agent(catalog: &CatalogIndex) -> Result<Agent> {
    let agents: Vec<&Agent> = catalog.all().collect();
    let labels: Vec<String> = agents
        .iter()
        .map(|a| format!("{} [{}] - {}", a.name, a.stage, a.description))
        .collect();

    let picked = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Pick an agent")
        .items(&labels)
        .default(0)
        .interact()
        .context("agent selection cancelled")?;

    Ok(agents[picked].clone())
}

fn print_catalog(catalog: &CatalogIndex, only: Option<Stage>) {
    if catalog.is_empty() {
        println!("{}", style("No agents available.").dim());
        return;
    }
    for stage in Stage::ALL {
        if only.is_some_and(|s| s != stage) {
            continue;
        }
        let agents = catalog.agents_for(stage);
        if agents.is_empty() {
            continue;
        }
        println!("{}", style(stage.as_str()).bold().underlined());
        for agent in agents {
            println!(
                "  {}  {}  {}",
                style(&agent.id).cyan(),
                style(&agent.name).bold(),
                style(&agent.description).dim()
            );
        }
    }
}

/// Terminal rendering of orchestrator signals.
struct TerminalView;

impl ViewSink for TerminalView {
    fn catalog_loaded(&self, index: &CatalogIndex) {
        println!("{}", style(format!("{} agents available", index.len())).dim());
    }

    fn catalog_unavailable(&self, error: &CatalogError) {
        eprintln!("{} {error}", style("catalog unavailable:").red().bold());
    }

    fn conversation_started(&self, conversation: &Conversation, agent: &Agent) {
        println!(
            "{} {} {}",
            style("Connected to").green(),
            style(&agent.name).green().bold(),
            style(format!("(conversation {})", conversation.id)).dim()
        );
    }

    fn entry_appended(&self, entry: &LogEntry) {
        match entry.origin {
            Origin::User => println!("{} {}", style("you>").cyan().bold(), entry.payload),
            Origin::Agent => println!("{} {}", style("agent>").green().bold(), entry.payload),
        }
    }

    fn channel_state(&self, state: ChannelState) {
        match state {
            ChannelState::Failed => eprintln!(
                "{}",
                style("Connection lost. Pick the agent again to reconnect.").red()
            ),
            other => println!("{}", style(format!("channel {}", other.as_str())).dim()),
        }
    }

    fn frame_dropped(&self, reason: &str) {
        eprintln!("{} {reason}", style("dropped malformed frame:").yellow());
    }

    fn session_error(&self, error: &SessionError) {
        match error {
            SessionError::NoActiveConversation => {
                eprintln!("{}", style("No conversation yet. Pick an agent first.").yellow());
            }
            SessionError::SendFailed(_) => {
                eprintln!(
                    "{}",
                    style("Message not delivered (kept in the log). Try again.").red()
                );
            }
            other => eprintln!("{} {other}", style("error:").red().bold()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_inputs_builds_string_object() {
        let inputs = parse_inputs(&["region=emea".to_string(), "segment=smb".to_string()]).unwrap();
        assert_eq!(
            inputs,
            serde_json::json!({"region": "emea", "segment": "smb"})
        );
    }

    #[test]
    fn parse_inputs_rejects_missing_separator() {
        assert!(parse_inputs(&["oops".to_string()]).is_err());
    }

    #[test]
    fn parse_inputs_keeps_equals_in_value() {
        let inputs = parse_inputs(&["query=a=b".to_string()]).unwrap();
        assert_eq!(inputs, serde_json::json!({"query": "a=b"}));
    }
}
