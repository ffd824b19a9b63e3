use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poolraft_cluster::{resolve_mode, ConsensusManager, HealthStatus};
use poolraft_common::{ConsensusError, PoolSettings};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Query and administer pgraft consensus the way the pool sees it
#[derive(Parser, Debug)]
#[command(name = "poolraft-ctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pool settings file (TOML); POOLRAFT_* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which leader-detection strategy the settings select
    Mode,
    /// Full cluster snapshot
    Status,
    /// Current leader, term and local state
    Leader,
    /// Link, worker and cluster health
    Health,
    /// Index of the configured backend that is the consensus leader
    FindLeaderBackend,
    /// Add a member (leader only)
    AddNode { id: i32, host: String, port: u16 },
    /// Remove a member (leader only)
    RemoveNode { id: i32 },
    /// Read a replicated configuration value
    KvGet { key: String },
    /// Write a replicated configuration value
    KvPut { key: String, value: String },
}

impl Command {
    /// Everything except `mode` talks to pgraft
    fn needs_link(&self) -> bool {
        !matches!(self, Command::Mode)
    }
}

#[derive(Serialize)]
struct LeaderView {
    leader_id: i32,
    term: i64,
    state: String,
    is_leader: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let fatal = e
                .downcast_ref::<ConsensusError>()
                .map(ConsensusError::is_fatal)
                .unwrap_or(false);
            ExitCode::from(if fatal { 2 } else { 1 })
        }
    }
}

/// Runs one command; `Ok(false)` means the command ran but had no good answer
async fn run(cli: Cli) -> Result<bool> {
    let settings = PoolSettings::load(cli.config.as_deref()).context("failed to load pool settings")?;
    debug!("Loaded settings: {:?}", settings);

    let manager = ConsensusManager::with_postgres(settings);
    if cli.command.needs_link() {
        if let Err(e) = manager.start().await {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!("Continuing without consensus: {}", e);
        }
    }

    let outcome = execute(&manager, cli.command).await;
    manager.shutdown().await;
    outcome
}

async fn execute(manager: &ConsensusManager, command: Command) -> Result<bool> {
    match command {
        Command::Mode => {
            let settings = manager.settings();
            let mode = resolve_mode(settings.consensus.enabled, settings.use_watchdog);
            print_json(&serde_json::json!({ "mode": mode }))?;
            Ok(true)
        }
        Command::Status => {
            let snapshot = manager.snapshot().await;
            print_json(&snapshot)?;
            Ok(snapshot.enabled)
        }
        Command::Leader => {
            let view = LeaderView {
                leader_id: manager.leader_id().await,
                term: manager.term().await,
                state: manager.state().await,
                is_leader: manager.is_leader().await,
            };
            print_json(&view)?;
            Ok(view.leader_id > 0)
        }
        Command::Health => {
            let report = manager.health().await;
            print_json(&report)?;
            Ok(report.status != HealthStatus::Unhealthy)
        }
        Command::FindLeaderBackend => {
            let index = manager.leader_backend().await;
            print_json(&serde_json::json!({ "backend": index }))?;
            Ok(index.is_some())
        }
        Command::AddNode { id, host, port } => {
            let added = manager.add_node(id, &host, port).await;
            print_json(&serde_json::json!({ "node_id": id, "added": added }))?;
            Ok(added)
        }
        Command::RemoveNode { id } => {
            let removed = manager.remove_node(id).await;
            print_json(&serde_json::json!({ "node_id": id, "removed": removed }))?;
            Ok(removed)
        }
        Command::KvGet { key } => {
            let value = manager.get_config(&key).await;
            print_json(&serde_json::json!({ "key": key, "value": value }))?;
            Ok(value.is_some())
        }
        Command::KvPut { key, value } => {
            let stored = manager.put_config(&key, &value).await;
            print_json(&serde_json::json!({ "key": key, "stored": stored }))?;
            Ok(stored)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
