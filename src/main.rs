//! Telegram relay CLI - main entry point
//!
//! Relays new posts from a source channel to a set of groups.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use tg_relay::commands::{self, RunOptions};
use tg_relay::{metrics, Config};

#[derive(Parser)]
#[command(name = "tg_relay")]
#[command(about = "Relay Telegram channel posts to groups", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the source channel and relay new posts (default)
    Run {
        /// Log messages instead of sending them
        #[arg(long, env = "RELAY_DRY_RUN", default_value_t = false)]
        dry_run: bool,
    },

    /// Log in and create the session file
    InitSession,

    /// List discoverable groups and mark configured destinations
    ListGroups {
        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::InitSession => "init_session",
            Commands::ListGroups { .. } => "list_groups",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    Config::load_dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tg_relay=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return Err(err.into());
        }
    };

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command = cli.command.unwrap_or(Commands::Run { dry_run: false });
    let command_name = command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(command, &config).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    if let Err(err) = &result {
        error!(command = command_name, "{}", err);
    }
    result
}

async fn execute_command(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Run { dry_run } => {
            commands::relay::run(config, RunOptions { dry_run }).await?;
        }
        Commands::InitSession => {
            commands::init_session::run(config).await?;
        }
        Commands::ListGroups { json } => {
            commands::list_groups::run(config, json).await?;
        }
    }
    Ok(())
}
