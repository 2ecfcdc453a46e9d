//! companion: command-line client for the Travel Companion trip planner
//!
//! Stands in for the browser front end: it restores the persisted session,
//! turns a subcommand into one user intent against the client core, and
//! prints the resulting notices and data.

mod cli;
mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use companion_client::{JsonFileStore, Notifier, ReqwestBackend, SessionState, SessionStore, TracingNotifier};
use tracing::{debug, info};

use cli::Commands;
use config::Config;
use console::ConsoleNotifier;

#[derive(Parser)]
#[command(name = "companion")]
#[command(about = "Plan trips, places and packing lists from the terminal")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "companion.toml")]
    config: PathBuf,

    /// API base URL (overrides config file)
    #[arg(long, env = companion_client::config::API_URL_ENV)]
    api_url: Option<String>,

    /// Directory for persisted session data (overrides config file)
    #[arg(short, long, env = "COMPANION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Send notices to the log instead of the terminal
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("companion=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(api_url) = cli.api_url {
        config.client.base_url = api_url;
    }
    if let Some(data_dir) = cli.data_dir {
        config.session.data_dir = data_dir;
    }
    config.client.validate()?;
    debug!(base_url = %config.client.base_url, data_dir = %config.session.data_dir.display(), "Configuration loaded");

    let notifier: Arc<dyn Notifier> = if cli.quiet {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    };

    let session = open_session(&config, notifier.clone())?;
    let state = session.init()?;
    info!(authenticated = !matches!(state, SessionState::Unauthenticated), "Session ready");

    let _expired = session.on_reauth_required(|| {
        eprintln!("Session expired. Please log in again with `companion login <username>`.");
    });

    match cli::execute_command(&session, notifier, cli.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            if cli::is_reported(&e) {
                debug!(error = %e, "Command failed");
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

fn open_session(config: &Config, notifier: Arc<dyn Notifier>) -> anyhow::Result<SessionStore> {
    std::fs::create_dir_all(&config.session.data_dir)?;
    let storage = JsonFileStore::open(config.session_file())?;
    let backend = ReqwestBackend::from_config(&config.client)?;
    Ok(SessionStore::new(
        &config.client,
        Arc::new(backend),
        Arc::new(storage),
        notifier,
    ))
}
