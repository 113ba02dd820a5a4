//! Treasury CLI - terminal client for the Constant Treasury API

mod commands;
mod logging;
mod state_dir;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use commands::{Commands, Runtime};
use state_dir::StateDir;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug, error};
use treasury_core::{FileStore, LogStore, MemoryNavigator};
use treasury_http::{ClientConfig, SessionStore, TreasuryClientBuilder};
use treasury_session::SessionContext;

#[derive(Parser)]
#[command(name = "treasury")]
#[command(about = "Terminal client for the Constant Treasury API")]
#[command(version)]
struct Cli {
    /// Base URL of the treasury API
    #[arg(long, global = true, env = "TREASURY_API_URL")]
    api_url: Option<String>,

    /// Directory holding the stored session and client log
    #[arg(short = 'd', long, global = true, env = "TREASURY_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Request timeout in seconds
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into())?;

    let state_dir = StateDir::from_flag(cli.state_dir);
    let runtime = build_runtime(&state_dir, cli.api_url, cli.timeout)?;

    if let Err(e) = cli.command.execute(&runtime).await {
        error!("Command failed: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn build_runtime(
    state_dir: &StateDir,
    api_url: Option<String>,
    timeout: Option<u64>,
) -> Result<Runtime> {
    let mut config = match state_dir.config_file() {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            ClientConfig::from_file(&path)?
        }
        None => ClientConfig::from_env()?,
    };
    if let Some(api_url) = api_url {
        config.api_url = api_url;
    }
    if let Some(timeout) = timeout {
        config.timeout_secs = timeout;
    }

    state_dir.ensure_data_dir()?;
    let storage_path = state_dir.storage_path();
    let storage = Arc::new(
        FileStore::open(&storage_path)
            .with_context(|| format!("Failed to open {}", storage_path.display()))?,
    );

    let logs = Arc::new(LogStore::new(config.logs.clone(), storage.clone()));
    let navigator = Arc::new(MemoryNavigator::new());

    let client = TreasuryClientBuilder::from_config(&config)
        .credentials(SessionStore::new(storage))
        .logs(logs.clone())
        .navigator(navigator.clone())
        .build()?;

    Ok(Runtime {
        session: SessionContext::new(client),
        logs,
        navigator,
    })
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
