//! CLI commands

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use treasury_core::{LogFilter, LogLevel, LogStore, MemoryNavigator, Navigator};
use treasury_http::client::{self, ApiCall};
use treasury_http::types::{AccountRole, LoginRequest, ProfileUpdate, RegisterRequest};
use treasury_session::SessionContext;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long, env = "TREASURY_EMAIL")]
        email: String,

        #[arg(long, env = "TREASURY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and store its session
    Register {
        #[arg(long)]
        email: String,

        #[arg(long, env = "TREASURY_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long, value_enum)]
        account_type: Option<AccountType>,
    },

    /// End the stored session
    Logout,

    /// Show the signed-in user's profile
    Whoami,

    /// Change profile fields
    UpdateProfile {
        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Send an arbitrary call through the authenticated client
    Call {
        /// HTTP method, e.g. GET or POST
        method: String,

        /// Path relative to the API URL
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Inspect the client log
    Logs {
        #[command(subcommand)]
        command: LogsCommands,
    },
}

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Print recorded entries as JSON lines
    List {
        /// debug, info, warn or error
        #[arg(long)]
        level: Option<LogLevel>,

        /// Only entries with this context tag (e.g. api, auth, session)
        #[arg(long)]
        context: Option<String>,

        /// Only the most recent N matching entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write the full log export document
    Export {
        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete every recorded entry
    Clear,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AccountType {
    Individual,
    Institutional,
}

impl From<AccountType> for AccountRole {
    fn from(account_type: AccountType) -> Self {
        match account_type {
            AccountType::Individual => Self::Individual,
            AccountType::Institutional => Self::Institutional,
        }
    }
}

/// What a command runs against
pub struct Runtime {
    pub session: SessionContext,
    pub logs: Arc<LogStore>,
    pub navigator: Arc<MemoryNavigator>,
}

impl Commands {
    pub async fn execute(self, runtime: &Runtime) -> Result<()> {
        let session = &runtime.session;

        match self {
            Commands::Login { email, password } => {
                let user = session
                    .login(&LoginRequest::new(email, password))
                    .await
                    .context("Login failed")?;
                println!("Signed in as {}", user.display_name());
                print_view(runtime);
                Ok(())
            }
            Commands::Register {
                email,
                password,
                first_name,
                last_name,
                account_type,
            } => {
                let request = RegisterRequest {
                    email,
                    password,
                    first_name,
                    last_name,
                    account_type: account_type.map(Into::into),
                };
                let user = session
                    .register(&request)
                    .await
                    .context("Registration failed")?;
                println!("Registered {}", user.email);
                print_view(runtime);
                Ok(())
            }
            Commands::Logout => {
                session.logout().await;
                println!("Signed out");
                Ok(())
            }
            Commands::Whoami => {
                let Some(user) = session.initialize().await else {
                    bail!("Not signed in");
                };
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            }
            Commands::UpdateProfile {
                email,
                first_name,
                last_name,
                phone,
            } => {
                let update = ProfileUpdate {
                    email,
                    first_name,
                    last_name,
                    phone,
                };
                if update.is_empty() {
                    bail!("Nothing to update, pass at least one field");
                }
                if session.initialize().await.is_none() {
                    bail!("Not signed in");
                }
                let user = session
                    .update_profile(&update)
                    .await
                    .context("Profile update failed")?;
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            }
            Commands::Call { method, path, body } => {
                let mut call = ApiCall::new(client::method(&method)?, path);
                if let Some(body) = body {
                    let body: Value =
                        serde_json::from_str(&body).context("Body is not valid JSON")?;
                    call = call.json(&body)?;
                }
                let response: Value = session.client().send(call).await?;
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            Commands::Logs { command } => command.execute(&runtime.logs),
        }
    }
}

impl LogsCommands {
    pub fn execute(self, logs: &LogStore) -> Result<()> {
        match self {
            LogsCommands::List {
                level,
                context,
                limit,
            } => {
                let mut filter = LogFilter::new();
                if let Some(level) = level {
                    filter = filter.level(level);
                }
                if let Some(context) = context {
                    filter = filter.context(context);
                }
                if let Some(limit) = limit {
                    filter = filter.limit(limit);
                }

                for entry in logs.get_logs(&filter) {
                    println!("{}", serde_json::to_string(&entry)?);
                }
                Ok(())
            }
            LogsCommands::Export { output } => {
                let document = logs.export()?;
                match output {
                    Some(path) => {
                        std::fs::write(&path, document)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Exported {} entries to {}", logs.len(), path.display());
                    }
                    None => println!("{document}"),
                }
                Ok(())
            }
            LogsCommands::Clear => {
                logs.clear();
                println!("Cleared client log");
                Ok(())
            }
        }
    }
}

fn print_view(runtime: &Runtime) {
    if let Some(view) = runtime.navigator.current_view() {
        println!("Continue at {view}");
    }
}
