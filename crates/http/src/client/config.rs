//! Client configuration

use super::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use treasury_core::LogStoreConfig;

/// API address used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path of the token refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Settings for [`TreasuryClient`](super::TreasuryClient) and its log store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the treasury API
    pub api_url: String,
    /// Flat timeout applied to every call
    pub timeout_secs: u64,
    /// Refresh endpoint, relative to `api_url`
    pub refresh_path: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub logs: LogStoreConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            user_agent: None,
            logs: LogStoreConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file, with `TREASURY_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let settings = Self::defaults()?
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration with defaults and environment variables
    ///
    /// `TREASURY_API_URL`, `TREASURY_TIMEOUT_SECS` and nested keys such as
    /// `TREASURY_LOGS__MAX_LOGS` are honoured.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ClientError> {
        let settings = Self::defaults()?.add_source(environment()).build()?;

        Ok(settings.try_deserialize()?)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ClientError> {
        let defaults = Self::default();

        Ok(config::Config::builder()
            .set_default("api_url", defaults.api_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("refresh_path", defaults.refresh_path)?
            .set_default("logs.max_logs", defaults.logs.max_logs as u64)?
            .set_default("logs.persisted_logs", defaults.logs.persisted_logs as u64)?
            .set_default("logs.environment", defaults.logs.environment.as_str())?
            .set_default("logs.user_agent", defaults.logs.user_agent)?)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("TREASURY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
