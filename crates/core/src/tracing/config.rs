//! Configuration for tracing output

use serde::{Deserialize, Serialize};

/// Main instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Service name reported in structured output
    pub service_name: String,
    /// Log level filter (e.g., "info", "debug", "treasury_http=trace")
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Include the event target in each line
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

const fn default_with_target() -> bool {
    true
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "treasury".to_string(),
            log_level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl InstrumentationConfig {
    /// Create configuration from environment variables
    ///
    /// Supports the following environment variables:
    /// - `TREASURY_SERVICE_NAME`: Service name
    /// - `RUST_LOG`: Log level filter
    /// - `TREASURY_LOG_FORMAT`: `json` for JSON lines
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let service_name =
            std::env::var("TREASURY_SERVICE_NAME").unwrap_or(defaults.service_name);
        let log_level = std::env::var("RUST_LOG").unwrap_or(defaults.log_level);
        let json = std::env::var("TREASURY_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            service_name,
            log_level,
            json,
            with_target: defaults.with_target,
        }
    }

    /// Create a configuration with an explicit level filter
    pub fn with_level(log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            ..Self::default()
        }
    }
}
