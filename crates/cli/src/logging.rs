use anyhow::Result;
use tracing::Level;
use treasury_core::tracing::{InstrumentationConfig, init_tracing};

/// Crates whose events the CLI shows at the requested level
const CRATES: [&str; 5] = [
    "treasury",
    "treasury_cli",
    "treasury_core",
    "treasury_http",
    "treasury_session",
];

/// Initialize logging for the CLI
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: Level) -> Result<()> {
    let mut config = InstrumentationConfig::from_env();
    config.service_name = "treasury-cli".to_string();
    config.log_level = filter_for(level);
    config.with_target = level >= Level::DEBUG;

    init_tracing(&config)
}

fn filter_for(level: Level) -> String {
    let level_str = level.as_str().to_lowercase();
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level_str}"))
        .collect::<Vec<_>>()
        .join(",")
}
