//! Bounded in-process log with a persisted tail

use super::entry::{LogEntry, LogFilter, LogLevel};
use crate::error::{CoreError, CoreResult};
use crate::storage::KeyValueStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Storage key holding the persisted tail
pub const LOGS_STORAGE_KEY: &str = "td_logs";

/// Build flavour, decides whether entries are mirrored to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    /// Maximum entries kept in memory
    pub max_logs: usize,
    /// Number of most recent entries mirrored to storage
    pub persisted_logs: usize,
    pub environment: Environment,
    /// Reported in exports
    pub user_agent: String,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            max_logs: 1000,
            persisted_logs: 100,
            environment: Environment::default(),
            user_agent: format!(
                "treasury-client/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<LogEntry>,
    user_id: Option<String>,
}

/// Append-only, size-bounded record of client events
///
/// Construct one per process and share it as `Arc<LogStore>`. Recording never
/// fails: storage errors while mirroring the tail are reported through
/// `tracing` and otherwise ignored.
pub struct LogStore {
    config: LogStoreConfig,
    storage: Arc<dyn KeyValueStore>,
    state: Mutex<LogState>,
}

impl fmt::Debug for LogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl LogStore {
    /// Create a store, restoring any tail persisted by a previous run
    pub fn new(config: LogStoreConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        let mut entries = restore(storage.as_ref());
        while entries.len() > config.max_logs {
            entries.pop_front();
        }

        Self {
            config,
            storage,
            state: Mutex::new(LogState {
                entries,
                user_id: None,
            }),
        }
    }

    pub fn with_defaults(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::new(LogStoreConfig::default(), storage)
    }

    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// Associate subsequent entries with a user
    pub fn set_user(&self, user_id: Option<String>) {
        self.lock().user_id = user_id;
    }

    pub fn user_id(&self) -> Option<String> {
        self.lock().user_id.clone()
    }

    /// Record an entry
    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
        context: Option<&str>,
    ) {
        let mut state = self.lock();
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data,
            context: context.map(str::to_string),
            user_id: state.user_id.clone(),
        };

        if self.config.environment == Environment::Development {
            mirror_to_console(&entry);
        }

        state.entries.push_back(entry);
        while state.entries.len() > self.config.max_logs {
            state.entries.pop_front();
        }

        self.persist(&state.entries);
    }

    pub fn debug(&self, message: impl Into<String>, data: Option<Value>, context: Option<&str>) {
        self.log(LogLevel::Debug, message, data, context);
    }

    pub fn info(&self, message: impl Into<String>, data: Option<Value>, context: Option<&str>) {
        self.log(LogLevel::Info, message, data, context);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<Value>, context: Option<&str>) {
        self.log(LogLevel::Warn, message, data, context);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>, context: Option<&str>) {
        self.log(LogLevel::Error, message, data, context);
    }

    /// Entries matching `filter`, oldest first
    pub fn get_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let state = self.lock();
        let mut matching: Vec<LogEntry> = state
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit
            && matching.len() > limit
        {
            matching.drain(..matching.len() - limit);
        }
        matching
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drop every entry, in memory and in storage
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        if let Err(e) = self.storage.remove(LOGS_STORAGE_KEY) {
            tracing::warn!(error = %e, "Failed to purge persisted logs");
        }
    }

    /// Full dump as a pretty-printed JSON document
    ///
    /// # Errors
    ///
    /// Returns an error if an entry payload cannot be serialized
    pub fn export(&self) -> CoreResult<String> {
        let logs = self.get_logs(&LogFilter::default());
        let document = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "environment": self.config.environment,
            "userAgent": self.config.user_agent,
            "logs": logs,
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &VecDeque<LogEntry>) {
        let skip = entries.len().saturating_sub(self.config.persisted_logs);
        let tail: Vec<&LogEntry> = entries.iter().skip(skip).collect();

        let result = serde_json::to_string(&tail)
            .map_err(CoreError::from)
            .and_then(|serialized| self.storage.set(LOGS_STORAGE_KEY, &serialized));
        if let Err(e) = result {
            tracing::trace!(error = %e, "Failed to persist log tail");
        }
    }
}

fn restore(storage: &dyn KeyValueStore) -> VecDeque<LogEntry> {
    match storage.get(LOGS_STORAGE_KEY) {
        Ok(Some(serialized)) => match serde_json::from_str::<Vec<LogEntry>>(&serialized) {
            Ok(entries) => entries.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted logs");
                VecDeque::new()
            }
        },
        Ok(None) => VecDeque::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read persisted logs");
            VecDeque::new()
        }
    }
}

fn mirror_to_console(entry: &LogEntry) {
    let prefix = entry.level.console_prefix();
    let context = entry.context.as_deref().unwrap_or("-");
    let data = entry
        .data
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();

    match entry.level {
        LogLevel::Debug => {
            tracing::debug!(target: "treasury::console", context, data = %data, "{prefix} {}", entry.message);
        }
        LogLevel::Info => {
            tracing::info!(target: "treasury::console", context, data = %data, "{prefix} {}", entry.message);
        }
        LogLevel::Warn => {
            tracing::warn!(target: "treasury::console", context, data = %data, "{prefix} {}", entry.message);
        }
        LogLevel::Error => {
            tracing::error!(target: "treasury::console", context, data = %data, "{prefix} {}", entry.message);
        }
    }
}
