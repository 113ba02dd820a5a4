//! Structured client-side event log
//!
//! [`LogStore`] keeps a bounded, ordered record of events (oldest evicted
//! first) and mirrors the most recent entries into a [`KeyValueStore`] so they
//! survive a restart. In development builds every entry is also echoed to the
//! console through `tracing`.
//!
//! [`KeyValueStore`]: crate::storage::KeyValueStore

mod entry;
mod store;

pub use entry::{LogEntry, LogFilter, LogLevel};
pub use store::{Environment, LOGS_STORAGE_KEY, LogStore, LogStoreConfig};
