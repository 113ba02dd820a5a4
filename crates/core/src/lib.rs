//! Treasury core types and utilities

pub mod error;
pub mod logs;
pub mod navigation;
pub mod storage;
#[cfg(feature = "subscriber")]
pub mod tracing;

pub use error::{CoreError, CoreResult};
pub use logs::{Environment, LogEntry, LogFilter, LogLevel, LogStore, LogStoreConfig};
pub use navigation::{MemoryNavigator, Navigator, View};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
