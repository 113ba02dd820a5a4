//! Tracing subscriber setup shared by treasury binaries

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::{init_default, init_tracing};
