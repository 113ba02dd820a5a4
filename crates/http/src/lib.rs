//! Treasury HTTP client
//!
//! [`TreasuryClient`](client::TreasuryClient) attaches stored bearer
//! credentials to every call, records each outcome in the shared
//! [`LogStore`](treasury_core::LogStore), and renews an expired session once
//! per call before retrying it.

#[macro_use]
extern crate tracing;

pub mod client;
pub mod credentials;
pub mod types;

pub use client::{ApiCall, ClientConfig, ClientError, TreasuryClient, TreasuryClientBuilder};
pub use credentials::SessionStore;
