//! Session state for the treasury client
//!
//! [`SessionContext`] is the single source of truth for who is signed in. It
//! drives the login, register, logout and profile-update flows through
//! [`TreasuryClient`](treasury_http::TreasuryClient) and publishes the result
//! on a watch channel for whatever presents it.

#[macro_use]
extern crate tracing;

pub mod context;
pub mod notify;

pub use context::{SESSION_LOG_CONTEXT, SessionContext, SessionState};
pub use notify::{Notification, NotificationKind, Notifier, TracingNotifier};
