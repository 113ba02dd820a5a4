//! Transient user notifications

use treasury_http::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Info,
    Error,
}

/// A short-lived message for the user, one per finished operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    /// Error notification with a user-facing description of `error`
    pub fn from_error(action: &str, error: &ClientError) -> Self {
        Self::error(format!("{action} failed: {}", user_friendly_error(error)))
    }
}

/// Where notifications are shown
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success | NotificationKind::Info => {
                info!(target: "treasury::notify", "{}", notification.message);
            }
            NotificationKind::Error => {
                error!(target: "treasury::notify", "{}", notification.message);
            }
        }
    }
}

/// Convert client errors to user-friendly messages
///
/// Server-provided messages for 400s are passed through as-is.
pub fn user_friendly_error(error: &ClientError) -> String {
    match error {
        ClientError::AuthenticationFailed(_) => "your credentials were not accepted".to_string(),
        ClientError::RefreshFailed(_) => "your session has expired, please sign in again".to_string(),
        ClientError::Timeout(_) => "the server took too long to respond".to_string(),
        ClientError::Request(_) => "the server could not be reached".to_string(),
        ClientError::Forbidden(_) => "you do not have permission to do that".to_string(),
        ClientError::BadRequest(message) if !message.trim().is_empty() => message.clone(),
        other => other.to_string(),
    }
}
