//! Views the session layer can send the user to

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Top-level views reachable from session flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Login,
    Dashboard,
    Onboarding,
}

impl View {
    /// Route path of the view
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Dashboard => "/dashboard",
            Self::Onboarding => "/onboarding",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Navigation seam used by the HTTP client and the session context
pub trait Navigator: Send + Sync {
    /// The view currently shown, if known
    fn current_view(&self) -> Option<View>;

    /// Switch to `view`
    fn navigate(&self, view: View);
}

/// Navigator that only records where it has been sent
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    history: Mutex<Vec<View>>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on `view` without counting it as a navigation
    pub fn starting_at(view: View) -> Self {
        Self {
            history: Mutex::new(vec![view]),
        }
    }

    /// Every view visited, oldest first
    pub fn history(&self) -> Vec<View> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_view(&self) -> Option<View> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    fn navigate(&self, view: View) {
        tracing::debug!(view = %view, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view);
    }
}
