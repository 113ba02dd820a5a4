//! Session context and auth flows

use crate::notify::{Notification, Notifier, TracingNotifier};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use treasury_core::View;
use treasury_http::types::{
    AuthResponse, LoginRequest, ProfileUpdate, RegisterRequest, UserProfile,
};
use treasury_http::{ClientError, TreasuryClient};

/// Log context tag for session flows
pub const SESSION_LOG_CONTEXT: &str = "session";

/// Session state as seen by the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    /// True until [`SessionContext::initialize`] has finished
    pub is_loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true, // Start with loading until stored credentials are checked
        }
    }
}

impl SessionState {
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Owner of the signed-in user and the four session-mutating operations
pub struct SessionContext {
    client: TreasuryClient,
    notifier: Arc<dyn Notifier>,
    state_tx: Arc<watch::Sender<SessionState>>,
}

impl SessionContext {
    /// Take ownership of `client` and follow the sessions it ends
    pub fn new(client: TreasuryClient) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        let state_tx = Arc::new(state_tx);

        let ended = Arc::clone(&state_tx);
        client.on_session_end(move || {
            debug!("Session ended by the client, dropping profile");
            ended.send_modify(|state| state.user = None);
        });

        Self {
            client,
            notifier: Arc::new(TracingNotifier),
            state_tx,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub const fn client(&self) -> &TreasuryClient {
        &self.client
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state_tx.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_tx.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state_tx.borrow().is_loading
    }

    /// Load the profile for a stored session, if there is one
    ///
    /// Failures are not surfaced: an unusable stored session is discarded and
    /// the context settles as signed out.
    pub async fn initialize(&self) -> Option<UserProfile> {
        if self.client.credentials().access_token().is_none() {
            debug!("No stored session");
            self.state_tx.send_modify(|state| state.is_loading = false);
            return None;
        }

        match self.client.me().await {
            Ok(profile) => {
                self.client.logs().set_user(Some(profile.id.clone()));
                self.client.logs().info(
                    "Restored stored session",
                    Some(json!({ "userId": profile.id })),
                    Some(SESSION_LOG_CONTEXT),
                );
                self.state_tx.send_modify(|state| {
                    state.user = Some(profile.clone());
                    state.is_loading = false;
                });
                Some(profile)
            }
            Err(error) => {
                warn!(error = %error, "Stored session rejected");
                self.client.logs().warn(
                    "Stored session rejected",
                    Some(json!({ "error": error.to_string() })),
                    Some(SESSION_LOG_CONTEXT),
                );
                self.discard_session();
                self.state_tx.send_modify(|state| state.is_loading = false);
                None
            }
        }
    }

    /// Sign in and go to the dashboard
    ///
    /// # Errors
    ///
    /// Returns the failing call's error; no credentials are left behind
    pub async fn login(&self, credentials: &LoginRequest) -> Result<UserProfile, ClientError> {
        let result = match self.client.login(credentials).await {
            Ok(auth) => self.establish(auth).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(profile) => {
                self.client.logs().info(
                    "Logged in",
                    Some(json!({ "userId": profile.id })),
                    Some(SESSION_LOG_CONTEXT),
                );
                self.notifier.notify(Notification::success(format!(
                    "Welcome back, {}",
                    profile.display_name()
                )));
                self.client.navigator().navigate(View::Dashboard);
                Ok(profile)
            }
            Err(error) => {
                self.fail("Login", &error);
                Err(error)
            }
        }
    }

    /// Create an account and go to onboarding
    ///
    /// # Errors
    ///
    /// Returns the failing call's error; no credentials are left behind
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError> {
        let result = match self.client.register(request).await {
            Ok(auth) => self.establish(auth).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(profile) => {
                self.client.logs().info(
                    "Registered",
                    Some(json!({ "userId": profile.id })),
                    Some(SESSION_LOG_CONTEXT),
                );
                self.notifier
                    .notify(Notification::success("Account created"));
                self.client.navigator().navigate(View::Onboarding);
                Ok(profile)
            }
            Err(error) => {
                self.fail("Registration", &error);
                Err(error)
            }
        }
    }

    /// Sign out locally, telling the backend on a best-effort basis
    pub async fn logout(&self) {
        if let Err(error) = self.client.logout().await {
            warn!(error = %error, "Backend logout failed, clearing local session anyway");
            self.client.logs().warn(
                "Backend logout failed",
                Some(json!({ "error": error.to_string() })),
                Some(SESSION_LOG_CONTEXT),
            );
        }

        self.client
            .logs()
            .info("Logged out", None, Some(SESSION_LOG_CONTEXT));
        self.discard_session();
        self.notifier.notify(Notification::info("Signed out"));

        let navigator = self.client.navigator();
        if navigator.current_view() != Some(View::Login) {
            navigator.navigate(View::Login);
        }
    }

    /// Apply a partial profile update
    ///
    /// # Errors
    ///
    /// Returns the call's error. The current profile is left untouched
    /// unless the session could not be renewed, in which case it is dropped
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ClientError> {
        match self.client.update_profile(update).await {
            Ok(profile) => {
                self.state_tx
                    .send_modify(|state| state.user = Some(profile.clone()));
                self.notifier.notify(Notification::success("Profile updated"));
                Ok(profile)
            }
            Err(error) => {
                self.client.logs().error(
                    "Profile update failed",
                    Some(json!({ "error": error.to_string() })),
                    Some(SESSION_LOG_CONTEXT),
                );
                if error.is_session_expired() {
                    self.discard_session();
                }
                self.notifier
                    .notify(Notification::from_error("Profile update", &error));
                Err(error)
            }
        }
    }

    /// Persist a fresh token pair and load the profile it belongs to
    async fn establish(&self, auth: AuthResponse) -> Result<UserProfile, ClientError> {
        let credentials = self.client.credentials();
        credentials.store_tokens(&auth.tokens)?;

        let profile = self.client.me().await?;
        credentials.set_user_id(&profile.id)?;
        self.client.logs().set_user(Some(profile.id.clone()));

        self.state_tx.send_modify(|state| {
            state.user = Some(profile.clone());
            state.is_loading = false;
        });
        Ok(profile)
    }

    fn fail(&self, action: &str, error: &ClientError) {
        self.client.logs().error(
            format!("{action} failed"),
            Some(json!({ "error": error.to_string(), "status": error.status() })),
            Some(SESSION_LOG_CONTEXT),
        );
        self.discard_session();
        self.notifier
            .notify(Notification::from_error(action, error));
    }

    fn discard_session(&self) {
        if let Err(e) = self.client.credentials().clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        self.client.logs().set_user(None);
        self.state_tx.send_modify(|state| state.user = None);
    }
}
