//! Session renewal after a 401
//!
//! A call that fails with 401 and has not been retried yet is marked retried,
//! the refresh token is exchanged for a new pair on a request that bypasses
//! the pipeline, and the call is sent exactly once more with the new access
//! token. Whatever that second attempt returns is final.
//!
//! Exchanges are serialised behind `refresh_lock`. A call that waited on the
//! lock while another call rotated the tokens finds a stored access token
//! different from the one it was sent with and retries with that instead of
//! spending the refresh token a second time.

use super::{ApiCall, ClientError, TreasuryClient};
use crate::types::TokenPair;
use serde_json::json;
use std::sync::PoisonError;
use treasury_core::View;

/// Log context tag for session renewal events
pub const AUTH_LOG_CONTEXT: &str = "auth";

impl TreasuryClient {
    pub(super) async fn refresh_and_retry(
        &self,
        mut call: ApiCall,
        unauthorized: ClientError,
    ) -> Result<Vec<u8>, ClientError> {
        call.mark_retried();

        let access_token = self.renew_session(call.bearer(), unauthorized).await?;
        call.set_bearer(access_token);

        self.perform(&mut call).await
    }

    /// Obtain a usable access token, exchanging the refresh token if needed
    async fn renew_session(
        &self,
        stale_token: Option<&str>,
        unauthorized: ClientError,
    ) -> Result<String, ClientError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.credentials.access_token()
            && stale_token != Some(current.as_str())
        {
            debug!("Session already renewed by a concurrent call");
            return Ok(current);
        }

        let Some(refresh_token) = self.credentials.refresh_token() else {
            debug!("No refresh token stored, propagating 401");
            return Err(unauthorized);
        };

        let renewed = match self.exchange_refresh_token(&refresh_token).await {
            // A pair that cannot be persisted leaves a rotated-out refresh token behind
            Ok(tokens) => match self.credentials.store_tokens(&tokens) {
                Ok(()) => Ok(tokens.access_token),
                Err(e) => Err(ClientError::Storage(e)),
            },
            Err(error) => Err(error),
        };

        match renewed {
            Ok(access_token) => {
                info!("Session renewed");
                self.logs
                    .info("Session renewed", None, Some(AUTH_LOG_CONTEXT));
                Ok(access_token)
            }
            Err(error) => {
                warn!(error = %error, "Session renewal failed, ending session");
                self.logs.error(
                    "Session renewal failed",
                    Some(json!({ "error": error.to_string() })),
                    Some(AUTH_LOG_CONTEXT),
                );
                self.end_session();
                Err(ClientError::RefreshFailed(Box::new(error)))
            }
        }
    }

    /// Exchange a refresh token for a new pair
    ///
    /// Sent directly on the underlying HTTP client: no stored credentials, no
    /// pipeline logging, no refresh-on-401.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let response = self
            .client
            .post(self.url(&self.refresh_path))
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ClientError::from_status(status, message));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Drop every stored credential, notify session-end hooks and send the
    /// user to the login view
    fn end_session(&self) {
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear credentials");
        }
        self.logs.set_user(None);

        let hooks = self
            .session_end_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in hooks {
            hook();
        }

        if self.navigator.current_view() != Some(View::Login) {
            self.navigator.navigate(View::Login);
        }
    }
}
