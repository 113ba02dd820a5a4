//! Authentication and profile endpoints

use super::{ApiCall, ClientError, TreasuryClient};
use crate::types::{AuthResponse, LoginRequest, ProfileUpdate, RegisterRequest, UserProfile};
use serde::de::IgnoredAny;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/users/me";

impl TreasuryClient {
    /// Exchange credentials for a token pair
    ///
    /// Sent anonymously: a 401 here means bad credentials, not an expired
    /// session.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the call
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let call = ApiCall::post(LOGIN_PATH).json(credentials)?.anonymous();
        self.send(call).await
    }

    /// Create an account and receive its first token pair
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the call
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let call = ApiCall::post(REGISTER_PATH).json(request)?.anonymous();
        self.send(call).await
    }

    /// Invalidate the session server-side; the response body is ignored
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the call
    pub async fn logout(&self) -> Result<(), ClientError> {
        let _: IgnoredAny = self.send(ApiCall::post(LOGOUT_PATH)).await?;
        Ok(())
    }

    /// Fetch the signed-in user's profile
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the call
    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        self.get(PROFILE_PATH).await
    }

    /// Apply a partial update and return the server's view of the profile
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the call
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ClientError> {
        self.patch(PROFILE_PATH, update).await
    }
}
