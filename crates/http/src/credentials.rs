//! Session credential storage
//!
//! The access token, refresh token and user id live under fixed keys of a
//! [`KeyValueStore`]. Every component that needs them goes through
//! [`SessionStore`] so reads and writes happen in one place.

use crate::types::TokenPair;
use std::sync::Arc;
use treasury_core::{CoreResult, KeyValueStore, MemoryStore};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_ID_KEY: &str = "userId";

/// Typed view over the credential keys of a [`KeyValueStore`]
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.access_token().is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// The underlying storage, shared with the log store in most setups
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.storage)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn user_id(&self) -> Option<String> {
        self.read(USER_ID_KEY)
    }

    /// Persist both halves of a freshly issued pair
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend rejects the write
    pub fn store_tokens(&self, tokens: &TokenPair) -> CoreResult<()> {
        self.storage.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)
    }

    /// # Errors
    ///
    /// Returns an error if the storage backend rejects the write
    pub fn set_user_id(&self, user_id: &str) -> CoreResult<()> {
        self.storage.set(USER_ID_KEY, user_id)
    }

    /// Remove all three credential keys
    ///
    /// Every key is attempted even if an earlier removal fails.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered
    pub fn clear(&self) -> CoreResult<()> {
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove credential");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read credential");
                None
            }
        }
    }
}
