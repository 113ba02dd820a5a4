//! Treasury HTTP client
//!
//! Every call goes through one pipeline: attach the stored access token,
//! dispatch, log the outcome, and on a first 401 renew the session and retry
//! once (see `refresh.rs`).

pub mod auth;
pub mod call;
pub mod config;
pub mod error;
mod refresh;

pub use call::ApiCall;
pub use config::ClientConfig;
pub use error::ClientError;
pub use refresh::AUTH_LOG_CONTEXT;

use crate::credentials::SessionStore;
use reqwest::{Client, ClientBuilder, Method, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use treasury_core::{LogStore, MemoryNavigator, MemoryStore, Navigator};

/// Log context tag for request outcomes
pub const API_LOG_CONTEXT: &str = "api";

/// Callback run when a failed refresh ends the session
pub type SessionEndHook = Arc<dyn Fn() + Send + Sync>;

/// Treasury API client
#[derive(Clone)]
pub struct TreasuryClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    refresh_path: String,
    credentials: SessionStore,
    logs: Arc<LogStore>,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Arc<Mutex<()>>,
    session_end_hooks: Arc<std::sync::Mutex<Vec<SessionEndHook>>>,
}

impl std::fmt::Debug for TreasuryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreasuryClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("refresh_path", &self.refresh_path)
            .finish_non_exhaustive()
    }
}

impl TreasuryClient {
    /// Create a new client with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> TreasuryClientBuilder {
        TreasuryClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn credentials(&self) -> &SessionStore {
        &self.credentials
    }

    pub const fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub const fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Run `hook` whenever a failed refresh ends the session
    ///
    /// Hooks are shared by every clone of the client and run after the
    /// credentials are cleared, before navigation to the login view.
    pub fn on_session_end(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.session_end_hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Send a call through the pipeline and decode the JSON response
    ///
    /// An empty response body decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the final attempt, or
    /// [`ClientError::RefreshFailed`] if the session could not be renewed
    pub async fn send<T: DeserializeOwned>(&self, call: ApiCall) -> Result<T, ClientError> {
        let body = self.dispatch(call).await?;
        decode(&body)
    }

    /// GET `path`
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send)
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiCall::get(path)).await
    }

    /// POST `body` to `path`
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send)
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiCall::post(path).json(body)?).await
    }

    /// PUT `body` to `path`
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send)
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiCall::put(path).json(body)?).await
    }

    /// PATCH `path` with `body`
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send)
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiCall::patch(path).json(body)?).await
    }

    /// DELETE `path`
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send)
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiCall::delete(path)).await
    }

    async fn dispatch(&self, mut call: ApiCall) -> Result<Vec<u8>, ClientError> {
        if !call.is_anonymous()
            && let Some(token) = self.credentials.access_token()
        {
            call.set_bearer(token);
        }

        match self.perform(&mut call).await {
            Err(error) if error.is_unauthorized() && !call.is_anonymous() && !call.is_retried() => {
                self.refresh_and_retry(call, error).await
            }
            result => result,
        }
    }

    /// Single attempt: stamp, send, log
    async fn perform(&self, call: &mut ApiCall) -> Result<Vec<u8>, ClientError> {
        call.stamp();

        let mut request = self
            .client
            .request(call.method().clone(), self.url(call.path()));
        if !call.query_pairs().is_empty() {
            request = request.query(call.query_pairs());
        }
        if let Some(token) = call.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = call.body() {
            request = request.json(body);
        }

        let result = match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.bytes().await {
                        Ok(body) => Ok((status, body.to_vec())),
                        Err(e) => Err((Some(status), self.transport_error(e))),
                    }
                } else {
                    let message = response.text().await.unwrap_or_else(|_| status.to_string());
                    Err((Some(status), ClientError::from_status(status, message)))
                }
            }
            Err(e) => Err((None, self.transport_error(e))),
        };

        match result {
            Ok((status, body)) => {
                self.log_success(call, status, body.len());
                Ok(body)
            }
            Err((status, error)) => {
                self.log_failure(call, status, &error);
                Err(error)
            }
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Request(error)
        }
    }

    fn log_success(&self, call: &ApiCall, status: StatusCode, size: usize) {
        let duration_ms = elapsed_ms(call);
        debug!(
            method = %call.method(),
            path = call.path(),
            status = status.as_u16(),
            duration_ms,
            size,
            "API call succeeded"
        );
        self.logs.info(
            format!("{} {} {}", call.method(), call.path(), status.as_u16()),
            Some(json!({
                "method": call.method().as_str(),
                "path": call.path(),
                "status": status.as_u16(),
                "durationMs": duration_ms,
                "size": size,
                "retried": call.is_retried(),
            })),
            Some(API_LOG_CONTEXT),
        );
    }

    fn log_failure(&self, call: &ApiCall, status: Option<StatusCode>, error: &ClientError) {
        let duration_ms = elapsed_ms(call);
        let status = status.map(|s| s.as_u16());
        debug!(
            method = %call.method(),
            path = call.path(),
            ?status,
            duration_ms,
            error = %error,
            "API call failed"
        );
        self.logs.error(
            format!("{} {} failed", call.method(), call.path()),
            Some(json!({
                "method": call.method().as_str(),
                "path": call.path(),
                "status": status,
                "durationMs": duration_ms,
                "error": error.to_string(),
                "retried": call.is_retried(),
            })),
            Some(API_LOG_CONTEXT),
        );
    }
}

fn elapsed_ms(call: &ApiCall) -> u64 {
    u64::try_from(call.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Builder for [`TreasuryClient`]
#[derive(Default)]
pub struct TreasuryClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    refresh_path: Option<String>,
    credentials: Option<SessionStore>,
    logs: Option<Arc<LogStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl TreasuryClientBuilder {
    /// Start from a loaded [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::default()
            .base_url(&config.api_url)
            .timeout(config.timeout())
            .refresh_path(&config.refresh_path);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Override the refresh endpoint path
    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Credential store; defaults to an in-memory one
    #[must_use]
    pub fn credentials(mut self, credentials: SessionStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Shared log store; defaults to a private in-memory one
    #[must_use]
    pub fn logs(mut self, logs: Arc<LogStore>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Navigator used when a session ends; defaults to [`MemoryNavigator`]
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or invalid, or the
    /// underlying HTTP client cannot be constructed
    pub fn build(self) -> Result<TreasuryClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url '{base_url}': {e}")))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        let timeout = self
            .timeout
            .unwrap_or_else(|| ClientConfig::default().timeout());

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = ClientBuilder::new()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| format!("treasury-client/{}", env!("CARGO_PKG_VERSION"))),
            )
            .build()?;

        let credentials = self.credentials.unwrap_or_default();
        let logs = self
            .logs
            .unwrap_or_else(|| Arc::new(LogStore::with_defaults(Arc::new(MemoryStore::new()))));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(MemoryNavigator::new()));

        Ok(TreasuryClient {
            client,
            base_url,
            timeout,
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| config::DEFAULT_REFRESH_PATH.to_string()),
            credentials,
            logs,
            navigator,
            refresh_lock: Arc::new(Mutex::new(())),
            session_end_hooks: Arc::default(),
        })
    }
}

/// Method helper so callers do not need a direct reqwest dependency
pub fn method(name: &str) -> Result<Method, ClientError> {
    Method::from_bytes(name.to_ascii_uppercase().as_bytes())
        .map_err(|e| ClientError::Configuration(format!("invalid HTTP method '{name}': {e}")))
}
