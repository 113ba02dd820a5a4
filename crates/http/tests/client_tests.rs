//! Integration tests for the treasury HTTP client

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use treasury_core::{
    CoreError, CoreResult, KeyValueStore, LogFilter, LogLevel, LogStore, MemoryNavigator,
    MemoryStore, Navigator, View,
};
use treasury_http::client::auth::PROFILE_PATH;
use treasury_http::client::{ApiCall, ClientError, TreasuryClient};
use treasury_http::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY};
use treasury_http::types::LoginRequest;
use treasury_http::SessionStore;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    client: TreasuryClient,
    storage: Arc<MemoryStore>,
    logs: Arc<LogStore>,
    navigator: Arc<MemoryNavigator>,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(MemoryNavigator::new(), Duration::from_secs(5)).await
    }

    async fn start_with(navigator: MemoryNavigator, timeout: Duration) -> Self {
        let server = MockServer::start().await;
        let storage = Arc::new(MemoryStore::new());
        let logs = Arc::new(LogStore::with_defaults(storage.clone()));
        let navigator = Arc::new(navigator);

        let client = TreasuryClient::builder()
            .base_url(server.uri())
            .timeout(timeout)
            .credentials(SessionStore::new(storage.clone()))
            .logs(logs.clone())
            .navigator(navigator.clone())
            .build()
            .unwrap();

        Self {
            server,
            client,
            storage,
            logs,
            navigator,
        }
    }

    fn seed(&self, access: Option<&str>, refresh: Option<&str>) {
        if let Some(access) = access {
            self.storage.set(ACCESS_TOKEN_KEY, access).unwrap();
        }
        if let Some(refresh) = refresh {
            self.storage.set(REFRESH_TOKEN_KEY, refresh).unwrap();
        }
        self.storage.set(USER_ID_KEY, "user-1").unwrap();
    }

    fn stored(&self, key: &str) -> Option<String> {
        self.storage.get(key).unwrap()
    }
}

fn profile() -> Value {
    json!({
        "id": "user-1",
        "email": "trader@example.com",
        "role": "individual",
        "status": "active"
    })
}

fn token_pair(access: &str, refresh: &str) -> Value {
    json!({ "accessToken": access, "refreshToken": refresh })
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = TreasuryClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_attaches_stored_access_token() {
    let h = Harness::start().await;
    h.seed(Some("access-1"), Some("refresh-1"));

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile()))
        .expect(1)
        .mount(&h.server)
        .await;

    let me = h.client.me().await.unwrap();
    assert_eq!(me.email, "trader@example.com");
}

#[tokio::test]
async fn test_unauthenticated_without_stored_token() {
    let h = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/securities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let securities: Vec<Value> = h.client.get("/securities").await.unwrap();
    assert!(securities.is_empty());

    let requests = h.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_json_bodies_carry_content_type() {
    let h = Harness::start().await;
    h.seed(Some("access-1"), None);

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "order-1" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let created: Value = h
        .client
        .post("/orders", &json!({ "isin": "GH0000000001", "quantity": 100 }))
        .await
        .unwrap();
    assert_eq!(created["id"], "order-1");
}

#[tokio::test]
async fn test_refreshes_once_and_retries_on_401() {
    let h = Harness::start().await;
    h.seed(Some("old-access"), Some("old-refresh"));

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer old-refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_pair("new-access", "new-refresh")),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile()))
        .expect(1)
        .mount(&h.server)
        .await;

    let me = h.client.me().await.unwrap();
    assert_eq!(me.id, "user-1");
    assert_eq!(h.stored(ACCESS_TOKEN_KEY).as_deref(), Some("new-access"));
    assert_eq!(h.stored(REFRESH_TOKEN_KEY).as_deref(), Some("new-refresh"));
    assert!(h.navigator.history().is_empty());

    let refresh = h
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/auth/refresh")
        .unwrap();
    assert!(refresh.body.is_empty());
}

#[tokio::test]
async fn test_no_refresh_token_propagates_original_401() {
    let h = Harness::start().await;
    h.seed(Some("old-access"), None);

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_pair("a", "r")))
        .expect(0)
        .mount(&h.server)
        .await;

    let result = h.client.me().await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => assert_eq!(message, "Unauthorized"),
        other => panic!("expected original 401, got {other:?}"),
    }
    assert_eq!(h.stored(ACCESS_TOKEN_KEY).as_deref(), Some("old-access"));
}

#[tokio::test]
async fn test_second_401_after_refresh_is_final() {
    let h = Harness::start().await;
    h.seed(Some("old-access"), Some("old-refresh"));

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("still unauthorized"))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_pair("new-access", "new-refresh")),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h.client.me().await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => {
            assert_eq!(message, "still unauthorized");
        }
        other => panic!("expected second 401, got {other:?}"),
    }
    assert_eq!(h.stored(ACCESS_TOKEN_KEY).as_deref(), Some("new-access"));
}

#[tokio::test]
async fn test_refresh_failure_ends_session() {
    let h = Harness::start().await;
    h.seed(Some("old-access"), Some("revoked-refresh"));
    h.logs.set_user(Some("user-1".into()));

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&h.server)
        .await;

    let error = h.client.me().await.unwrap_err();
    assert!(error.is_session_expired());
    match error {
        ClientError::RefreshFailed(inner) => {
            assert!(matches!(*inner, ClientError::AuthenticationFailed(_)));
        }
        other => panic!("expected refresh failure, got {other:?}"),
    }

    assert_eq!(h.stored(ACCESS_TOKEN_KEY), None);
    assert_eq!(h.stored(REFRESH_TOKEN_KEY), None);
    assert_eq!(h.stored(USER_ID_KEY), None);
    assert_eq!(h.logs.user_id(), None);
    assert_eq!(h.navigator.current_view(), Some(View::Login));
}

#[tokio::test]
async fn test_refresh_failure_on_login_view_does_not_navigate() {
    let h = Harness::start_with(MemoryNavigator::starting_at(View::Login), Duration::from_secs(5))
        .await;
    h.seed(Some("old-access"), Some("revoked-refresh"));

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    let error = h.client.me().await.unwrap_err();
    assert!(error.is_session_expired());
    assert_eq!(h.navigator.history(), vec![View::Login]);
}

#[tokio::test]
async fn test_server_errors_are_not_retried() {
    let h = Harness::start().await;
    h.seed(Some("access-1"), Some("refresh-1"));

    Mock::given(method("GET"))
        .and(path("/auctions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_pair("a", "r")))
        .expect(0)
        .mount(&h.server)
        .await;

    let error = h.client.get::<Value>("/auctions").await.unwrap_err();
    assert_eq!(error.status(), Some(503));
    assert!(matches!(error, ClientError::ServerError { .. }));
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let h = Harness::start().await;
    h.seed(Some("access-1"), Some("refresh-1"));

    Mock::given(method("DELETE"))
        .and(path("/admin/announcements/7"))
        .respond_with(ResponseTemplate::new(403).set_body_string("admins only"))
        .expect(1)
        .mount(&h.server)
        .await;

    let error = h
        .client
        .delete::<Value>("/admin/announcements/7")
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::Forbidden(_)));
}

#[tokio::test]
async fn test_timeout_is_reported_and_not_retried() {
    let h = Harness::start_with(MemoryNavigator::new(), Duration::from_millis(200)).await;
    h.seed(Some("access-1"), Some("refresh-1"));

    Mock::given(method("GET"))
        .and(path("/yield-curve"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let error = h.client.get::<Value>("/yield-curve").await.unwrap_err();
    assert!(matches!(error, ClientError::Timeout(_)));

    let failures = h
        .logs
        .get_logs(&LogFilter::new().level(LogLevel::Error).context("api"));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].data.as_ref().unwrap()["status"], Value::Null);
}

#[tokio::test]
async fn test_anonymous_calls_never_refresh() {
    let h = Harness::start().await;
    h.seed(Some("stale-access"), Some("refresh-1"));

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_pair("a", "r")))
        .expect(0)
        .mount(&h.server)
        .await;

    let error = h
        .client
        .login(&LoginRequest::new("trader@example.com", "wrong"))
        .await
        .unwrap_err();
    assert!(error.is_unauthorized());

    let requests = h.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let h = Harness::start().await;
    h.seed(Some("old-access"), Some("old-refresh"));

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_pair("new-access", "new-refresh"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&h.server)
        .await;

    let (bills, bonds) = tokio::join!(
        h.client.get::<Value>("/securities/bills"),
        h.client.get::<Value>("/securities/bonds"),
    );
    assert_eq!(bills.unwrap()["ok"], true);
    assert_eq!(bonds.unwrap()["ok"], true);
    assert_eq!(h.stored(REFRESH_TOKEN_KEY).as_deref(), Some("new-refresh"));
}

#[tokio::test]
async fn test_outcomes_are_logged() {
    let h = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/blog/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1,2,3]"))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such post"))
        .mount(&h.server)
        .await;

    let posts: Vec<u32> = h
        .client
        .send(ApiCall::get("/blog/posts").query("page", 1))
        .await
        .unwrap();
    assert_eq!(posts, [1, 2, 3]);
    let missing = h.client.get::<Value>("/blog/missing").await.unwrap_err();
    assert!(matches!(missing, ClientError::NotFound(_)));

    let entries = h.logs.get_logs(&LogFilter::new().context("api"));
    assert_eq!(entries.len(), 2);

    let success = entries[0].data.as_ref().unwrap();
    assert_eq!(entries[0].level, LogLevel::Info);
    assert_eq!(success["method"], "GET");
    assert_eq!(success["path"], "/blog/posts");
    assert_eq!(success["status"], 200);
    assert_eq!(success["size"], 7);
    assert!(success["durationMs"].is_u64());

    let failure = entries[1].data.as_ref().unwrap();
    assert_eq!(entries[1].level, LogLevel::Error);
    assert_eq!(failure["status"], 404);
    assert!(failure["error"].as_str().unwrap().contains("no such post"));
}

#[tokio::test]
async fn test_refresh_failure_runs_session_end_hooks() {
    let h = Harness::start().await;
    h.seed(Some("old-access"), Some("revoked-refresh"));

    let ended = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ended);
    h.client.on_session_end(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    // Hooks are shared with clones of the client
    let clone = h.client.clone();
    assert!(clone.me().await.unwrap_err().is_session_expired());
    assert_eq!(ended.load(Ordering::SeqCst), 1);
}

/// Storage that refuses to persist a refresh token
struct RefreshRejectingStore {
    inner: MemoryStore,
}

impl KeyValueStore for RefreshRejectingStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        if key == REFRESH_TOKEN_KEY && value != "refresh-1" {
            return Err(CoreError::storage_error("quota exceeded"));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.inner.remove(key)
    }
}

#[tokio::test]
async fn test_unpersisted_refresh_ends_session() {
    let server = MockServer::start().await;
    let storage = Arc::new(RefreshRejectingStore {
        inner: MemoryStore::new(),
    });
    storage.set(ACCESS_TOKEN_KEY, "old-access").unwrap();
    storage.set(REFRESH_TOKEN_KEY, "refresh-1").unwrap();
    storage.set(USER_ID_KEY, "user-1").unwrap();
    let navigator = Arc::new(MemoryNavigator::new());

    let client = TreasuryClient::builder()
        .base_url(server.uri())
        .credentials(SessionStore::new(storage.clone()))
        .navigator(navigator.clone())
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_pair("new-access", "new-refresh")))
        .expect(1)
        .mount(&server)
        .await;

    let error = client.me().await.unwrap_err();
    match error {
        ClientError::RefreshFailed(inner) => {
            assert!(matches!(*inner, ClientError::Storage(_)));
        }
        other => panic!("expected refresh failure, got {other:?}"),
    }

    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(USER_ID_KEY).unwrap(), None);
    assert_eq!(navigator.current_view(), Some(View::Login));
}
