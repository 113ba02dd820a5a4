//! Per-call descriptor carried through the request pipeline

use super::ClientError;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// One logical API call
///
/// The descriptor is owned by the pipeline for the whole life of the call,
/// including its single retry. `retried` is what stops a second 401 from
/// starting another refresh.
#[derive(Debug, Clone)]
pub struct ApiCall {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    bearer: Option<String>,
    anonymous: bool,
    retried: bool,
    started_at: Option<Instant>,
}

impl ApiCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            anonymous: false,
            retried: false,
            started_at: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Send without credentials and never attempt a session refresh
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Access token the call was (or will be) sent with
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub const fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    /// Time since the most recent dispatch, zero if never dispatched
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub(crate) fn set_bearer(&mut self, token: String) {
        self.bearer = Some(token);
    }

    pub(crate) const fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub(crate) fn stamp(&mut self) {
        self.started_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_call_with_body_and_query() {
        let call = ApiCall::post("/orders")
            .query("dryRun", true)
            .json(&json!({ "isin": "GH0000000001", "quantity": 10 }))
            .unwrap();

        assert_eq!(call.method(), &Method::POST);
        assert_eq!(call.path(), "/orders");
        assert_eq!(call.query_pairs(), [("dryRun".to_string(), "true".to_string())]);
        assert_eq!(call.body().unwrap()["quantity"], 10);
        assert!(!call.is_retried());
        assert!(!call.is_anonymous());
        assert_eq!(call.bearer(), None);
        assert_eq!(call.elapsed(), Duration::ZERO);
    }

    #[test]
    fn retry_marker_is_per_call() {
        let mut first = ApiCall::get("/users/me");
        let second = first.clone();
        first.mark_retried();

        assert!(first.is_retried());
        assert!(!second.is_retried());
    }
}
