//! The request value handed to the pipeline by domain code.

use std::collections::BTreeMap;

use serde::Serialize;

use super::HttpMethod;

/// Name of the header that carries the access credential.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Whether a request participates in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Carries the access credential and may trigger a renewal on 401.
    #[default]
    Session,
    /// Never carries a credential and never triggers a renewal (login).
    Anonymous,
}

/// An outgoing call to the backend API.
///
/// `path` is relative to the configured API base URL, e.g. `/core/users/me/`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path relative to the API base URL.
    pub path: String,
    /// Query parameters, in insertion order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Session participation.
    pub auth: AuthMode,
}

impl ApiRequest {
    /// Creates a request with no body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            auth: AuthMode::Session,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> serde_json::Result<Self> {
        Self::new(HttpMethod::Post, path).with_json(body)
    }

    /// Creates a PATCH request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn patch<B: Serialize>(path: impl Into<String>, body: &B) -> serde_json::Result<Self> {
        Self::new(HttpMethod::Patch, path).with_json(body)
    }

    /// Sets the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Marks the request as anonymous.
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }

    /// Returns true if the request carries the session credential.
    #[must_use]
    pub fn is_session(&self) -> bool {
        self.auth == AuthMode::Session
    }

    /// Sets the `Authorization: Bearer` header, replacing any previous credential.
    pub fn set_bearer(&mut self, access: &str) {
        self.headers
            .insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {access}"));
    }

    /// Returns the `Authorization` header value, if set.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION_HEADER).map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_post_serializes_body() {
        let request = ApiRequest::post("/auth/token/", &json!({"username": "admin"})).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, Some(json!({"username": "admin"})));
        assert!(request.is_session());
    }

    #[test]
    fn test_set_bearer_replaces_previous_credential() {
        let mut request = ApiRequest::get("/core/users/me/");
        request.set_bearer("old");
        request.set_bearer("new");
        assert_eq!(request.authorization(), Some("Bearer new"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn test_anonymous_request() {
        let request = ApiRequest::get("/health/").anonymous();
        assert!(!request.is_session());
        assert_eq!(request.authorization(), None);
    }

    #[test]
    fn test_query_keeps_order() {
        let request = ApiRequest::get("/sales/orders/")
            .with_query("page", "2")
            .with_query("ordering", "-created_at");
        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("ordering".to_string(), "-created_at".to_string())
            ]
        );
    }
}
