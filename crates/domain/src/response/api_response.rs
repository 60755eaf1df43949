//! Response type
//!
//! A completed HTTP exchange as seen by the session core: status,
//! headers and the raw body.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// HTTP status code with semantic helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// 401, the status that triggers credential renewal.
    pub const UNAUTHORIZED: Self = Self(401);

    /// Creates a new `StatusCode`.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric status code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if this is a 2xx success status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a 4xx client error status.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns the canonical reason phrase for common status codes.
    #[must_use]
    pub const fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

/// HTTP response received from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a new response from raw parts.
    #[must_use]
    pub fn new(status: impl Into<StatusCode>, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status: status.into(),
            headers,
            body,
        }
    }

    /// Creates a response carrying a JSON body.
    #[must_use]
    pub fn json(status: impl Into<StatusCode>, body: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self::new(status, headers, body.to_string().into_bytes())
    }

    /// Creates a response with an empty body.
    #[must_use]
    pub fn empty(status: impl Into<StatusCode>) -> Self {
        Self::new(status, HashMap::new(), Vec::new())
    }

    /// Returns true if the status code indicates success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true for a 401 response.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Gets a header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json_body<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Returns the `detail` string of a JSON body, whatever the status.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        let body: serde_json::Value = self.json_body().ok()?;
        body.get("detail")?.as_str().map(str::to_string)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_status_code_categories() {
        assert!(StatusCode::new(200).is_success());
        assert!(StatusCode::new(404).is_client_error());
        assert!(!StatusCode::new(503).is_client_error());
        assert!(!StatusCode::new(401).is_success());
    }

    #[test]
    fn test_status_code_display() {
        assert_eq!(StatusCode::new(401).to_string(), "401 Unauthorized");
        assert_eq!(StatusCode::new(599).to_string(), "599 Unknown");
    }

    #[test]
    fn test_json_response_roundtrip() {
        let response = ApiResponse::json(200, &json!({"access": "a1"}));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        let value: serde_json::Value = response.json_body().unwrap();
        assert_eq!(value["access"], "a1");
    }

    #[test]
    fn test_detail_read_from_any_status() {
        let rejected = ApiResponse::json(401, &json!({"detail": "Token is blacklisted"}));
        assert_eq!(rejected.detail().as_deref(), Some("Token is blacklisted"));

        let fields = ApiResponse::json(400, &json!({"old_password": ["Wrong password."]}));
        assert_eq!(fields.detail(), None);
        assert_eq!(ApiResponse::new(502, HashMap::new(), b"<html>".to_vec()).detail(), None);
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiResponse::empty(401).is_unauthorized());
        assert!(!ApiResponse::empty(403).is_unauthorized());
    }
}
