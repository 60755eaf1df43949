//! Credential and authentication error types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::response::ApiResponse;

/// Storage key holding the access credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key holding the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The access/refresh credential pair of a session.
///
/// `access` is short-lived and sent with every authorized call. `refresh` is
/// only ever sent to the renewal endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived access credential.
    pub access: String,
    /// Longer-lived refresh credential.
    pub refresh: String,
}

impl CredentialPair {
    /// Creates a new pair.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens never end up in logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &redact(&self.access))
            .field("refresh", &redact(&self.refresh))
            .finish()
    }
}

fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}…")
}

/// How a failed exchange relates to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A call received 401; recoverable through renewal on its first attempt.
    #[error("unauthorized")]
    Unauthorized,

    /// The renewal endpoint refused the refresh credential, or none was available.
    #[error("credential renewal rejected: {message}")]
    RefreshRejected {
        /// Server or local explanation.
        message: String,
    },

    /// Transport-level failure.
    #[error("network failure: {message}")]
    NetworkFailure {
        /// Error message.
        message: String,
    },

    /// Any other 4xx with a field-shaped body, passed through to callers.
    #[error("validation error: {fields}")]
    Validation {
        /// The field errors as returned by the server.
        fields: serde_json::Value,
    },
}

impl AuthError {
    /// Classifies a non-success response.
    ///
    /// Returns `None` for 2xx responses and for errors without a
    /// field-shaped body (5xx, empty or non-JSON 4xx).
    #[must_use]
    pub fn classify(response: &ApiResponse) -> Option<Self> {
        if response.is_unauthorized() {
            return Some(Self::Unauthorized);
        }
        if !response.status.is_client_error() {
            return None;
        }
        match response.json_body::<serde_json::Value>() {
            Ok(fields @ serde_json::Value::Object(_)) => Some(Self::Validation { fields }),
            _ => None,
        }
    }

    /// Returns the `detail` message of a validation body, if present.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Validation { fields } => fields.get("detail").and_then(|d| d.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = CredentialPair::new("eyJhbGciOiJIUzI1NiJ9.secret", "eyJyZWZyZXNo.secret");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("eyJh"));
    }

    #[test]
    fn test_classify_unauthorized() {
        let response = ApiResponse::json(401, &json!({"detail": "Token is invalid or expired"}));
        assert_eq!(AuthError::classify(&response), Some(AuthError::Unauthorized));
    }

    #[test]
    fn test_classify_validation_body() {
        let response = ApiResponse::json(400, &json!({"old_password": ["Wrong password."]}));
        let error = AuthError::classify(&response);
        assert!(matches!(error, Some(AuthError::Validation { .. })));
    }

    #[test]
    fn test_classify_detail() {
        let response = ApiResponse::json(403, &json!({"detail": "Only superadmins may switch"}));
        let error = AuthError::classify(&response);
        assert_eq!(
            error.as_ref().and_then(AuthError::detail),
            Some("Only superadmins may switch")
        );
    }

    #[test]
    fn test_classify_passes_through_server_errors() {
        assert_eq!(AuthError::classify(&ApiResponse::empty(502)), None);
        assert_eq!(AuthError::classify(&ApiResponse::empty(204)), None);
    }
}
