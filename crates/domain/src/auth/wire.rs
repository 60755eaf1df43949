//! Bodies exchanged with the token endpoints.

use serde::{Deserialize, Serialize};

use super::CredentialPair;

/// `POST /auth/token/` body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// Account identifier.
    pub username: &'a str,
    /// Account secret.
    pub password: &'a str,
}

/// `POST /auth/token/` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// New access credential.
    pub access: String,
    /// New refresh credential.
    pub refresh: String,
}

impl From<TokenResponse> for CredentialPair {
    fn from(response: TokenResponse) -> Self {
        Self::new(response.access, response.refresh)
    }
}

/// `POST /auth/token/refresh/` body.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    /// The stored refresh credential.
    pub refresh: &'a str,
}

/// `POST /auth/token/refresh/` response.
///
/// `refresh` is only present when the server rotates refresh credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    /// New access credential.
    pub access: String,
    /// Rotated refresh credential, if issued.
    #[serde(default)]
    pub refresh: Option<String>,
}
