//! Session settings
//!
//! Values the session core needs from its environment. Loading them
//! (file, environment) is the binary's concern.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DomainError, DomainResult};

/// Default API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Settings for the session core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Base URL every endpoint path is appended to.
    pub api_base_url: String,
    /// Upper bound for one renewal call, in milliseconds.
    pub refresh_timeout_ms: u64,
    /// Upper bound for ordinary calls, in milliseconds.
    pub request_timeout_ms: u64,
    /// File backing the origin storage; in-memory only when unset.
    pub storage_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            storage_path: None,
        }
    }
}

impl SessionSettings {
    /// Renewal timeout as a `Duration`.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or a
    /// timeout is zero.
    pub fn validate(&self) -> DomainResult<()> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| DomainError::InvalidUrl(format!("{e}: {}", self.api_base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::InvalidUrl(self.api_base_url.clone()));
        }
        if self.refresh_timeout_ms == 0 {
            return Err(DomainError::InvalidSetting {
                name: "refresh_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(DomainError::InvalidSetting {
                name: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves an endpoint path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not absolute or the result is not a URL.
    pub fn endpoint_url(&self, path: &str) -> DomainResult<Url> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidPath(path.to_string()));
        }
        let joined = format!("{}{path}", self.api_base_url.trim_end_matches('/'));
        Url::parse(&joined).map_err(|e| DomainError::InvalidUrl(format!("{e}: {joined}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let settings = SessionSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.refresh_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let settings = SessionSettings {
            api_base_url: "https://shop.example.com/api/".to_string(),
            ..SessionSettings::default()
        };
        assert_eq!(
            settings.endpoint_url("/auth/token/refresh/").unwrap().as_str(),
            "https://shop.example.com/api/auth/token/refresh/"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_relative_path() {
        let settings = SessionSettings::default();
        assert_eq!(
            settings.endpoint_url("core/users/me/"),
            Err(DomainError::InvalidPath("core/users/me/".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = SessionSettings {
            api_base_url: "ftp://example.com".to_string(),
            ..SessionSettings::default()
        };
        assert!(bad_url.validate().is_err());

        let zero_timeout = SessionSettings {
            refresh_timeout_ms: 0,
            ..SessionSettings::default()
        };
        assert!(matches!(
            zero_timeout.validate(),
            Err(DomainError::InvalidSetting { name: "refresh_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_partial_settings_deserialize_with_defaults() {
        let settings: SessionSettings =
            serde_json::from_str(r#"{"refresh_timeout_ms": 2500}"#).unwrap();
        assert_eq!(settings.refresh_timeout_ms, 2500);
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    }
}
