//! Snapshot of the current user as returned by `/core/users/me/`.

use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Profile of the logged-in user.
///
/// Organization and trading point context is consumed by the rest of the
/// application; the session core only stores and replaces the snapshot.
/// Fields this type does not know about are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    /// User id.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Display name.
    #[serde(default)]
    pub full_name: String,
    /// Role within the organization.
    #[serde(default)]
    pub role: String,
    /// Home organization id.
    #[serde(default)]
    pub organization: Option<String>,
    /// Home organization name.
    #[serde(default)]
    pub organization_name: String,
    /// Organization the user currently operates as.
    #[serde(default)]
    pub active_organization: Option<String>,
    /// Name of the active organization.
    #[serde(default)]
    pub active_organization_name: String,
    /// Trading point the user currently operates at.
    #[serde(default)]
    pub active_trading_point: Option<String>,
    /// Whether the account is enabled.
    #[serde(default)]
    pub is_active: bool,
    /// Whether the account is a superuser.
    #[serde(default)]
    pub is_superuser: bool,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Patronymic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Any other field returned by the server.
    #[serde(flatten)]
    pub extra: Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Creates a minimal profile.
    #[must_use]
    pub fn named(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_active: true,
            ..Self::default()
        }
    }

    /// Name to show in the UI.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deserialize_me_payload() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "7c1d",
            "username": "admin",
            "email": "admin@example.com",
            "first_name": "Ada",
            "last_name": "Admin",
            "full_name": "Ada Admin",
            "role": "owner",
            "organization": null,
            "organization_name": "",
            "active_organization": "org-1",
            "active_organization_name": "North",
            "is_active": true,
            "is_superuser": true,
            "avatar": null,
            "date_joined": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(profile.active_organization.as_deref(), Some("org-1"));
        assert_eq!(profile.display_name(), "Ada Admin");
        assert_eq!(profile.extra.get("date_joined"), Some(&json!("2025-01-01T00:00:00Z")));
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let profile = UserProfile::named("1", "cashier");
        assert_eq!(profile.display_name(), "cashier");
    }
}
