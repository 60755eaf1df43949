//! Session events and storage change notifications.

use serde::{Deserialize, Serialize};

use crate::auth::ACCESS_TOKEN_KEY;

/// Events published on the session broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// Renewal failed terminally in this tab; tokens are already cleared.
    ForcedLogout,
    /// Another tab removed the access credential.
    CredentialsCleared,
    /// Another tab stored a different access credential.
    CredentialsRotated,
}

impl SessionEvent {
    /// Returns true if the event ends the visible session.
    #[must_use]
    pub const fn ends_session(self) -> bool {
        matches!(self, Self::ForcedLogout | Self::CredentialsCleared)
    }
}

/// A mutation of the shared origin storage made by another tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Key that changed.
    pub key: String,
    /// Value before the change.
    pub old_value: Option<String>,
    /// Value after the change; `None` when the key was removed.
    pub new_value: Option<String>,
}

impl StorageChange {
    /// Creates a change notification.
    #[must_use]
    pub fn new(key: impl Into<String>, old_value: Option<String>, new_value: Option<String>) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
        }
    }

    /// Translates the change into a session event.
    ///
    /// Only the access credential key matters: removal is a remote logout,
    /// a different value is a remote login or rotation. Unchanged values and
    /// other keys are ignored.
    #[must_use]
    pub fn session_event(&self) -> Option<SessionEvent> {
        if self.key != ACCESS_TOKEN_KEY {
            return None;
        }
        match &self.new_value {
            None => Some(SessionEvent::CredentialsCleared),
            Some(new) if self.old_value.as_ref() != Some(new) => {
                Some(SessionEvent::CredentialsRotated)
            }
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::REFRESH_TOKEN_KEY;

    #[test]
    fn test_access_removed_is_cleared() {
        let change = StorageChange::new(ACCESS_TOKEN_KEY, Some("a1".into()), None);
        assert_eq!(change.session_event(), Some(SessionEvent::CredentialsCleared));
    }

    #[test]
    fn test_access_changed_is_rotated() {
        let change = StorageChange::new(ACCESS_TOKEN_KEY, Some("a1".into()), Some("a2".into()));
        assert_eq!(change.session_event(), Some(SessionEvent::CredentialsRotated));

        let first_login = StorageChange::new(ACCESS_TOKEN_KEY, None, Some("a1".into()));
        assert_eq!(first_login.session_event(), Some(SessionEvent::CredentialsRotated));
    }

    #[test]
    fn test_unchanged_value_is_ignored() {
        let change = StorageChange::new(ACCESS_TOKEN_KEY, Some("a1".into()), Some("a1".into()));
        assert_eq!(change.session_event(), None);
    }

    #[test]
    fn test_refresh_key_is_ignored() {
        let change = StorageChange::new(REFRESH_TOKEN_KEY, Some("r1".into()), None);
        assert_eq!(change.session_event(), None);
    }

    #[test]
    fn test_ends_session() {
        assert!(SessionEvent::ForcedLogout.ends_session());
        assert!(SessionEvent::CredentialsCleared.ends_session());
        assert!(!SessionEvent::CredentialsRotated.ends_session());
    }
}
