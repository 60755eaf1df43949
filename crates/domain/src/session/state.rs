//! Application-visible session state machine.

use super::UserProfile;

/// The session as the rest of the application sees it.
///
/// `Loading` only exists until the first profile fetch settles:
/// - `Anonymous`: show the login screen
/// - `Authenticated`: the profile snapshot of the current user
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Startup, before stored credentials have been checked.
    #[default]
    Loading,
    /// No usable credentials.
    Anonymous,
    /// Logged in; holds the latest profile snapshot.
    Authenticated(Box<UserProfile>),
}

impl SessionState {
    /// Creates an authenticated state.
    #[must_use]
    pub fn authenticated(profile: UserProfile) -> Self {
        Self::Authenticated(Box::new(profile))
    }

    /// Returns true once a user is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns true while the initial check is pending.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns the current profile, if authenticated.
    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Anonymous => "anonymous",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_loading() {
        let state = SessionState::default();
        assert!(state.is_loading());
        assert!(state.profile().is_none());
    }

    #[test]
    fn test_authenticated_exposes_profile() {
        let state = SessionState::authenticated(UserProfile::named("u1", "admin"));
        assert!(state.is_authenticated());
        assert_eq!(state.profile().map(|p| p.username.as_str()), Some("admin"));
        assert_eq!(state.label(), "authenticated");
    }
}
