//! Backend paths used by the session core, relative to the API base URL.

/// Obtain a credential pair.
pub const TOKEN: &str = "/auth/token/";

/// Renew the access credential.
pub const TOKEN_REFRESH: &str = "/auth/token/refresh/";

/// Current user profile (GET, PATCH).
pub const ME: &str = "/core/users/me/";

/// Operate as another organization.
pub const SET_ACTIVE_ORG: &str = "/core/users/me/set-active-org/";

/// Operate at another trading point.
pub const SET_ACTIVE_TP: &str = "/core/users/me/set-active-tp/";

/// Change the current user's password.
pub const CHANGE_PASSWORD: &str = "/core/users/me/change-password/";
