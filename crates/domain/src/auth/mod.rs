//! Authentication domain types

mod types;
mod wire;

pub use types::{AuthError, CredentialPair, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use wire::{LoginRequest, RefreshRequest, RefreshResponse, TokenResponse};
