//! Credential handling for the session core.
//!
//! This module provides:
//! - Token storage over the shared origin storage
//! - Single-flight renewal of the access credential
//! - Session event fan-out, including storage changes from other tabs

mod broadcaster;
mod refresh;
mod token_store;

pub use broadcaster::SessionBroadcaster;
pub use refresh::{RefreshCoordinator, RefreshError};
pub use token_store::TokenStore;
