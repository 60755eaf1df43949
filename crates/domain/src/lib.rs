//! Tradepoint Domain - Core session types
//!
//! This crate defines the domain model of the Tradepoint session core.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod endpoints;
pub mod error;
pub mod id;
pub mod request;
pub mod response;
pub mod session;
pub mod settings;

pub use auth::{AuthError, CredentialPair, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use error::{DomainError, DomainResult};
pub use id::TabId;
pub use request::{ApiRequest, AuthMode, HttpMethod};
pub use response::{ApiResponse, StatusCode};
pub use session::{SessionEvent, SessionState, StorageChange, UserProfile};
pub use settings::SessionSettings;
