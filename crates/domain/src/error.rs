//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The provided URL is invalid or malformed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A request path does not start with `/`.
    #[error("invalid request path: {0}")]
    InvalidPath(String),

    /// A setting has an unusable value.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting {
        /// Name of the setting.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
