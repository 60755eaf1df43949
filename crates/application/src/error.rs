//! Application error types

use thiserror::Error;
use tradepoint_domain::DomainError;

use crate::pipeline::PipelineError;

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// The backend call failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The login endpoint refused the identifier/secret pair.
    #[error("invalid credentials: {detail}")]
    InvalidCredentials {
        /// Server explanation.
        detail: String,
    },

    /// The session ended while the call was in flight.
    #[error("session ended while the request was in flight")]
    SessionEnded,

    /// A request body could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApplicationError {
    /// Returns true if the error ended the session.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        match self {
            Self::SessionEnded => true,
            Self::Pipeline(e) => e.is_session_expired(),
            _ => false,
        }
    }
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
