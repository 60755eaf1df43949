//! Transport port
//!
//! The raw HTTP exchange with the backend. Implementations send exactly
//! the request they are given; credentials and renewal are the pipeline's job.

use async_trait::async_trait;
use tradepoint_domain::{ApiRequest, ApiResponse};

/// Errors that can occur while exchanging a request with the backend.
///
/// Non-2xx statuses are not errors at this level; they come back as
/// ordinary responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request did not complete in time.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// No connection could be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Port for sending requests to the backend API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport-level failures.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
