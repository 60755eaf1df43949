//! The request pipeline every backend call goes through.
//!
//! Attaches the stored access credential, and turns a 401 on a call's first
//! attempt into one renewal plus one replay. A replayed call that gets
//! another 401 is returned as is.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use tradepoint_domain::{ApiRequest, ApiResponse, AuthError, StatusCode};

use crate::auth::{RefreshCoordinator, RefreshError, TokenStore};
use crate::ports::{Transport, TransportError};

/// Errors returned by [`RequestPipeline`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The call failed at the transport level. Never retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The call got a 401 and the credential could not be renewed.
    #[error("session expired: {cause}")]
    SessionExpired {
        /// The original 401 response.
        response: ApiResponse,
        /// Why renewal failed.
        #[source]
        cause: RefreshError,
    },

    /// A typed helper got a non-success status.
    #[error("request failed with status {status}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Classification of the failure, if the body allowed one.
        error: Option<AuthError>,
        /// Raw body text.
        body: String,
    },

    /// A body could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Returns the HTTP status this error carries, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::SessionExpired { response, .. } => Some(response.status),
            _ => None,
        }
    }

    /// Returns true if the session ended because of this call.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Builds the error for a response a typed helper cannot accept.
    #[must_use]
    pub fn unexpected_status(response: &ApiResponse) -> Self {
        Self::Status {
            status: response.status,
            error: AuthError::classify(response),
            body: response.text(),
        }
    }
}

/// Which submission of a call this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Original submission; a 401 may trigger a renewal.
    First,
    /// Resubmission after a renewal; a 401 is final.
    Replay,
}

/// A request together with its attempt counter.
#[derive(Debug, Clone)]
struct Call {
    request: ApiRequest,
    attempt: Attempt,
}

impl Call {
    const fn new(request: ApiRequest) -> Self {
        Self {
            request,
            attempt: Attempt::First,
        }
    }

    fn may_renew(&self) -> bool {
        self.attempt == Attempt::First && self.request.is_session()
    }

    fn into_replay(mut self, access: &str) -> Self {
        self.request.set_bearer(access);
        self.attempt = Attempt::Replay;
        self
    }
}

/// Sends requests with the session credential and recovers from expiry.
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    tokens: TokenStore,
    coordinator: RefreshCoordinator,
}

impl RequestPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: TokenStore,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            transport,
            tokens,
            coordinator,
        }
    }

    /// Returns the token store the pipeline reads credentials from.
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Returns the renewal coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Sends a request, renewing the credential and replaying once on 401.
    ///
    /// Every status other than a recoverable 401 is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transport`] on transport failure and
    /// [`PipelineError::SessionExpired`] when renewal failed.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        let mut call = Call::new(request);
        let mut presented = None;
        if call.request.is_session()
            && let Some(access) = self.tokens.access()
        {
            call.request.set_bearer(&access);
            presented = Some(access);
        }

        loop {
            let response = self.transport.execute(&call.request).await?;
            if !response.is_unauthorized() || !call.may_renew() {
                if response.is_unauthorized() {
                    debug!(path = %call.request.path, attempt = ?call.attempt, "401 passed through");
                }
                return Ok(response);
            }

            debug!(path = %call.request.path, "401 on first attempt, renewing credential");
            let access = match self.coordinator.ensure_fresh_after(presented.as_deref()).await {
                Ok(access) => access,
                Err(cause) => {
                    warn!(path = %call.request.path, error = %cause, "giving up on call");
                    return Err(PipelineError::SessionExpired { response, cause });
                }
            };

            call = call.into_replay(&access);
            presented = Some(access);
        }
    }

    /// Sends a request and decodes a successful JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Status`] for non-success statuses, in
    /// addition to the errors of [`Self::send`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, PipelineError> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(PipelineError::unexpected_status(&response));
        }
        Ok(response.json_body()?)
    }

    /// Sends a request, expecting a success status and ignoring the body.
    ///
    /// # Errors
    ///
    /// As [`Self::send_json`].
    pub async fn send_ok(&self, request: ApiRequest) -> Result<(), PipelineError> {
        let response = self.send(request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(PipelineError::unexpected_status(&response))
        }
    }

    /// `GET path` decoded as JSON.
    ///
    /// # Errors
    ///
    /// As [`Self::send_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PipelineError> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// `POST path` with a JSON body, decoded as JSON.
    ///
    /// # Errors
    ///
    /// As [`Self::send_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, PipelineError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path, body)?).await
    }

    /// `PATCH path` with a JSON body, decoded as JSON.
    ///
    /// # Errors
    ///
    /// As [`Self::send_json`].
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, PipelineError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::patch(path, body)?).await
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("tokens", &self.tokens)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
