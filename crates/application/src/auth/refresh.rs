//! Single-flight credential renewal.
//!
//! At most one renewal call is in flight per coordinator. The first caller
//! to find the coordinator `Idle` switches it to `Refreshing` and spawns the
//! renewal; every caller arriving while it runs is parked as a
//! [`PendingOperation`]. When the renewal settles, all parked callers are
//! resolved in one batch, in enqueue order, with the same outcome.
//!
//! The renewal runs as its own task, so it completes even if every caller
//! that was waiting on it has been dropped.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use tradepoint_domain::auth::{RefreshRequest, RefreshResponse};
use tradepoint_domain::{endpoints, ApiRequest, AuthError, HttpMethod};

use super::{SessionBroadcaster, TokenStore};
use crate::ports::Transport;

/// Why a renewal failed. Every variant is terminal for the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No refresh credential was stored; no call was made.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The renewal endpoint answered with a non-success status.
    #[error("refresh rejected with status {status}: {detail}")]
    Rejected {
        /// HTTP status of the renewal response.
        status: u16,
        /// Server explanation, if any.
        detail: String,
    },

    /// The renewal call failed at the transport level.
    #[error("network failure during refresh: {0}")]
    Network(String),

    /// The renewal call did not complete in time.
    #[error("refresh timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The renewal payload could not be encoded or decoded.
    #[error("invalid refresh payload: {0}")]
    InvalidPayload(String),

    /// The renewal task went away without reporting an outcome.
    #[error("refresh abandoned")]
    Abandoned,
}

impl From<&RefreshError> for AuthError {
    fn from(error: &RefreshError) -> Self {
        match error {
            RefreshError::Network(message) => Self::NetworkFailure {
                message: message.clone(),
            },
            RefreshError::Timeout { .. } => Self::NetworkFailure {
                message: error.to_string(),
            },
            _ => Self::RefreshRejected {
                message: error.to_string(),
            },
        }
    }
}

/// A caller parked while a renewal is in flight.
#[derive(Debug)]
struct PendingOperation {
    seq: u64,
    completion: oneshot::Sender<Result<String, RefreshError>>,
}

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<PendingOperation>,
    },
}

struct Inner {
    state: Mutex<RefreshState>,
    tokens: TokenStore,
    transport: Arc<dyn Transport>,
    broadcaster: SessionBroadcaster,
    timeout: Duration,
    next_seq: AtomicU64,
    renewals: AtomicU64,
}

/// Coordinates renewal of the access credential.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new(
        tokens: TokenStore,
        transport: Arc<dyn Transport>,
        broadcaster: SessionBroadcaster,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                tokens,
                transport,
                broadcaster,
                timeout,
                next_seq: AtomicU64::new(0),
                renewals: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a fresh access credential, renewing it once for all concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns the renewal error. By then the tokens are cleared and
    /// `ForcedLogout` has been published.
    pub async fn ensure_fresh(&self) -> Result<String, RefreshError> {
        self.join_or_start(None).await
    }

    /// Like [`Self::ensure_fresh`], for a caller whose `rejected` credential got a 401.
    ///
    /// If a renewal settled between the 401 and this call, the stored
    /// credential already differs from `rejected` and is returned without
    /// another renewal.
    ///
    /// # Errors
    ///
    /// Returns the renewal error, as [`Self::ensure_fresh`].
    pub async fn ensure_fresh_after(&self, rejected: Option<&str>) -> Result<String, RefreshError> {
        self.join_or_start(Some(rejected)).await
    }

    /// Returns true while a renewal is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers parked on the in-flight renewal.
    #[must_use]
    pub fn waiting(&self) -> usize {
        match &*self.inner.state.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Number of renewal calls started so far.
    #[must_use]
    pub fn renewals(&self) -> u64 {
        self.inner.renewals.load(Ordering::Relaxed)
    }

    async fn join_or_start(&self, rejected: Option<Option<&str>>) -> Result<String, RefreshError> {
        let (completion, outcome) = oneshot::channel();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);

        let start = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    debug!(seq, queued = waiters.len() + 1, "renewal in flight, parking call");
                    waiters.push(PendingOperation { seq, completion });
                    false
                }
                RefreshState::Idle => {
                    if let Some(rejected) = rejected
                        && let Some(current) = self.inner.tokens.access()
                        && Some(current.as_str()) != rejected
                    {
                        debug!(seq, "credential already renewed");
                        return Ok(current);
                    }
                    *state = RefreshState::Refreshing {
                        waiters: vec![PendingOperation { seq, completion }],
                    };
                    true
                }
            }
        };

        if start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run().await });
        }

        outcome.await.unwrap_or(Err(RefreshError::Abandoned))
    }
}

impl Inner {
    async fn run(&self) {
        self.renewals.fetch_add(1, Ordering::Relaxed);
        let outcome = self.renew().await;

        if let Err(e) = &outcome {
            warn!(error = %e, "credential renewal failed, ending session");
            self.tokens.clear();
        }

        let waiters = match mem::take(&mut *self.state.lock()) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };

        if outcome.is_err() {
            self.broadcaster.forced_logout();
        } else {
            info!(waiters = waiters.len(), "credential renewed");
        }

        for waiter in waiters {
            if waiter.completion.send(outcome.clone()).is_err() {
                debug!(seq = waiter.seq, "caller went away before renewal settled");
            }
        }
    }

    async fn renew(&self) -> Result<String, RefreshError> {
        let refresh = self.tokens.refresh().ok_or(RefreshError::NoRefreshToken)?;

        let request = ApiRequest::new(HttpMethod::Post, endpoints::TOKEN_REFRESH)
            .anonymous()
            .with_json(&RefreshRequest { refresh: &refresh })
            .map_err(|e| RefreshError::InvalidPayload(e.to_string()))?;

        debug!("requesting credential renewal");
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let response = tokio::time::timeout(self.timeout, self.transport.execute(&request))
            .await
            .map_err(|_| RefreshError::Timeout { timeout_ms })?
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        if !response.is_success() {
            let detail = response.detail().unwrap_or_else(|| response.text());
            return Err(RefreshError::Rejected {
                status: response.status.as_u16(),
                detail,
            });
        }

        let renewed: RefreshResponse = response
            .json_body()
            .map_err(|e| RefreshError::InvalidPayload(e.to_string()))?;

        self.tokens
            .replace_access(&renewed.access, renewed.refresh.as_deref());
        Ok(renewed.access)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("waiting", &self.waiting())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}
