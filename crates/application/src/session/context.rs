//! Session state machine on top of the pipeline.
//!
//! `Loading → {Anonymous, Authenticated}`, `Authenticated → Authenticated`
//! on context switches and profile refreshes, `Authenticated → Anonymous` on
//! logout, forced logout or a logout in another tab, `Anonymous →
//! Authenticated` on login here or in another tab.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tradepoint_domain::auth::{LoginRequest, TokenResponse};
use tradepoint_domain::{
    endpoints, ApiRequest, CredentialPair, SessionEvent, SessionState, StatusCode, UserProfile,
};

use crate::auth::{RefreshCoordinator, SessionBroadcaster, TokenStore};
use crate::error::{ApplicationError, ApplicationResult};
use crate::pipeline::{PipelineError, RequestPipeline};
use crate::ports::{KeyValueStorage, Transport};

const LOGIN_REFUSED: &str = "No active account found with the given credentials";

#[derive(Serialize)]
struct ActiveOrganization<'a> {
    organization: Option<&'a str>,
}

#[derive(Serialize)]
struct ActiveTradingPoint<'a> {
    trading_point: Option<&'a str>,
}

#[derive(Serialize)]
struct ChangePassword<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

struct Inner {
    pipeline: RequestPipeline,
    broadcaster: SessionBroadcaster,
    state: watch::Sender<SessionState>,
}

impl Inner {
    fn tokens(&self) -> &TokenStore {
        self.pipeline.tokens()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        let current = self.state.borrow();
        if previous.label() != current.label() {
            debug!(from = previous.label(), to = current.label(), "session state changed");
        }
    }

    fn end_session(&self) {
        self.set_state(SessionState::Anonymous);
    }

    /// Replaces the snapshot, unless the session ended meanwhile.
    fn replace_profile(&self, profile: UserProfile) -> ApplicationResult<UserProfile> {
        if !self.tokens().has_access() {
            self.end_session();
            return Err(ApplicationError::SessionEnded);
        }
        self.set_state(SessionState::authenticated(profile.clone()));
        Ok(profile)
    }
}

/// The session as seen by the rest of the application.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    /// Creates a context in the `Loading` state.
    ///
    /// Registers a listener so that `ForcedLogout` and `CredentialsCleared`
    /// end the visible session before the publishing call returns.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, broadcaster: SessionBroadcaster) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let inner = Arc::new(Inner {
            pipeline,
            broadcaster: broadcaster.clone(),
            state,
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        broadcaster.listen(move |event| {
            if event.ends_session()
                && let Some(inner) = weak.upgrade()
            {
                info!(?event, "session ended");
                inner.end_session();
            }
        });

        Self { inner }
    }

    /// Wires token store, coordinator, pipeline and broadcaster over the given ports.
    #[must_use]
    pub fn assemble(
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStorage>,
        refresh_timeout: Duration,
    ) -> Self {
        let broadcaster = SessionBroadcaster::new();
        let tokens = TokenStore::new(storage);
        let coordinator = RefreshCoordinator::new(
            tokens.clone(),
            Arc::clone(&transport),
            broadcaster.clone(),
            refresh_timeout,
        );
        let pipeline = RequestPipeline::new(transport, tokens, coordinator);
        Self::new(pipeline, broadcaster)
    }

    /// The pipeline domain code sends its calls through.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    /// The broadcaster session events are published on.
    #[must_use]
    pub fn broadcaster(&self) -> &SessionBroadcaster {
        &self.inner.broadcaster
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Current profile snapshot, if authenticated.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.state.borrow().profile().cloned()
    }

    /// Returns true if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Leaves `Loading`, using stored credentials if there are any.
    pub async fn initialize(&self) -> SessionState {
        if self.inner.tokens().has_access() {
            if let Err(e) = self.refresh_profile().await {
                info!(error = %e, "stored credentials are not usable");
            }
        } else {
            self.inner.end_session();
        }
        self.state()
    }

    /// Logs in and loads the profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::InvalidCredentials`] if the server refused
    /// the pair; the state is left as it was.
    pub async fn login(&self, username: &str, password: &str) -> ApplicationResult<UserProfile> {
        let request =
            ApiRequest::post(endpoints::TOKEN, &LoginRequest { username, password })?.anonymous();
        let response = self.inner.pipeline.send(request).await?;

        if response.is_unauthorized() || response.status == StatusCode::new(400) {
            let detail = response
                .detail()
                .unwrap_or_else(|| LOGIN_REFUSED.to_string());
            warn!(username, "login refused");
            return Err(ApplicationError::InvalidCredentials { detail });
        }
        if !response.is_success() {
            return Err(PipelineError::unexpected_status(&response).into());
        }

        let pair: CredentialPair = response.json_body::<TokenResponse>()?.into();
        self.inner.tokens().set(&pair);
        info!(username, "logged in");

        self.refresh_profile().await
    }

    /// Clears the credentials and ends the session. No network call.
    pub fn logout(&self) {
        self.inner.tokens().clear();
        self.inner.end_session();
        info!("logged out");
    }

    /// Re-fetches the profile for the current credential.
    ///
    /// # Errors
    ///
    /// Any failure ends the visible session and is returned.
    pub async fn refresh_profile(&self) -> ApplicationResult<UserProfile> {
        match self.inner.pipeline.get_json::<UserProfile>(endpoints::ME).await {
            Ok(profile) => self.inner.replace_profile(profile),
            Err(e) => {
                warn!(error = %e, "profile fetch failed");
                self.inner.end_session();
                Err(e.into())
            }
        }
    }

    /// Operates as another organization, or none.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; the snapshot is unchanged then.
    pub async fn switch_organization(&self, organization: Option<&str>) -> ApplicationResult<UserProfile> {
        let profile = self
            .inner
            .pipeline
            .post_json(endpoints::SET_ACTIVE_ORG, &ActiveOrganization { organization })
            .await?;
        info!(organization = organization.unwrap_or("-"), "active organization switched");
        self.inner.replace_profile(profile)
    }

    /// Operates at another trading point, or none.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; the snapshot is unchanged then.
    pub async fn switch_trading_point(&self, trading_point: Option<&str>) -> ApplicationResult<UserProfile> {
        let profile = self
            .inner
            .pipeline
            .post_json(endpoints::SET_ACTIVE_TP, &ActiveTradingPoint { trading_point })
            .await?;
        info!(trading_point = trading_point.unwrap_or("-"), "active trading point switched");
        self.inner.replace_profile(profile)
    }

    /// Updates profile fields and stores the server's snapshot.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; validation failures carry the field errors.
    pub async fn update_profile(&self, changes: &serde_json::Value) -> ApplicationResult<UserProfile> {
        let profile = self.inner.pipeline.patch_json(endpoints::ME, changes).await?;
        self.inner.replace_profile(profile)
    }

    /// Changes the current user's password. The session is unaffected.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; a wrong old password is a 400 with field errors.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ApplicationResult<()> {
        let request = ApiRequest::post(
            endpoints::CHANGE_PASSWORD,
            &ChangePassword {
                old_password,
                new_password,
            },
        )?;
        self.inner.pipeline.send_ok(request).await?;
        info!("password changed");
        Ok(())
    }

    /// Reacts to one session event.
    ///
    /// Ending events clear the visible user without network. A rotation
    /// re-fetches the profile; the broadcast never carries one.
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::ForcedLogout | SessionEvent::CredentialsCleared => {
                self.inner.end_session();
            }
            SessionEvent::CredentialsRotated => {
                debug!("credentials rotated elsewhere, re-fetching profile");
                if let Err(e) = self.refresh_profile().await {
                    debug!(error = %e, "profile re-fetch after rotation failed");
                }
            }
        }
    }

    /// Re-derives the state from the stored credentials.
    async fn resync(&self) {
        if self.inner.tokens().has_access() {
            self.handle_event(SessionEvent::CredentialsRotated).await;
        } else {
            self.inner.end_session();
        }
    }

    /// Spawns the task handling events that need network access.
    ///
    /// Ending events are already handled by the synchronous listener. The task
    /// stops once the context is dropped.
    #[must_use]
    pub fn spawn_event_loop(&self) -> JoinHandle<()> {
        let mut events = self.inner.broadcaster.subscribe();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let received = events.recv().await;
                let Some(inner) = weak.upgrade() else { break };
                let context = Self { inner };
                match received {
                    Ok(event @ SessionEvent::CredentialsRotated) => context.handle_event(event).await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session events lagged, resyncing");
                        context.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("session event loop stopped");
        })
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &self.inner.state.borrow().label())
            .finish_non_exhaustive()
    }
}
