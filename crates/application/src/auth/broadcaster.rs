//! Session event fan-out.
//!
//! Two audiences: synchronous listeners registered with [`SessionBroadcaster::listen`]
//! run inside `publish`, before it returns; async subscribers receive the
//! same events through a `tokio::sync::broadcast` channel.
//!
//! Storage changes made by other tabs are translated into
//! `CredentialsCleared` / `CredentialsRotated`. Delivery across tabs is
//! best-effort and eventually consistent: there is no cross-tab lock, the
//! last writer wins and every tab reacts to what it observes.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;
use tradepoint_domain::{SessionEvent, StorageChange};

/// Default capacity of the async event channel.
const DEFAULT_CAPACITY: usize = 64;

type Listener = Box<dyn Fn(SessionEvent) + Send + Sync>;

struct Inner {
    listeners: RwLock<Vec<Listener>>,
    sender: broadcast::Sender<SessionEvent>,
}

/// Typed publish/subscribe channel for session events.
#[derive(Clone)]
pub struct SessionBroadcaster {
    inner: Arc<Inner>,
}

impl SessionBroadcaster {
    /// Creates a broadcaster with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a broadcaster whose async channel buffers `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(Vec::new()),
                sender,
            }),
        }
    }

    /// Registers a synchronous listener.
    ///
    /// Listeners run in registration order while `publish` holds a read
    /// lock; a listener must not register further listeners.
    pub fn listen<F>(&self, listener: F)
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Box::new(listener));
    }

    /// Returns a receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.sender.subscribe()
    }

    /// Publishes an event to listeners, then to subscribers.
    pub fn publish(&self, event: SessionEvent) {
        debug!(?event, "publishing session event");
        for listener in self.inner.listeners.read().iter() {
            listener(event);
        }
        // No subscribers is fine.
        let _ = self.inner.sender.send(event);
    }

    /// Announces that renewal failed terminally in this tab.
    pub fn forced_logout(&self) {
        self.publish(SessionEvent::ForcedLogout);
    }

    /// Publishes the event a storage change from another tab stands for.
    ///
    /// Returns the event, or `None` if the change does not concern the session.
    pub fn observe(&self, change: &StorageChange) -> Option<SessionEvent> {
        let event = change.session_event()?;
        debug!(key = %change.key, ?event, "storage changed in another tab");
        self.publish(event);
        Some(event)
    }

    /// Feeds storage changes into the broadcaster until the sender side closes.
    pub async fn forward_storage_changes(&self, mut changes: mpsc::UnboundedReceiver<StorageChange>) {
        while let Some(change) = changes.recv().await {
            self.observe(&change);
        }
        debug!("storage change stream closed");
    }

    /// Spawns [`Self::forward_storage_changes`] on the current runtime.
    #[must_use]
    pub fn spawn_storage_forwarder(
        &self,
        changes: mpsc::UnboundedReceiver<StorageChange>,
    ) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move { broadcaster.forward_storage_changes(changes).await })
    }
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBroadcaster")
            .field("listeners", &self.inner.listeners.read().len())
            .field("subscribers", &self.inner.sender.receiver_count())
            .finish()
    }
}
