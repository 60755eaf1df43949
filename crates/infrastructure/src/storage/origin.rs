//! Per-origin key-value storage shared by every tab.
//!
//! One [`OriginStorage`] holds the entries; each tab talks to it through its
//! own [`TabStorage`] handle. A write made through one handle is announced
//! as a [`StorageChange`] to every other handle that subscribed through
//! [`TabStorage::changes`], never to the writer.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tradepoint_application::ports::{KeyValueStorage, StorageError, StorageWrite};
use tradepoint_domain::{StorageChange, TabId};

use crate::serialization::{from_json_bytes, to_json_stable};

struct Shared {
    entries: BTreeMap<String, String>,
    tabs: Vec<TabId>,
    subscribers: Vec<(TabId, mpsc::UnboundedSender<StorageChange>)>,
}

/// Storage shared by all tabs of one origin.
///
/// Optionally backed by a JSON file holding a flat string map. Writes are
/// applied in memory first; the file is rewritten afterwards.
pub struct OriginStorage {
    shared: Mutex<Shared>,
    path: Option<PathBuf>,
}

impl OriginStorage {
    /// Creates storage that lives only as long as the process.
    #[must_use]
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::with_entries(BTreeMap::new(), None))
    }

    /// Opens storage backed by `path`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>, StorageError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => from_json_bytes(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), entries = entries.len(), "origin storage opened");
        Ok(Arc::new(Self::with_entries(entries, Some(path))))
    }

    fn with_entries(entries: BTreeMap<String, String>, path: Option<PathBuf>) -> Self {
        Self {
            shared: Mutex::new(Shared {
                entries,
                tabs: Vec::new(),
                subscribers: Vec::new(),
            }),
            path,
        }
    }

    /// Attaches a new tab.
    #[must_use]
    pub fn open_tab(self: &Arc<Self>) -> TabStorage {
        let id = TabId::generate();
        self.shared.lock().tabs.push(id);
        debug!(tab = %id, "tab attached");

        TabStorage {
            id,
            origin: Arc::clone(self),
            subscribed: AtomicBool::new(false),
        }
    }

    /// Number of attached tabs.
    #[must_use]
    pub fn tab_count(&self) -> usize {
        self.shared.lock().tabs.len()
    }

    /// Number of tabs currently receiving changes.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    /// Copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.shared.lock().entries.clone()
    }

    /// File backing this storage, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn apply_from(&self, writer: TabId, writes: &[StorageWrite]) -> Result<(), StorageError> {
        let mut shared = self.shared.lock();

        let mut changes = Vec::with_capacity(writes.len());
        for write in writes {
            let (key, old_value, new_value) = match write {
                StorageWrite::Set { key, value } => {
                    let old = shared.entries.insert(key.clone(), value.clone());
                    (key, old, Some(value.clone()))
                }
                StorageWrite::Remove { key } => (key, shared.entries.remove(key), None),
            };
            if old_value != new_value {
                changes.push(StorageChange::new(key.clone(), old_value, new_value));
            }
        }
        if changes.is_empty() {
            return Ok(());
        }

        shared.subscribers.retain(|(id, tx)| {
            if *id == writer {
                return true;
            }
            changes.iter().all(|change| tx.send(change.clone()).is_ok())
        });

        match &self.path {
            Some(path) => persist(path, &shared.entries),
            None => Ok(()),
        }
    }

    fn subscribe(&self, tab: TabId) -> mpsc::UnboundedReceiver<StorageChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.lock().subscribers.push((tab, tx));
        debug!(%tab, "tab subscribed to changes");
        rx
    }

    fn detach(&self, tab: TabId) {
        let mut shared = self.shared.lock();
        shared.tabs.retain(|id| *id != tab);
        shared.subscribers.retain(|(id, _)| *id != tab);
        debug!(%tab, "tab detached");
    }
}

/// Rewrites the storage file through a temporary sibling.
fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
    let json = to_json_stable(entries)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, json)?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// One tab's handle on an [`OriginStorage`].
///
/// Detaches from the origin when dropped.
pub struct TabStorage {
    id: TabId,
    origin: Arc<OriginStorage>,
    subscribed: AtomicBool,
}

impl TabStorage {
    /// Identifier of this tab.
    #[must_use]
    pub const fn id(&self) -> TabId {
        self.id
    }

    /// The origin this tab is attached to.
    #[must_use]
    pub const fn origin(&self) -> &Arc<OriginStorage> {
        &self.origin
    }

    /// Subscribes to changes made by other tabs from now on.
    ///
    /// Nothing is queued for a tab before this call. Returns `None` after the
    /// first call; dropping the receiver ends the subscription.
    pub fn changes(&self) -> Option<mpsc::UnboundedReceiver<StorageChange>> {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.origin.subscribe(self.id))
    }
}

impl KeyValueStorage for TabStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.origin.shared.lock().entries.get(key).cloned()
    }

    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let shared = self.origin.shared.lock();
        keys.iter().map(|key| shared.entries.get(*key).cloned()).collect()
    }

    fn apply(&self, writes: &[StorageWrite]) -> Result<(), StorageError> {
        self.origin.apply_from(self.id, writes).inspect_err(|e| {
            warn!(tab = %self.id, error = %e, "storage write not persisted");
        })
    }
}

impl Drop for TabStorage {
    fn drop(&mut self) {
        self.origin.detach(self.id);
    }
}

impl std::fmt::Debug for TabStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabStorage").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_writes_are_visible_to_every_tab() {
        let origin = OriginStorage::in_memory();
        let first = origin.open_tab();
        let second = origin.open_tab();

        first
            .apply(&[
                StorageWrite::set("access_token", "a1"),
                StorageWrite::set("refresh_token", "r1"),
            ])
            .unwrap();

        assert_eq!(
            second.get_many(&["access_token", "refresh_token"]),
            vec![Some("a1".to_string()), Some("r1".to_string())]
        );
    }

    #[test]
    fn test_changes_reach_other_tabs_only() {
        let origin = OriginStorage::in_memory();
        let writer = origin.open_tab();
        let reader = origin.open_tab();
        let mut own = writer.changes().unwrap();
        let mut other = reader.changes().unwrap();

        writer.apply(&[StorageWrite::set("access_token", "a1")]).unwrap();
        writer.apply(&[StorageWrite::remove("access_token")]).unwrap();

        assert!(own.try_recv().is_err());
        assert_eq!(
            other.try_recv().unwrap(),
            StorageChange::new("access_token", None, Some("a1".to_string()))
        );
        assert_eq!(
            other.try_recv().unwrap(),
            StorageChange::new("access_token", Some("a1".to_string()), None)
        );
    }

    #[test]
    fn test_unchanged_values_are_not_announced() {
        let origin = OriginStorage::in_memory();
        let writer = origin.open_tab();
        let reader = origin.open_tab();
        let mut changes = reader.changes().unwrap();

        writer.apply(&[StorageWrite::set("access_token", "a1")]).unwrap();
        writer.apply(&[StorageWrite::set("access_token", "a1")]).unwrap();
        writer.apply(&[StorageWrite::remove("missing")]).unwrap();

        assert!(changes.try_recv().is_ok());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_changes_can_be_taken_once() {
        let origin = OriginStorage::in_memory();
        let tab = origin.open_tab();
        assert!(tab.changes().is_some());
        assert!(tab.changes().is_none());
    }

    #[test]
    fn test_changes_before_subscribing_are_not_queued() {
        let origin = OriginStorage::in_memory();
        let writer = origin.open_tab();
        let late = origin.open_tab();

        writer.apply(&[StorageWrite::set("access_token", "a1")]).unwrap();
        assert_eq!(origin.subscriber_count(), 0);

        let mut changes = late.changes().unwrap();
        assert!(changes.try_recv().is_err());
        writer.apply(&[StorageWrite::remove("access_token")]).unwrap();

        assert_eq!(
            changes.try_recv().unwrap(),
            StorageChange::new("access_token", Some("a1".to_string()), None)
        );
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let origin = OriginStorage::in_memory();
        let writer = origin.open_tab();
        let reader = origin.open_tab();
        drop(reader.changes().unwrap());
        assert_eq!(origin.subscriber_count(), 1);

        writer.apply(&[StorageWrite::set("k", "v")]).unwrap();

        assert_eq!(origin.subscriber_count(), 0);
        assert_eq!(origin.tab_count(), 2);
    }

    #[test]
    fn test_dropped_tab_detaches() {
        let origin = OriginStorage::in_memory();
        let tab = origin.open_tab();
        let other = origin.open_tab();
        let _changes = tab.changes().unwrap();
        assert_eq!(origin.tab_count(), 2);
        assert_eq!(origin.subscriber_count(), 1);

        drop(tab);

        assert_eq!(origin.tab_count(), 1);
        assert_eq!(origin.subscriber_count(), 0);
        other.apply(&[StorageWrite::set("k", "v")]).unwrap();
    }

    #[test]
    fn test_file_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session").join("storage.json");

        {
            let origin = OriginStorage::open(&path).unwrap();
            let tab = origin.open_tab();
            tab.apply(&[
                StorageWrite::set("access_token", "a1"),
                StorageWrite::set("refresh_token", "r1"),
            ])
            .unwrap();
            tab.apply(&[StorageWrite::remove("refresh_token")]).unwrap();
        }

        let reopened = OriginStorage::open(&path).unwrap();
        let tab = reopened.open_tab();
        assert_eq!(tab.get("access_token"), Some("a1".to_string()));
        assert_eq!(tab.get("refresh_token"), None);
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_open_missing_or_empty_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(OriginStorage::open(dir.path().join("none.json")).unwrap().snapshot().is_empty());

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "\n").unwrap();
        assert!(OriginStorage::open(&empty).unwrap().snapshot().is_empty());
    }

    #[test]
    fn test_open_corrupt_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            OriginStorage::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
