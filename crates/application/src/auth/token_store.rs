//! Credential storage on top of the shared origin storage.
//!
//! Both tokens live under fixed keys so every tab of the same origin sees
//! them. Writes go out as one storage batch, so a reader in this tab never
//! observes half of a pair.

use std::sync::Arc;

use tracing::warn;
use tradepoint_domain::{CredentialPair, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

use crate::ports::{KeyValueStorage, StorageWrite};

/// Thread-safe handle to the stored credential pair.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    /// Creates a token store over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Returns the stored pair, or `None` unless both tokens are present.
    #[must_use]
    pub fn get(&self) -> Option<CredentialPair> {
        let mut values = self
            .storage
            .get_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
            .into_iter();
        match (values.next().flatten(), values.next().flatten()) {
            (Some(access), Some(refresh)) => Some(CredentialPair { access, refresh }),
            _ => None,
        }
    }

    /// Returns the access credential, if any.
    #[must_use]
    pub fn access(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    /// Returns the refresh credential, if any.
    #[must_use]
    pub fn refresh(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// Returns true if an access credential is stored.
    #[must_use]
    pub fn has_access(&self) -> bool {
        self.access().is_some()
    }

    /// Stores a full pair (login).
    pub fn set(&self, pair: &CredentialPair) {
        self.write(&[
            StorageWrite::set(ACCESS_TOKEN_KEY, pair.access.clone()),
            StorageWrite::set(REFRESH_TOKEN_KEY, pair.refresh.clone()),
        ]);
    }

    /// Stores a renewed access credential.
    ///
    /// The refresh credential is only replaced when the server rotated it.
    pub fn replace_access(&self, access: &str, refresh: Option<&str>) {
        let mut writes = vec![StorageWrite::set(ACCESS_TOKEN_KEY, access)];
        if let Some(refresh) = refresh {
            writes.push(StorageWrite::set(REFRESH_TOKEN_KEY, refresh));
        }
        self.write(&writes);
    }

    /// Removes both tokens.
    pub fn clear(&self) {
        self.write(&[
            StorageWrite::remove(ACCESS_TOKEN_KEY),
            StorageWrite::remove(REFRESH_TOKEN_KEY),
        ]);
    }

    fn write(&self, writes: &[StorageWrite]) {
        // The in-memory view is already updated when this fails.
        if let Err(e) = self.storage.apply(writes) {
            warn!(error = %e, "failed to persist session tokens");
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_access", &self.has_access())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_get_pair() {
        let storage = MemoryStorage::new();
        let store = TokenStore::new(storage.clone());

        store.set(&CredentialPair::new("a1", "r1"));

        assert_eq!(store.get(), Some(CredentialPair::new("a1", "r1")));
        assert_eq!(storage.batches().len(), 1);
        assert_eq!(storage.batches()[0].len(), 2);
    }

    #[test]
    fn test_get_requires_both_tokens() {
        let store = TokenStore::new(MemoryStorage::with(&[(ACCESS_TOKEN_KEY, "a1")]));
        assert_eq!(store.get(), None);
        assert_eq!(store.access().as_deref(), Some("a1"));
    }

    #[test]
    fn test_replace_access_keeps_refresh_without_rotation() {
        let store = TokenStore::new(MemoryStorage::new());
        store.set(&CredentialPair::new("a1", "r1"));

        store.replace_access("a2", None);
        assert_eq!(store.get(), Some(CredentialPair::new("a2", "r1")));

        store.replace_access("a3", Some("r2"));
        assert_eq!(store.get(), Some(CredentialPair::new("a3", "r2")));
    }

    #[test]
    fn test_clear_removes_both_keys_in_one_batch() {
        let storage = MemoryStorage::new();
        let store = TokenStore::new(storage.clone());
        store.set(&CredentialPair::new("a1", "r1"));

        store.clear();

        assert_eq!(store.get(), None);
        assert!(!store.has_access());
        assert_eq!(store.refresh(), None);
        assert_eq!(
            storage.batches().last().unwrap(),
            &vec![
                StorageWrite::remove(ACCESS_TOKEN_KEY),
                StorageWrite::remove(REFRESH_TOKEN_KEY)
            ]
        );
    }

    #[test]
    fn test_debug_hides_tokens() {
        let store = TokenStore::new(MemoryStorage::with(&[(ACCESS_TOKEN_KEY, "secret")]));
        assert!(!format!("{store:?}").contains("secret"));
    }
}
