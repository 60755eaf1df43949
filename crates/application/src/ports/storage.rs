//! Key-value storage port
//!
//! Durable per-origin storage shared by every tab of the application.
//! Reads and writes are synchronous; a batch of writes is applied as a
//! unit with respect to readers.

/// One write in a storage batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageWrite {
    /// Store `value` under `key`.
    Set {
        /// Storage key.
        key: String,
        /// New value.
        value: String,
    },
    /// Remove `key`.
    Remove {
        /// Storage key.
        key: String,
    },
}

impl StorageWrite {
    /// Creates a set operation.
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a remove operation.
    #[must_use]
    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }
}

/// Errors raised by storage backends that persist outside the process.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Port for the shared per-origin key-value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Reads one key.
    fn get(&self, key: &str) -> Option<String>;

    /// Reads several keys as one consistent snapshot.
    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Applies a batch of writes as a unit.
    ///
    /// The in-memory view is always updated; an error means the batch could
    /// not be made durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend failed to persist the batch.
    fn apply(&self, writes: &[StorageWrite]) -> Result<(), StorageError>;
}
