//! Test doubles for the ports.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tradepoint_domain::{ApiRequest, ApiResponse};

use crate::ports::{KeyValueStorage, StorageError, StorageWrite, Transport, TransportError};

/// In-memory storage for a single tab.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    batches: Mutex<Vec<Vec<StorageWrite>>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let storage = Self::default();
        storage.entries.lock().extend(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        );
        Arc::new(storage)
    }

    /// Batches applied so far, oldest first.
    pub fn batches(&self) -> Vec<Vec<StorageWrite>> {
        self.batches.lock().clone()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let entries = self.entries.lock();
        keys.iter().map(|key| entries.get(*key).cloned()).collect()
    }

    fn apply(&self, writes: &[StorageWrite]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        for write in writes {
            match write {
                StorageWrite::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                StorageWrite::Remove { key } => {
                    entries.remove(key);
                }
            }
        }
        self.batches.lock().push(writes.to_vec());
        Ok(())
    }
}

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport answering from a closure, recording every request it sees.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            delays: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Holds responses for `path` back by `delay`.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().insert(path.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let delay = self.delays.lock().get(&request.path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(request)
    }
}

/// Accepts `Bearer {valid}` on every path, 401 otherwise.
pub fn bearer_gate(request: &ApiRequest, valid: &str) -> ApiResponse {
    if request.authorization() == Some(format!("Bearer {valid}").as_str()) {
        ApiResponse::json(200, &serde_json::json!({"ok": true}))
    } else {
        ApiResponse::json(
            401,
            &serde_json::json!({"detail": "Given token not valid for any token type"}),
        )
    }
}
