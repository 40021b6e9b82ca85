//! In-process object storage.
//!
//! Used by tests and by local development when no bucket is configured. Failures can be
//! injected per key to exercise the cleanup retry paths.

use super::{ObjectEntry, ObjectStorage, Result, StorageError, paths};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Bytes>,
    failing_removes: HashSet<String>,
    sticky: HashSet<String>,
    failing_lists: bool,
    remove_calls: HashMap<String, u32>,
}

#[derive(Debug)]
pub struct MemoryStorage {
    base_url: Url,
    bucket: String,
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new(base_url: Url, bucket: impl Into<String>) -> Self {
        Self {
            base_url,
            bucket: bucket.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-update
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store an object directly, bypassing upload bookkeeping
    pub fn insert(&self, key: &str, content: impl Into<Bytes>) {
        self.state().objects.insert(key.to_string(), content.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    /// Make every removal of `key` fail with a server error
    pub fn fail_removes_of(&self, key: &str) {
        self.state().failing_removes.insert(key.to_string());
    }

    /// Make removals of `key` report success while the object stays in place
    pub fn make_sticky(&self, key: &str) {
        self.state().sticky.insert(key.to_string());
    }

    /// Make every listing fail with a server error
    pub fn fail_lists(&self, fail: bool) {
        self.state().failing_lists = fail;
    }

    /// Number of removal requests made for `key`
    pub fn remove_calls(&self, key: &str) -> u32 {
        self.state().remove_calls.get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        paths::public_url(&self.base_url, &self.bucket, key)
    }

    async fn upload(&self, key: &str, content: Bytes, _content_type: &str, upsert: bool) -> Result<String> {
        let mut state = self.state();
        if !upsert && state.objects.contains_key(key) {
            return Err(StorageError::Status {
                status: 409,
                body: "The resource already exists".to_string(),
            });
        }
        state.objects.insert(key.to_string(), content);
        drop(state);
        Ok(self.public_url(key))
    }

    async fn list(&self, directory: &str, search: &str) -> Result<Vec<ObjectEntry>> {
        let state = self.state();
        if state.failing_lists {
            return Err(StorageError::Status {
                status: 500,
                body: "list failed".to_string(),
            });
        }
        let entries = state
            .objects
            .keys()
            .filter_map(|key| {
                let (dir, name) = paths::split_key(key);
                (dir == directory && name.contains(search)).then(|| ObjectEntry { name: name.to_string() })
            })
            .collect();
        Ok(entries)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state();
        *state.remove_calls.entry(key.to_string()).or_default() += 1;
        if state.failing_removes.contains(key) {
            return Err(StorageError::Status {
                status: 500,
                body: "remove failed".to_string(),
            });
        }
        if !state.sticky.contains(key) {
            state.objects.remove(key);
        }
        Ok(())
    }
}
