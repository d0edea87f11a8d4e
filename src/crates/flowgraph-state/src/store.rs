//! State Store - keyed persistence of thread snapshots and their audit history
//!
//! A [`StateStore`] holds two things per key:
//!
//! - the latest [`WorkflowState`] snapshot saved under that key
//! - an append-only list of [`StateModification`] records
//!
//! Keys are either bare thread ids (live state) or checkpoint keys produced by
//! [`keys::checkpoint_key`](crate::keys::checkpoint_key). The store itself does
//! not interpret keys beyond excluding checkpoint keys from
//! [`list_threads`](StateStore::list_threads).
//!
//! # Semantics
//!
//! - `save` is last-write-wins. Nothing here serializes concurrent writers;
//!   the [`StateModifier`](crate::StateModifier) does that per thread.
//! - `load` of an unknown key is [`StateError::NotFound`].
//! - `delete` removes the snapshot together with its history.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use flowgraph_state::{StateStore, WorkflowState, StateModification, Result};
//!
//! struct RedisStateStore { /* ... */ }
//!
//! #[async_trait]
//! impl StateStore for RedisStateStore {
//!     async fn save(&self, thread_id: &str, state: &WorkflowState) -> Result<()> {
//!         let json = serde_json::to_string(state)?;
//!         // SET thread_id json
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, StateError};
use crate::keys;
use crate::modification::StateModification;
use crate::state::WorkflowState;

/// Persistence backend for thread state and modification history
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a snapshot under `thread_id`, replacing any previous one
    async fn save(&self, thread_id: &str, state: &WorkflowState) -> Result<()>;

    /// Load the snapshot stored under `thread_id`
    async fn load(&self, thread_id: &str) -> Result<WorkflowState>;

    /// Load the snapshot if one exists
    async fn try_load(&self, thread_id: &str) -> Result<Option<WorkflowState>> {
        match self.load(thread_id).await {
            Ok(state) => Ok(Some(state)),
            Err(StateError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, thread_id: &str) -> Result<bool>;

    /// Remove the snapshot and its history, returning whether a snapshot existed
    async fn delete(&self, thread_id: &str) -> Result<bool>;

    /// Live thread ids, sorted, excluding checkpoint keys
    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut threads: Vec<String> = self
            .list_keys(None)
            .await?
            .into_iter()
            .filter(|key| !keys::is_checkpoint_key(key))
            .collect();
        threads.sort();
        Ok(threads)
    }

    /// All stored keys, optionally restricted to a prefix
    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>>;

    async fn append_history(&self, thread_id: &str, record: StateModification) -> Result<()>;

    /// Modification history of `thread_id` in the order it was appended
    async fn history(&self, thread_id: &str) -> Result<Vec<StateModification>>;
}

/// In-memory [`StateStore`] for development and tests
///
/// Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    snapshots: Arc<RwLock<HashMap<String, WorkflowState>>>,
    history: Arc<RwLock<HashMap<String, Vec<StateModification>>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots, checkpoints included
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, thread_id: &str, state: &WorkflowState) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<WorkflowState> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(thread_id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(thread_id.to_string()))
    }

    async fn exists(&self, thread_id: &str) -> Result<bool> {
        Ok(self.snapshots.read().await.contains_key(thread_id))
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let removed = self.snapshots.write().await.remove(thread_id).is_some();
        self.history.write().await.remove(thread_id);
        Ok(removed)
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let snapshots = self.snapshots.read().await;
        let keys = match prefix {
            Some(p) => snapshots.keys().filter(|k| k.starts_with(p)).cloned().collect(),
            None => snapshots.keys().cloned().collect(),
        };
        Ok(keys)
    }

    async fn append_history(&self, thread_id: &str, record: StateModification) -> Result<()> {
        let mut history = self.history.write().await;
        history.entry(thread_id.to_string()).or_default().push(record);
        Ok(())
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<StateModification>> {
        let history = self.history.read().await;
        Ok(history.get(thread_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: serde_json::Value) -> WorkflowState {
        WorkflowState::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryStateStore::new();
        store.save("t1", &state(json!({"v": 1}))).await.unwrap();

        let loaded = store.load("t1").await.unwrap();
        assert_eq!(loaded.get("v"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = InMemoryStateStore::new();
        let err = store.load("nope").await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(id) if id == "nope"));
        assert!(store.try_load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_is_last_write_wins() {
        let store = InMemoryStateStore::new();
        store.save("t1", &state(json!({"v": 1}))).await.unwrap();
        store.save("t1", &state(json!({"v": 2}))).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap().get("v"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_delete_removes_snapshot_and_history() {
        let store = InMemoryStateStore::new();
        store.save("t1", &state(json!({"v": 1}))).await.unwrap();
        store
            .append_history("t1", StateModification::update("v", json!(1), None))
            .await
            .unwrap();

        assert!(store.delete("t1").await.unwrap());
        assert!(!store.exists("t1").await.unwrap());
        assert!(store.history("t1").await.unwrap().is_empty());
        assert!(!store.delete("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_threads_excludes_checkpoints() {
        let store = InMemoryStateStore::new();
        store.save("b", &WorkflowState::new()).await.unwrap();
        store.save("a", &WorkflowState::new()).await.unwrap();
        store
            .save(&keys::checkpoint_key("a", "cp1"), &WorkflowState::new())
            .await
            .unwrap();

        assert_eq!(store.list_threads().await.unwrap(), vec!["a", "b"]);
        assert_eq!(
            store.list_keys(Some(&keys::checkpoint_prefix("a"))).await.unwrap(),
            vec!["a:checkpoint:cp1"]
        );
    }

    #[tokio::test]
    async fn test_history_preserves_order() {
        let store = InMemoryStateStore::new();
        for i in 0..3 {
            store
                .append_history("t1", StateModification::update("v", json!(i), None))
                .await
                .unwrap();
        }
        let values: Vec<_> = store
            .history("t1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![json!(0), json!(1), json!(2)]);
    }
}
