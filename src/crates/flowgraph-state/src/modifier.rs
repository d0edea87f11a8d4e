//! State Modifier - audited mutation façade over a [`StateStore`]
//!
//! Every operation here loads a thread's state, applies a mutation to an
//! in-memory copy, appends one [`StateModification`] record per changed field to
//! the thread's history, and then saves the copy. Records are appended before
//! the save, so a failed save can leave history ahead of state but never the
//! other way round.
//!
//! # Overview
//!
//! - **Pause / resume** - toggle the `status` field when the state has one
//! - **Field mutation** - update, append, delete
//! - **Batch mutation** - ordered mixed operations, one save
//! - **Checkpoints** - named snapshots under `{thread_id}:checkpoint:{name}`
//! - **Inspection** - modification history and point-in-time snapshots
//! - **Cleanup** - [`StateModifier::delete_thread`] drops state, history and checkpoints
//! - **Resumption** - load through a pluggable [`StateMigrator`]
//!
//! # Concurrency
//!
//! Mutations of one thread id through the same modifier (or its clones) are
//! serialized by a per-thread async lock, so two concurrent `modify_state` calls
//! never lose each other's fields. Code that calls [`StateStore::save`]
//! directly bypasses the lock and stays last-write-wins. A lock lives only
//! while some call holds or awaits it, so the table tracks active threads
//! rather than every thread ever seen.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flowgraph_state::{InMemoryStateStore, StateModifier, StateStore, WorkflowState};
//! use serde_json::json;
//!
//! let store = Arc::new(InMemoryStateStore::new());
//! store.save("t1", &WorkflowState::from_value(json!({"v": 0, "status": "running"}))?).await?;
//!
//! let modifier = StateModifier::new(store);
//! modifier.create_checkpoint("t1", "before").await?;
//! modifier.modify_state("t1", json!({"v": 10}).as_object().cloned().unwrap()).await?;
//! modifier.pause_workflow("t1").await?;
//!
//! // Undo everything
//! modifier.restore_checkpoint("t1", "before").await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Result, StateError};
use crate::keys;
use crate::migration::{NoopMigrator, StateMigrator};
use crate::modification::StateModification;
use crate::schema::StateSchema;
use crate::state::{
    type_name, WorkflowState, STATUS_FIELD, STATUS_PAUSED, STATUS_REJECTED, STATUS_RUNNING,
};
use crate::store::StateStore;

/// One step of a [`StateModifier::batch_modify`] call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchOperation {
    Update { field: String, value: Value },
    Delete { field: String },
    Append { field: String, value: Value },
}

impl BatchOperation {
    pub fn update(field: impl Into<String>, value: Value) -> Self {
        Self::Update {
            field: field.into(),
            value,
        }
    }

    pub fn delete(field: impl Into<String>) -> Self {
        Self::Delete {
            field: field.into(),
        }
    }

    pub fn append(field: impl Into<String>, value: Value) -> Self {
        Self::Append {
            field: field.into(),
            value,
        }
    }
}

/// Point-in-time copy of a thread's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub thread_id: String,
    pub state: WorkflowState,
    pub timestamp: DateTime<Utc>,
}

/// Audited mutation façade over a [`StateStore`]
#[derive(Clone)]
pub struct StateModifier {
    store: Arc<dyn StateStore>,
    schema: Option<Arc<StateSchema>>,
    migrator: Arc<dyn StateMigrator>,
    locks: LockTable,
}

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Held per-thread lock; drops its table entry when nobody else holds or awaits it
struct ThreadGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockTable,
    thread_id: String,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        let idle = locks
            .get(&self.thread_id)
            .map_or(false, |lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.thread_id);
        }
    }
}

impl std::fmt::Debug for StateModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateModifier")
            .field("store", &"<store>")
            .field("schema", &self.schema)
            .field("migrator", &"<migrator>")
            .finish()
    }
}

impl StateModifier {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            schema: None,
            migrator: Arc::new(NoopMigrator),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check every mutation against `schema`
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn with_migrator(mut self, migrator: Arc<dyn StateMigrator>) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn schema(&self) -> Option<&StateSchema> {
        self.schema.as_deref()
    }

    async fn lock_thread(&self, thread_id: &str) -> ThreadGuard {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        ThreadGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            thread_id: thread_id.to_string(),
        }
    }

    /// Number of threads with a lock currently held or awaited
    pub fn active_locks(&self) -> usize {
        self.locks.lock().len()
    }

    async fn commit(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        records: Vec<StateModification>,
    ) -> Result<()> {
        for record in records {
            self.store.append_history(thread_id, record).await?;
        }
        self.store.save(thread_id, state).await
    }

    fn apply_update(
        &self,
        state: &mut WorkflowState,
        field: &str,
        value: Value,
    ) -> Result<StateModification> {
        if let Some(schema) = &self.schema {
            schema.check_assign(field, &value)?;
        }
        let previous = state.set(field, value.clone());
        Ok(StateModification::update(field, value, previous))
    }

    fn apply_delete(
        &self,
        thread_id: &str,
        state: &mut WorkflowState,
        field: &str,
    ) -> Result<StateModification> {
        if let Some(schema) = &self.schema {
            schema.check_delete(field)?;
        }
        let previous = state
            .remove(field)
            .ok_or_else(|| StateError::field_not_found(thread_id, field))?;
        tracing::debug!(thread_id, field, previous = %previous, "Deleting state field");
        Ok(StateModification::delete(field, previous))
    }

    fn apply_append(
        &self,
        state: &mut WorkflowState,
        field: &str,
        value: Value,
    ) -> Result<StateModification> {
        if let Some(schema) = &self.schema {
            schema.check_append(field)?;
        }
        match state.get_mut(field) {
            Some(Value::Array(items)) => {
                let previous = Value::Array(items.clone());
                items.push(value.clone());
                Ok(StateModification::append(field, value, Some(previous)))
            }
            Some(other) => Err(StateError::NotASequence {
                field: field.to_string(),
                found: type_name(other).to_string(),
            }),
            None => {
                state.set(field, Value::Array(vec![value.clone()]));
                Ok(StateModification::append(field, value, None))
            }
        }
    }

    fn supports_status(&self, state: &WorkflowState) -> bool {
        state.contains(STATUS_FIELD)
            || self
                .schema
                .as_ref()
                .map(|s| s.declares(STATUS_FIELD))
                .unwrap_or(false)
    }

    async fn set_status(&self, thread_id: &str, status: &str) -> Result<bool> {
        let _guard = self.lock_thread(thread_id).await;
        let mut state = self.store.load(thread_id).await?;

        if !self.supports_status(&state) {
            tracing::debug!(thread_id, status, "State has no status field, not toggling");
            return Ok(false);
        }

        let record = self.apply_update(&mut state, STATUS_FIELD, Value::from(status))?;
        self.commit(thread_id, &state, vec![record]).await?;
        tracing::info!(thread_id, status, "Workflow status changed");
        Ok(true)
    }

    /// Save a whole state under the thread lock without logging history
    ///
    /// Used to seed a thread before any audited mutation happens.
    pub async fn save_state(&self, thread_id: &str, state: &WorkflowState) -> Result<()> {
        if let Some(schema) = &self.schema {
            schema.validate(state)?;
        }
        let _guard = self.lock_thread(thread_id).await;
        self.store.save(thread_id, state).await
    }

    pub async fn load_state(&self, thread_id: &str) -> Result<WorkflowState> {
        self.store.load(thread_id).await
    }

    /// Set `status` to `"paused"`, returning whether the state supports it
    pub async fn pause_workflow(&self, thread_id: &str) -> Result<bool> {
        self.set_status(thread_id, STATUS_PAUSED).await
    }

    /// Set `status` to `"running"`, returning whether the state supports it
    pub async fn resume_workflow(&self, thread_id: &str) -> Result<bool> {
        self.set_status(thread_id, STATUS_RUNNING).await
    }

    /// Set `status` to `"rejected"`, returning whether the state supports it
    pub async fn reject_workflow(&self, thread_id: &str) -> Result<bool> {
        self.set_status(thread_id, STATUS_REJECTED).await
    }

    /// Update several fields, logging one record per field
    pub async fn modify_state(
        &self,
        thread_id: &str,
        updates: Map<String, Value>,
    ) -> Result<WorkflowState> {
        let _guard = self.lock_thread(thread_id).await;
        let mut state = self.store.load(thread_id).await?;

        let mut records = Vec::with_capacity(updates.len());
        for (field, value) in updates {
            records.push(self.apply_update(&mut state, &field, value)?);
        }

        tracing::debug!(thread_id, fields = records.len(), "Modifying state");
        self.commit(thread_id, &state, records).await?;
        Ok(state)
    }

    /// Append to a sequence field, creating it if absent
    pub async fn append_to_field(
        &self,
        thread_id: &str,
        field: &str,
        value: Value,
    ) -> Result<WorkflowState> {
        let _guard = self.lock_thread(thread_id).await;
        let mut state = self.store.load(thread_id).await?;

        let record = self.apply_append(&mut state, field, value)?;
        self.commit(thread_id, &state, vec![record]).await?;
        Ok(state)
    }

    pub async fn delete_field(&self, thread_id: &str, field: &str) -> Result<WorkflowState> {
        let _guard = self.lock_thread(thread_id).await;
        let mut state = self.store.load(thread_id).await?;

        let record = self.apply_delete(thread_id, &mut state, field)?;
        self.commit(thread_id, &state, vec![record]).await?;
        Ok(state)
    }

    /// Apply mixed operations in order with a single save
    ///
    /// All operations run against an in-memory copy. If any fails, nothing is
    /// logged or saved. Once every operation succeeded the records are logged
    /// and the copy saved; a storage failure at that point is not rolled back.
    pub async fn batch_modify(
        &self,
        thread_id: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<WorkflowState> {
        let _guard = self.lock_thread(thread_id).await;
        let mut state = self.store.load(thread_id).await?;

        let mut records = Vec::with_capacity(operations.len());
        for operation in operations {
            let record = match operation {
                BatchOperation::Update { field, value } => {
                    self.apply_update(&mut state, &field, value)
                }
                BatchOperation::Delete { field } => self.apply_delete(thread_id, &mut state, &field),
                BatchOperation::Append { field, value } => {
                    self.apply_append(&mut state, &field, value)
                }
            };
            match record {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(thread_id, error = %e, "Batch modification aborted");
                    return Err(e);
                }
            }
        }

        self.commit(thread_id, &state, records).await?;
        Ok(state)
    }

    /// Copy the current state to a named checkpoint, overwriting any previous one
    pub async fn create_checkpoint(&self, thread_id: &str, name: &str) -> Result<()> {
        let _guard = self.lock_thread(thread_id).await;
        let state = self.store.load(thread_id).await?;
        self.store
            .save(&keys::checkpoint_key(thread_id, name), &state)
            .await?;
        tracing::info!(thread_id, checkpoint = name, "Checkpoint created");
        Ok(())
    }

    /// Copy a named checkpoint back onto the thread
    pub async fn restore_checkpoint(&self, thread_id: &str, name: &str) -> Result<WorkflowState> {
        let _guard = self.lock_thread(thread_id).await;
        let state = self
            .store
            .try_load(&keys::checkpoint_key(thread_id, name))
            .await?
            .ok_or_else(|| StateError::checkpoint_not_found(thread_id, name))?;

        self.commit(thread_id, &state, vec![StateModification::restore(name)])
            .await?;
        tracing::info!(thread_id, checkpoint = name, "Checkpoint restored");
        Ok(state)
    }

    /// Checkpoint names of a thread, sorted
    pub async fn list_checkpoints(&self, thread_id: &str) -> Result<Vec<String>> {
        let prefix = keys::checkpoint_prefix(thread_id);
        let mut names: Vec<String> = self
            .store
            .list_keys(Some(&prefix))
            .await?
            .iter()
            .filter_map(|key| keys::parse_checkpoint_key(key))
            .filter(|(owner, _)| *owner == thread_id)
            .map(|(_, name)| name.to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    pub async fn delete_checkpoint(&self, thread_id: &str, name: &str) -> Result<bool> {
        self.store
            .delete(&keys::checkpoint_key(thread_id, name))
            .await
    }

    /// Remove a thread's state, history and checkpoints
    ///
    /// Returns whether the thread existed.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool> {
        let _guard = self.lock_thread(thread_id).await;
        for name in self.list_checkpoints(thread_id).await? {
            self.store
                .delete(&keys::checkpoint_key(thread_id, &name))
                .await?;
        }
        let existed = self.store.delete(thread_id).await?;
        if existed {
            tracing::info!(thread_id, "Thread deleted");
        }
        Ok(existed)
    }

    pub async fn get_modification_history(
        &self,
        thread_id: &str,
    ) -> Result<Vec<StateModification>> {
        self.store.history(thread_id).await
    }

    pub async fn get_state_snapshot(&self, thread_id: &str) -> Result<StateSnapshot> {
        let state = self.store.load(thread_id).await?;
        Ok(StateSnapshot {
            thread_id: thread_id.to_string(),
            state,
            timestamp: Utc::now(),
        })
    }

    /// Load a thread and pass it through the configured migrator
    pub async fn load_for_resume(
        &self,
        thread_id: &str,
        target_version: &str,
    ) -> Result<WorkflowState> {
        let state = self.store.load(thread_id).await?;
        self.migrator.migrate(state, target_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modification::ModificationType;
    use crate::schema::FieldKind;
    use crate::store::InMemoryStateStore;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn seeded(value: Value) -> StateModifier {
        let store = Arc::new(InMemoryStateStore::new());
        store
            .save("t1", &WorkflowState::from_value(value).unwrap())
            .await
            .unwrap();
        StateModifier::new(store)
    }

    #[tokio::test]
    async fn test_modify_state_logs_one_record_per_field() {
        let modifier = seeded(json!({"v": 0})).await;
        modifier
            .modify_state("t1", object(json!({"v": 10, "w": "x"})))
            .await
            .unwrap();

        let history = modifier.get_modification_history("t1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].field, "v");
        assert_eq!(history[0].previous, Some(json!(0)));
        assert_eq!(history[1].previous, None);
    }

    #[tokio::test]
    async fn test_pause_and_resume_toggle_status() {
        let modifier = seeded(json!({"status": "running"})).await;

        assert!(modifier.pause_workflow("t1").await.unwrap());
        let state = modifier.load_state("t1").await.unwrap();
        assert_eq!(state.status(), Some("paused"));

        assert!(modifier.resume_workflow("t1").await.unwrap());
        let state = modifier.load_state("t1").await.unwrap();
        assert_eq!(state.status(), Some("running"));
    }

    #[tokio::test]
    async fn test_pause_without_status_field_is_noop() {
        let modifier = seeded(json!({"v": 1})).await;
        assert!(!modifier.pause_workflow("t1").await.unwrap());
        assert!(!modifier.load_state("t1").await.unwrap().contains("status"));
        assert!(modifier.get_modification_history("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pause_with_declared_status_field() {
        let store = Arc::new(InMemoryStateStore::new());
        store.save("t1", &WorkflowState::new()).await.unwrap();
        let modifier = StateModifier::new(store)
            .with_schema(StateSchema::new().with_field("status", FieldKind::Scalar));

        assert!(modifier.pause_workflow("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_to_field() {
        let modifier = seeded(json!({"log": ["a"], "count": 1})).await;

        let state = modifier.append_to_field("t1", "log", json!("b")).await.unwrap();
        assert_eq!(state.get("log"), Some(&json!(["a", "b"])));

        let state = modifier.append_to_field("t1", "fresh", json!(1)).await.unwrap();
        assert_eq!(state.get("fresh"), Some(&json!([1])));

        let err = modifier.append_to_field("t1", "count", json!(2)).await.unwrap_err();
        assert!(matches!(err, StateError::NotASequence { ref field, .. } if field == "count"));
    }

    #[tokio::test]
    async fn test_delete_field_records_previous() {
        let modifier = seeded(json!({"draft": "text"})).await;
        modifier.delete_field("t1", "draft").await.unwrap();

        let history = modifier.get_modification_history("t1").await.unwrap();
        assert_eq!(history[0].modification_type, ModificationType::Delete);
        assert_eq!(history[0].previous, Some(json!("text")));

        let err = modifier.delete_field("t1", "draft").await.unwrap_err();
        assert!(matches!(err, StateError::FieldNotFound { .. }));
    }

    #[tokio::test]
    async fn test_batch_modify_applies_in_order() {
        let modifier = seeded(json!({"a": 1, "b": 2})).await;
        let state = modifier
            .batch_modify(
                "t1",
                vec![
                    BatchOperation::update("a", json!(5)),
                    BatchOperation::delete("b"),
                    BatchOperation::append("items", json!("x")),
                    BatchOperation::append("items", json!("y")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(state.to_value(), json!({"a": 5, "items": ["x", "y"]}));
        assert_eq!(modifier.get_modification_history("t1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_batch_modify_failure_saves_nothing() {
        let modifier = seeded(json!({"a": 1, "n": 3})).await;
        let result = modifier
            .batch_modify(
                "t1",
                vec![
                    BatchOperation::update("a", json!(99)),
                    BatchOperation::append("n", json!(4)),
                ],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(modifier.load_state("t1").await.unwrap().get("a"), Some(&json!(1)));
        assert!(modifier.get_modification_history("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let modifier = seeded(json!({"v": 0})).await;
        modifier.create_checkpoint("t1", "cp1").await.unwrap();
        modifier.modify_state("t1", object(json!({"v": 9}))).await.unwrap();

        let restored = modifier.restore_checkpoint("t1", "cp1").await.unwrap();
        assert_eq!(restored.to_value(), json!({"v": 0}));
        assert_eq!(modifier.load_state("t1").await.unwrap().to_value(), json!({"v": 0}));

        let history = modifier.get_modification_history("t1").await.unwrap();
        let last = history.last().unwrap();
        assert!(last.is_restore());
        assert_eq!(last.value, json!("cp1"));
    }

    #[tokio::test]
    async fn test_restore_missing_checkpoint() {
        let modifier = seeded(json!({})).await;
        let err = modifier.restore_checkpoint("t1", "nope").await.unwrap_err();
        assert!(matches!(err, StateError::CheckpointNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_and_delete_checkpoints() {
        let modifier = seeded(json!({})).await;
        modifier.create_checkpoint("t1", "b").await.unwrap();
        modifier.create_checkpoint("t1", "a").await.unwrap();

        assert_eq!(modifier.list_checkpoints("t1").await.unwrap(), vec!["a", "b"]);
        assert!(modifier.delete_checkpoint("t1", "a").await.unwrap());
        assert_eq!(modifier.list_checkpoints("t1").await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_snapshot_is_independent_copy() {
        let modifier = seeded(json!({"v": 1})).await;
        let snapshot = modifier.get_state_snapshot("t1").await.unwrap();
        modifier.modify_state("t1", object(json!({"v": 2}))).await.unwrap();

        assert_eq!(snapshot.thread_id, "t1");
        assert_eq!(snapshot.state.get("v"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_schema_rejects_mismatched_update() {
        let store = Arc::new(InMemoryStateStore::new());
        store.save("t1", &WorkflowState::new()).await.unwrap();
        let modifier = StateModifier::new(store)
            .with_schema(StateSchema::new().with_field("messages", FieldKind::Sequence));

        let err = modifier
            .modify_state("t1", object(json!({"messages": "oops"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Schema(_)));
    }

    #[tokio::test]
    async fn test_missing_thread_is_not_found() {
        let modifier = StateModifier::new(Arc::new(InMemoryStateStore::new()));
        let err = modifier.modify_state("ghost", Map::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lock_table_shrinks_after_each_operation() {
        let store = Arc::new(InMemoryStateStore::new());
        let modifier = StateModifier::new(store);

        for i in 0..1_000 {
            let thread_id = format!("t{}", i);
            modifier
                .save_state(&thread_id, &WorkflowState::from_value(json!({"v": i})).unwrap())
                .await
                .unwrap();
            modifier
                .modify_state(&thread_id, object(json!({"v": i + 1})))
                .await
                .unwrap();
        }
        assert_eq!(modifier.active_locks(), 0);

        for i in 0..1_000 {
            assert!(modifier.delete_thread(&format!("t{}", i)).await.unwrap());
        }
        assert_eq!(modifier.active_locks(), 0);
        assert!(modifier.store().list_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_thread_drops_checkpoints_and_history() {
        let modifier = seeded(json!({"v": 0})).await;
        modifier.modify_state("t1", object(json!({"v": 1}))).await.unwrap();
        modifier.create_checkpoint("t1", "before").await.unwrap();

        assert!(modifier.delete_thread("t1").await.unwrap());
        assert!(!modifier.delete_thread("t1").await.unwrap());

        assert!(modifier.load_state("t1").await.unwrap_err().is_not_found());
        assert!(modifier.list_checkpoints("t1").await.unwrap().is_empty());
        assert!(modifier.get_modification_history("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contended_lock_survives_release() {
        let modifier = seeded(json!({"v": 0})).await;
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let modifier = modifier.clone();
                tokio::spawn(async move {
                    modifier
                        .append_to_field("t1", "seen", json!(i))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let state = modifier.load_state("t1").await.unwrap();
        assert_eq!(state.get("seen").and_then(|v| v.as_array()).map(Vec::len), Some(20));
        assert_eq!(modifier.active_locks(), 0);
    }
}
