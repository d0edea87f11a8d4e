//! Integration tests for the state store and modifier
//!
//! These exercise the modifier against a shared in-memory store the way an
//! executor and an operator console would use it concurrently.

use flowgraph_state::{
    keys, BatchOperation, InMemoryStateStore, ModificationType, StateError, StateModifier,
    StateStore, StrictVersionMigrator, WorkflowState,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn state(value: Value) -> WorkflowState {
    WorkflowState::from_value(value).unwrap()
}

#[tokio::test]
async fn test_single_update_produces_single_record() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &state(json!({"v": 0}))).await.unwrap();

    let modifier = StateModifier::new(store.clone());
    modifier.modify_state("t1", object(json!({"v": 10}))).await.unwrap();

    let history = modifier.get_modification_history("t1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].modification_type, ModificationType::Update);
    assert_eq!(history[0].field, "v");
    assert_eq!(history[0].value, json!(10));
    assert_eq!(store.load("t1").await.unwrap().get("v"), Some(&json!(10)));
}

#[tokio::test]
async fn test_delete_then_load_is_not_found() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &state(json!({"v": 0}))).await.unwrap();
    store.delete("t1").await.unwrap();

    assert!(matches!(store.load("t1").await, Err(StateError::NotFound(_))));
}

#[tokio::test]
async fn test_checkpoints_do_not_appear_as_threads() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &state(json!({"v": 0}))).await.unwrap();

    let modifier = StateModifier::new(store.clone());
    modifier.create_checkpoint("t1", "one").await.unwrap();
    modifier.create_checkpoint("t1", "two").await.unwrap();

    assert_eq!(store.list_threads().await.unwrap(), vec!["t1"]);
    assert!(store
        .exists(&keys::checkpoint_key("t1", "two"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_checkpoint_names_are_scoped_to_thread() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &WorkflowState::new()).await.unwrap();
    store.save("t10", &WorkflowState::new()).await.unwrap();

    let modifier = StateModifier::new(store);
    modifier.create_checkpoint("t1", "a").await.unwrap();
    modifier.create_checkpoint("t10", "b").await.unwrap();

    assert_eq!(modifier.list_checkpoints("t1").await.unwrap(), vec!["a"]);
    assert_eq!(modifier.list_checkpoints("t10").await.unwrap(), vec!["b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_modifications_do_not_lose_fields() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &WorkflowState::new()).await.unwrap();
    let modifier = StateModifier::new(store.clone());

    let mut handles = Vec::new();
    for i in 0..32 {
        let modifier = modifier.clone();
        handles.push(tokio::spawn(async move {
            let mut update = Map::new();
            update.insert(format!("field_{}", i), json!(i));
            modifier.modify_state("t1", update).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let final_state = store.load("t1").await.unwrap();
    assert_eq!(final_state.len(), 32);
    assert_eq!(modifier.get_modification_history("t1").await.unwrap().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_every_element() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &state(json!({"log": []}))).await.unwrap();
    let modifier = StateModifier::new(store.clone());

    let mut handles = Vec::new();
    for i in 0..20 {
        let modifier = modifier.clone();
        handles.push(tokio::spawn(async move {
            modifier.append_to_field("t1", "log", json!(i)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let log = store.load("t1").await.unwrap();
    assert_eq!(log.get("log").and_then(Value::as_array).map(Vec::len), Some(20));
}

#[tokio::test]
async fn test_batch_operations_deserialize_from_json() {
    let operations: Vec<BatchOperation> = serde_json::from_value(json!([
        {"type": "update", "field": "a", "value": 1},
        {"type": "append", "field": "log", "value": "x"},
        {"type": "delete", "field": "tmp"}
    ]))
    .unwrap();

    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &state(json!({"tmp": true}))).await.unwrap();
    let modifier = StateModifier::new(store);

    let result = modifier.batch_modify("t1", operations).await.unwrap();
    assert_eq!(result.to_value(), json!({"a": 1, "log": ["x"]}));
}

#[tokio::test]
async fn test_load_for_resume_runs_migrator() {
    let store = Arc::new(InMemoryStateStore::new());
    store.save("t1", &state(json!({"_version": "1"}))).await.unwrap();
    store.save("t2", &state(json!({}))).await.unwrap();

    let modifier = StateModifier::new(store).with_migrator(Arc::new(StrictVersionMigrator));

    assert!(matches!(
        modifier.load_for_resume("t1", "2").await,
        Err(StateError::Migration { .. })
    ));
    let migrated = modifier.load_for_resume("t2", "2").await.unwrap();
    assert_eq!(migrated.get("_version"), Some(&json!("2")));
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn checkpoint_restore_returns_saved_state(
        initial in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8),
        later in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 1..8),
    ) {
        let initial: Map<String, Value> = initial.into_iter().map(|(k, v)| (k, json!(v))).collect();
        let later: Map<String, Value> = later.into_iter().map(|(k, v)| (k, json!(v))).collect();

        let restored = runtime().block_on(async {
            let store = Arc::new(InMemoryStateStore::new());
            store.save("t", &WorkflowState::from_map(initial.clone())).await.unwrap();
            let modifier = StateModifier::new(store);
            modifier.create_checkpoint("t", "cp").await.unwrap();
            modifier.modify_state("t", later).await.unwrap();
            modifier.restore_checkpoint("t", "cp").await.unwrap();
            modifier.load_state("t").await.unwrap()
        });

        prop_assert_eq!(restored.into_map(), initial);
    }
}
