//! Workflow state container
//!
//! [`WorkflowState`] is the value every node reads and every modification
//! writes: an ordered JSON object of named fields. It serializes transparently
//! as that object, so a snapshot on disk is exactly the map of fields.
//!
//! Cloning always produces a deep, independent copy. Snapshots, checkpoints,
//! and batch working copies rely on that.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_state::WorkflowState;
//! use serde_json::json;
//!
//! let mut state = WorkflowState::from_value(json!({"value": 150, "user": {"tier": "gold"}}))?;
//! assert_eq!(state.get("value"), Some(&json!(150)));
//! assert_eq!(state.get_path("user.tier"), Some(&json!("gold")));
//!
//! state.set("status", json!("running"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StateError};

/// Reserved field toggled by pause/resume
pub const STATUS_FIELD: &str = "status";

/// Value written to [`STATUS_FIELD`] when a workflow is paused
pub const STATUS_PAUSED: &str = "paused";

/// Value written to [`STATUS_FIELD`] when a workflow is resumed
pub const STATUS_RUNNING: &str = "running";

/// Value written to [`STATUS_FIELD`] when an approval was refused and the run ended
pub const STATUS_REJECTED: &str = "rejected";

/// Ordered map of named fields describing one thread's execution state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    fields: Map<String, Value>,
}

impl WorkflowState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(StateError::Schema(format!(
                "workflow state must be a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Resolve a dotted path such as `user.tier` or `items.0`
    ///
    /// Numeric segments index into arrays. Returns `None` as soon as any
    /// segment is missing.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a field, returning the value it replaced
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Shallow-merge a partial update into this state
    pub fn merge(&mut self, update: Map<String, Value>) {
        for (field, value) in update {
            self.fields.insert(field, value);
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Current value of the `status` field, if it is a string
    pub fn status(&self) -> Option<&str> {
        self.fields.get(STATUS_FIELD).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for WorkflowState {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<WorkflowState> for Value {
    fn from(state: WorkflowState) -> Self {
        Value::Object(state.fields)
    }
}

impl TryFrom<Value> for WorkflowState {
    type Error = StateError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// Short JSON type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
