//! Optional field registry for workflow state
//!
//! Without a schema, any field may be written with any JSON value. A
//! [`StateSchema`] declares fields up front with a [`FieldKind`] so that the
//! [`StateModifier`](crate::StateModifier) can reject writes that would change a
//! field's shape, appends to non-sequences, or writes to undeclared fields.
//!
//! A schema is either *closed* (the default, undeclared fields are rejected) or
//! *open* (undeclared fields pass through unchecked). Fields whose name starts
//! with `_` are reserved for engine bookkeeping and are never checked.
//!
//! ```rust,ignore
//! use flowgraph_state::{FieldKind, StateSchema};
//!
//! let schema = StateSchema::new()
//!     .with_field("status", FieldKind::Scalar)
//!     .with_field("messages", FieldKind::Sequence)
//!     .with_field("context", FieldKind::Object);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StateError};
use crate::state::{type_name, WorkflowState};

/// Shape a declared field is allowed to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Any JSON value
    Any,
    /// null, bool, number, or string
    Scalar,
    /// JSON array
    Sequence,
    /// JSON object
    Object,
}

impl FieldKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::Scalar => !matches!(value, Value::Array(_) | Value::Object(_)),
            FieldKind::Sequence => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }
}

/// Declared fields of a workflow state
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: HashMap<String, FieldKind>,
    open: bool,
}

impl StateSchema {
    /// Create a closed schema with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema that lets undeclared fields through unchecked
    pub fn open() -> Self {
        Self {
            fields: HashMap::new(),
            open: true,
        }
    }

    pub fn add_field(&mut self, name: impl Into<String>, kind: FieldKind) {
        self.fields.insert(name.into(), kind);
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.add_field(name, kind);
        self
    }

    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).copied()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Names of all declared fields, sorted
    pub fn fields(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    /// Engine bookkeeping fields such as `_version` or `_pending_nodes`
    pub fn is_reserved(field: &str) -> bool {
        field.starts_with('_')
    }

    fn undeclared(&self, field: &str) -> Result<()> {
        if self.open || Self::is_reserved(field) {
            Ok(())
        } else {
            Err(StateError::Schema(format!("field '{}' is not declared", field)))
        }
    }

    /// Check that `value` may be assigned to `field`
    pub fn check_assign(&self, field: &str, value: &Value) -> Result<()> {
        match self.fields.get(field) {
            Some(kind) if kind.accepts(value) => Ok(()),
            Some(kind) => Err(StateError::Schema(format!(
                "field '{}' is declared {:?} but was assigned {}",
                field,
                kind,
                type_name(value)
            ))),
            None => self.undeclared(field),
        }
    }

    /// Check that `field` may be appended to
    pub fn check_append(&self, field: &str) -> Result<()> {
        match self.fields.get(field) {
            Some(FieldKind::Sequence) | Some(FieldKind::Any) => Ok(()),
            Some(kind) => Err(StateError::Schema(format!(
                "field '{}' is declared {:?}, appends require a sequence",
                field, kind
            ))),
            None => self.undeclared(field),
        }
    }

    /// Check that `field` may be deleted
    pub fn check_delete(&self, field: &str) -> Result<()> {
        if self.declares(field) {
            Ok(())
        } else {
            self.undeclared(field)
        }
    }

    /// Check every field currently present in `state`
    pub fn validate(&self, state: &WorkflowState) -> Result<()> {
        for (field, value) in state.as_map() {
            self.check_assign(field, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> StateSchema {
        StateSchema::new()
            .with_field("status", FieldKind::Scalar)
            .with_field("messages", FieldKind::Sequence)
    }

    #[test]
    fn test_assign_checks_kind() {
        let schema = schema();
        assert!(schema.check_assign("status", &json!("paused")).is_ok());
        assert!(schema.check_assign("status", &json!([1])).is_err());
        assert!(schema.check_assign("messages", &json!([])).is_ok());
    }

    #[test]
    fn test_closed_schema_rejects_unknown_fields() {
        let schema = schema();
        assert!(schema.check_assign("other", &json!(1)).is_err());
        assert!(schema.check_append("other").is_err());
        assert!(schema.check_delete("other").is_err());
    }

    #[test]
    fn test_reserved_fields_bypass_closed_schema() {
        let schema = schema();
        assert!(schema.check_assign("_pending_nodes", &json!(["a"])).is_ok());
        assert!(schema.check_delete("_pending_nodes").is_ok());
    }

    #[test]
    fn test_open_schema_allows_unknown_fields() {
        let schema = StateSchema::open().with_field("messages", FieldKind::Sequence);
        assert!(schema.check_assign("other", &json!({"x": 1})).is_ok());
        assert!(schema.check_assign("messages", &json!("nope")).is_err());
    }

    #[test]
    fn test_append_requires_sequence() {
        let schema = schema();
        assert!(schema.check_append("messages").is_ok());
        assert!(schema.check_append("status").is_err());
    }

    #[test]
    fn test_validate_whole_state() {
        let schema = schema();
        let good = WorkflowState::from_value(json!({"status": "running", "messages": []})).unwrap();
        let bad = WorkflowState::from_value(json!({"status": {"nested": true}})).unwrap();
        assert!(schema.validate(&good).is_ok());
        assert!(schema.validate(&bad).is_err());
    }
}
