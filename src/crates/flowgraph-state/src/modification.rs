//! Audit records for state mutations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name used by the record logged when a checkpoint is restored
pub const RESTORE_FIELD: &str = "_restore";

/// Kind of mutation a [`StateModification`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationType {
    Update,
    Delete,
    Append,
}

/// One immutable entry in a thread's modification history
///
/// `previous` holds the field's value before the mutation so that the
/// history can be used to undo changes. For appends, `value` is the appended
/// element and `previous` is the sequence before it was extended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateModification {
    pub modification_type: ModificationType,
    pub field: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl StateModification {
    pub fn new(
        modification_type: ModificationType,
        field: impl Into<String>,
        value: Value,
        previous: Option<Value>,
    ) -> Self {
        Self {
            modification_type,
            field: field.into(),
            value,
            previous,
            timestamp: Utc::now(),
        }
    }

    pub fn update(field: impl Into<String>, value: Value, previous: Option<Value>) -> Self {
        Self::new(ModificationType::Update, field, value, previous)
    }

    pub fn delete(field: impl Into<String>, previous: Value) -> Self {
        Self::new(ModificationType::Delete, field, Value::Null, Some(previous))
    }

    pub fn append(field: impl Into<String>, value: Value, previous: Option<Value>) -> Self {
        Self::new(ModificationType::Append, field, value, previous)
    }

    /// Record logged when a named checkpoint is copied back onto a thread
    pub fn restore(checkpoint_name: impl Into<String>) -> Self {
        Self::new(
            ModificationType::Update,
            RESTORE_FIELD,
            Value::String(checkpoint_name.into()),
            None,
        )
    }

    pub fn is_restore(&self) -> bool {
        self.field == RESTORE_FIELD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ModificationType::Append).unwrap(),
            json!("append")
        );
    }

    #[test]
    fn test_delete_keeps_previous_value() {
        let record = StateModification::delete("draft", json!("text"));
        assert_eq!(record.modification_type, ModificationType::Delete);
        assert_eq!(record.previous, Some(json!("text")));
    }

    #[test]
    fn test_restore_record() {
        let record = StateModification::restore("before-deploy");
        assert!(record.is_restore());
        assert_eq!(record.value, json!("before-deploy"));
    }
}
