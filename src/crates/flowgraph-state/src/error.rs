//! Error types for state persistence and modification

use thiserror::Error;

/// Result type for state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while loading, saving, or mutating thread state
#[derive(Error, Debug)]
pub enum StateError {
    /// No state has been saved under this thread id
    #[error("State not found for thread: {0}")]
    NotFound(String),

    /// Named checkpoint does not exist for the thread
    #[error("Checkpoint '{name}' not found for thread '{thread_id}'")]
    CheckpointNotFound { thread_id: String, name: String },

    /// Field is absent from the thread's state
    #[error("Field '{field}' not found in state of thread '{thread_id}'")]
    FieldNotFound { thread_id: String, field: String },

    /// Append targeted a field that is not a sequence
    #[error("Field '{field}' is not a sequence (found {found})")]
    NotASequence { field: String, found: String },

    /// Mutation rejected by the configured field schema
    #[error("Schema violation: {0}")]
    Schema(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// State could not be migrated to the requested version
    #[error("Migration to version '{target}' failed: {reason}")]
    Migration { target: String, reason: String },
}

impl StateError {
    pub fn field_not_found(thread_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            thread_id: thread_id.into(),
            field: field.into(),
        }
    }

    pub fn checkpoint_not_found(thread_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::CheckpointNotFound {
            thread_id: thread_id.into(),
            name: name.into(),
        }
    }

    /// Whether the error means "nothing stored", as opposed to a real failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::CheckpointNotFound { .. } | Self::FieldNotFound { .. }
        )
    }
}
