//! Compatibility filter applied to state loaded for resumption
//!
//! Migration itself is out of scope here. The modifier only guarantees that
//! a configured [`StateMigrator`] sees every state loaded through
//! [`StateModifier::load_for_resume`](crate::StateModifier::load_for_resume).

use crate::error::{Result, StateError};
use crate::state::WorkflowState;

/// Field holding the schema version a state was written with, when present
pub const VERSION_FIELD: &str = "_version";

/// Transforms a loaded state into the shape expected by `target_version`
pub trait StateMigrator: Send + Sync {
    fn migrate(&self, state: WorkflowState, target_version: &str) -> Result<WorkflowState>;
}

/// Migrator that returns states unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMigrator;

impl StateMigrator for NoopMigrator {
    fn migrate(&self, state: WorkflowState, _target_version: &str) -> Result<WorkflowState> {
        Ok(state)
    }
}

/// Migrator that only accepts states already stamped with the target version
///
/// States without a [`VERSION_FIELD`] are stamped and accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictVersionMigrator;

impl StateMigrator for StrictVersionMigrator {
    fn migrate(&self, mut state: WorkflowState, target_version: &str) -> Result<WorkflowState> {
        match state.get(VERSION_FIELD).and_then(|v| v.as_str()) {
            Some(found) if found == target_version => Ok(state),
            Some(found) => Err(StateError::Migration {
                target: target_version.to_string(),
                reason: format!("state was written by version '{}'", found),
            }),
            None => {
                state.set(VERSION_FIELD, target_version.into());
                Ok(state)
            }
        }
    }
}
