//! # flowgraph-state - Thread State Persistence and Audited Modification
//!
//! This crate holds the execution state of workflow threads: where it is stored,
//! how it is changed, and how those changes are recorded.
//!
//! # Overview
//!
//! - **[`WorkflowState`]** - ordered map of named JSON fields for one thread
//! - **[`StateStore`]** - async persistence of snapshots plus an append-only history
//! - **[`StateModifier`]** - pause/resume, field updates, appends, deletes,
//!   batch mutation, checkpoints, snapshots
//! - **[`StateModification`]** - immutable audit record with the previous value
//! - **[`StateSchema`]** - optional field registry the modifier checks writes against
//! - **[`StateMigrator`]** - compatibility filter applied when resuming
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  StateModifier                                │
//! │  • per-thread lock                            │
//! │  • load → mutate copy → log records → save    │
//! └───────────────┬──────────────────────────────┘
//!                 │
//!                 ↓
//! ┌──────────────────────────────────────────────┐
//! │  StateStore                                   │
//! │  {thread_id}                  live snapshot   │
//! │  {thread_id}:checkpoint:{n}   checkpoint      │
//! │  history[{thread_id}]         audit records   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flowgraph_state::{InMemoryStateStore, StateModifier, StateStore, WorkflowState};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> flowgraph_state::Result<()> {
//!     let store = Arc::new(InMemoryStateStore::new());
//!     store.save("t1", &WorkflowState::from_value(json!({"v": 0}))?).await?;
//!
//!     let modifier = StateModifier::new(store);
//!     let mut update = serde_json::Map::new();
//!     update.insert("v".into(), json!(10));
//!     modifier.modify_state("t1", update).await?;
//!
//!     let history = modifier.get_modification_history("t1").await?;
//!     assert_eq!(history.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod keys;
pub mod migration;
pub mod modification;
pub mod modifier;
pub mod schema;
pub mod state;
pub mod store;

pub use error::{Result, StateError};
pub use migration::{NoopMigrator, StateMigrator, StrictVersionMigrator};
pub use modification::{ModificationType, StateModification};
pub use modifier::{BatchOperation, StateModifier, StateSnapshot};
pub use schema::{FieldKind, StateSchema};
pub use state::WorkflowState;
pub use store::{InMemoryStateStore, StateStore};
