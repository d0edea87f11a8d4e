//! Error types for graph construction, routing, approval, and execution
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation         - Graph structure violations (all of them, at once)
//! ├── NotFound           - Unknown node, thread, or request
//! ├── NodeExecution      - A node action failed
//! ├── ApprovalTimeout    - No decision within the approval timeout
//! ├── Approval           - Invalid approval transition
//! ├── Expression         - Condition failed to compile
//! ├── State              - Persistence or modification errors
//! ├── StepLimitExceeded  - Executor ran past its step budget
//! ├── Configuration      - Invalid engine configuration
//! └── Serialization      - JSON errors
//! ```
//!
//! Predicate failures never appear here. Edges and routers treat them as
//! "not taken", interrupt conditions as "do not interrupt", and both log them.
//!
//! # Matching Specific Errors
//!
//! ```rust,ignore
//! use flowgraph_core::GraphError;
//!
//! match builder.build() {
//!     Ok(graph) => run(graph),
//!     Err(GraphError::Validation(violations)) => {
//!         for v in violations {
//!             eprintln!("invalid graph: {}", v);
//!         }
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

use flowgraph_state::StateError;

use crate::approval::ApprovalError;
use crate::expression::ExpressionError;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while building or running a graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure is invalid
    #[error("Graph validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Lookup of an unknown entity
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A node action returned an error
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    /// Approval was not decided in time
    #[error("Approval for '{node}' on '{state_id}' timed out after {timeout_ms}ms")]
    ApprovalTimeout {
        state_id: String,
        node: String,
        timeout_ms: u64,
    },

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("Invalid condition expression: {0}")]
    Expression(#[from] ExpressionError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Executor stopped before the graph finished
    #[error("Step limit of {limit} exceeded on thread '{thread_id}'")]
    StepLimitExceeded { thread_id: String, limit: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn node_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Node",
            name: name.into(),
        }
    }

    pub fn request_not_found(state_id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Approval request",
            name: state_id.into(),
        }
    }

    pub fn node_execution(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.to_string(),
        }
    }

    /// Individual violations when this is a validation error
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::State(e) => e.is_not_found(),
            _ => false,
        }
    }
}
