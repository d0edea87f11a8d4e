//! Nodes and edges
//!
//! A [`Node`] is a named asynchronous action that receives a copy of the
//! thread's state and returns a partial update. An [`Edge`] connects two nodes
//! and may carry a [`Predicate`] deciding whether it can be traversed.
//!
//! Edge conditions fail closed: a predicate that errors or panics makes the
//! edge non-traversable, and the failure is logged.
//!
//! ```rust,ignore
//! use flowgraph_core::{Edge, Node, Predicate};
//! use serde_json::{json, Map};
//!
//! let node = Node::new("score", |state| async move {
//!     let mut update = Map::new();
//!     update.insert("score".into(), json!(42));
//!     Ok(update)
//! });
//!
//! let edge = Edge::conditional("score", "review", Predicate::expression("state.score > 40")?);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use flowgraph_state::WorkflowState;

use crate::predicate::{Predicate, PredicateError};

/// Node identifier
pub type NodeId = String;

/// Boxed error returned by node actions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Partial state update produced by a node
pub type NodeOutput = std::result::Result<Map<String, Value>, BoxError>;

/// Type-erased asynchronous node action
pub type NodeAction = Arc<dyn Fn(WorkflowState) -> BoxFuture<'static, NodeOutput> + Send + Sync>;

/// Named step of a workflow
#[derive(Clone)]
pub struct Node {
    pub name: NodeId,
    pub action: NodeAction,
    pub metadata: Map<String, Value>,
}

impl Node {
    pub fn new<F, Fut>(name: impl Into<NodeId>, action: F) -> Self
    where
        F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeOutput> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(move |state| action(state).boxed()),
            metadata: Map::new(),
        }
    }

    /// Node whose action returns an empty update
    pub fn passthrough(name: impl Into<NodeId>) -> Self {
        Self::new(name, |_| async { Ok::<_, BoxError>(Map::new()) })
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub async fn run(&self, state: WorkflowState) -> NodeOutput {
        (self.action)(state).await
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("action", &"<function>")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Directed transition between two nodes
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub condition: Option<Predicate>,
    pub metadata: Map<String, Value>,
}

impl Edge {
    /// Unconditional edge
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
            metadata: Map::new(),
        }
    }

    pub fn conditional(from: impl Into<NodeId>, to: impl Into<NodeId>, condition: Predicate) -> Self {
        Self {
            condition: Some(condition),
            ..Self::new(from, to)
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Evaluate the condition, surfacing predicate failures
    pub fn try_traverse(&self, state: &WorkflowState) -> Result<bool, PredicateError> {
        match &self.condition {
            None => Ok(true),
            Some(condition) => condition.evaluate(state),
        }
    }

    /// Whether the edge can be taken; a failing condition counts as false
    pub fn can_traverse(&self, state: &WorkflowState) -> bool {
        match self.try_traverse(state) {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(from = %self.from, to = %self.to, error = %e, "Edge condition failed, edge not traversable");
                false
            }
        }
    }
}
