//! Graph builder
//!
//! [`GraphBuilder`] collects nodes, edges, routers, and the entry point, and
//! turns them into an immutable [`CompiledGraph`] once the structure is valid.
//!
//! # Overview
//!
//! - **Eager checks** - `add_node` rejects duplicate names; `add_edge`,
//!   `set_entry_point`, and `add_router` reject undeclared nodes
//! - **Deferred checks** - [`GraphBuilder::remove_node`] does not cascade, so
//!   dangling references can exist until [`GraphBuilder::validate`] reports them
//! - **All violations at once** - `build()` fails with every violation, not
//!   just the first one found
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  GraphBuilder                                 │
//! │  nodes (insertion order) · edges · routers    │
//! │  entry point · metadata                       │
//! └───────────────┬──────────────────────────────┘
//!                 │ build()  ── validate() non-empty → GraphError::Validation
//!                 ↓
//! ┌──────────────────────────────────────────────┐
//! │  CompiledGraph (immutable, Send + Sync)       │
//! │  node index · adjacency · routers             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use flowgraph_core::GraphBuilder;
//! use serde_json::{json, Map};
//!
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_node("draft", |state| async move { Ok(Map::new()) })?
//!     .add_node("review", |state| async move { Ok(Map::new()) })?
//!     .add_node("publish", |state| async move { Ok(Map::new()) })?;
//!
//! builder
//!     .add_edge("draft", "review")?
//!     .add_expression_edge("review", "publish", "state.approved == true")?
//!     .add_expression_edge("review", "draft", "not state.approved")?
//!     .set_entry_point("draft")?;
//!
//! let graph = builder.build()?;
//! assert_eq!(graph.get_next_nodes("review")?, vec!["publish", "draft"]);
//! ```

use std::collections::BTreeMap;
use std::future::Future;

use serde_json::{Map, Value};

use flowgraph_state::WorkflowState;

use crate::compiled::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::graph::{Edge, Node, NodeId, NodeOutput};
use crate::predicate::Predicate;
use crate::router::DynamicRouter;

/// Structural violations of a graph, as human-readable messages
pub(crate) fn structural_violations<'a>(
    has_node: impl Fn(&str) -> bool,
    entry_point: Option<&str>,
    edges: &[Edge],
    routers: impl Iterator<Item = (&'a NodeId, &'a DynamicRouter)>,
) -> Vec<String> {
    let mut violations = Vec::new();

    match entry_point {
        None => violations.push("entry point is not set".to_string()),
        Some(entry) if !has_node(entry) => {
            violations.push(format!("entry point '{}' is not a declared node", entry))
        }
        Some(_) => {}
    }

    for edge in edges {
        if !has_node(&edge.from) {
            violations.push(format!(
                "edge '{}' -> '{}': source '{}' is not a declared node",
                edge.from, edge.to, edge.from
            ));
        }
        if !has_node(&edge.to) {
            violations.push(format!(
                "edge '{}' -> '{}': target '{}' is not a declared node",
                edge.from, edge.to, edge.to
            ));
        }
    }

    for (node, router) in routers {
        if !has_node(node) {
            violations.push(format!(
                "router '{}' on '{}': node '{}' is not a declared node",
                router.name(),
                node,
                node
            ));
        }
        for target in router.targets() {
            if !has_node(target) {
                violations.push(format!(
                    "router '{}' on '{}': target '{}' is not a declared node",
                    router.name(),
                    node,
                    target
                ));
            }
        }
    }

    violations
}

/// Mutable graph under construction
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    routers: BTreeMap<NodeId, DynamicRouter>,
    entry_point: Option<NodeId>,
    metadata: Map<String, Value>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach free-form metadata to the graph
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    fn require_node(&self, name: &str, role: &str) -> Result<()> {
        if self.has_node(name) {
            Ok(())
        } else {
            Err(GraphError::validation(format!(
                "{} '{}' is not a declared node",
                role, name
            )))
        }
    }

    /// Add a node from an async action
    pub fn add_node<F, Fut>(&mut self, name: impl Into<NodeId>, action: F) -> Result<&mut Self>
    where
        F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeOutput> + Send + 'static,
    {
        self.add(Node::new(name, action))
    }

    /// Add a fully constructed node
    pub fn add(&mut self, node: Node) -> Result<&mut Self> {
        if self.has_node(&node.name) {
            return Err(GraphError::validation(format!(
                "node '{}' is already declared",
                node.name
            )));
        }
        self.nodes.push(node);
        Ok(self)
    }

    /// Remove a node without touching edges, routers, or the entry point
    pub fn remove_node(&mut self, name: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.name == name)?;
        Some(self.nodes.remove(index))
    }

    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Result<&mut Self> {
        self.add_edge_with(Edge::new(from, to))
    }

    /// Add an edge guarded by a closure
    pub fn add_conditional_edge<F>(
        &mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        condition: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        self.add_edge_with(Edge::conditional(from, to, Predicate::new(condition)))
    }

    /// Add an edge guarded by a textual condition, compiled now
    pub fn add_expression_edge(
        &mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        condition: &str,
    ) -> Result<&mut Self> {
        let predicate = Predicate::expression(condition)?;
        self.add_edge_with(Edge::conditional(from, to, predicate))
    }

    /// Add a fully constructed edge
    pub fn add_edge_with(&mut self, edge: Edge) -> Result<&mut Self> {
        let mut violations = Vec::new();
        if !self.has_node(&edge.from) {
            violations.push(format!("edge source '{}' is not a declared node", edge.from));
        }
        if !self.has_node(&edge.to) {
            violations.push(format!("edge target '{}' is not a declared node", edge.to));
        }
        if !violations.is_empty() {
            return Err(GraphError::Validation(violations));
        }

        self.edges.push(edge);
        Ok(self)
    }

    pub fn set_entry_point(&mut self, name: impl Into<NodeId>) -> Result<&mut Self> {
        let name = name.into();
        self.require_node(&name, "entry point")?;
        self.entry_point = Some(name);
        Ok(self)
    }

    /// Route out of `node` with `router` instead of its static edges
    pub fn add_router(&mut self, node: impl Into<NodeId>, router: DynamicRouter) -> Result<&mut Self> {
        let node = node.into();
        self.require_node(&node, "router node")?;
        for target in router.targets() {
            self.require_node(target, "router target")?;
        }
        self.routers.insert(node, router);
        Ok(self)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Every structural violation, empty when the graph can be built
    pub fn validate(&self) -> Vec<String> {
        structural_violations(
            |name| self.has_node(name),
            self.entry_point.as_deref(),
            &self.edges,
            self.routers.iter(),
        )
    }

    /// Freeze into an immutable graph
    pub fn build(&self) -> Result<CompiledGraph> {
        let violations = self.validate();
        if !violations.is_empty() {
            tracing::warn!(violations = violations.len(), "Graph validation failed");
            return Err(GraphError::Validation(violations));
        }

        let entry_point = self
            .entry_point
            .clone()
            .ok_or_else(|| GraphError::validation("entry point is not set"))?;

        tracing::debug!(nodes = self.nodes.len(), edges = self.edges.len(), entry = %entry_point, "Graph built");
        Ok(CompiledGraph::new(
            self.nodes.clone(),
            self.edges.clone(),
            entry_point,
            self.routers.clone(),
            self.metadata.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{RouteCondition, RoutingStrategy};

    fn builder_with(names: &[&str]) -> GraphBuilder {
        let mut builder = GraphBuilder::new();
        for name in names {
            builder.add(Node::passthrough(*name)).unwrap();
        }
        builder
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut builder = builder_with(&["a"]);
        let err = builder.add(Node::passthrough("a")).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_edge_to_undeclared_node_rejected() {
        let mut builder = builder_with(&["a"]);
        let err = builder.add_edge("a", "ghost").unwrap_err();
        assert_eq!(err.violations(), ["edge target 'ghost' is not a declared node"]);
        assert!(builder.add_edge("x", "y").unwrap_err().violations().len() == 2);
    }

    #[test]
    fn test_entry_point_must_be_declared() {
        let mut builder = builder_with(&["a"]);
        assert!(builder.set_entry_point("ghost").is_err());
        assert!(builder.set_entry_point("a").is_ok());
    }

    #[test]
    fn test_invalid_expression_fails_at_build_time() {
        let mut builder = builder_with(&["a", "b"]);
        let err = builder.add_expression_edge("a", "b", "state.x ==").unwrap_err();
        assert!(matches!(err, GraphError::Expression(_)));
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let mut builder = builder_with(&["a", "b", "c"]);
        builder.add_edge("a", "b").unwrap();
        builder.add_edge("b", "c").unwrap();
        builder.set_entry_point("a").unwrap();
        builder.remove_node("b");
        builder.remove_node("a");

        let violations = builder.validate();
        assert_eq!(
            violations,
            vec![
                "entry point 'a' is not a declared node".to_string(),
                "edge 'a' -> 'b': source 'a' is not a declared node".to_string(),
                "edge 'a' -> 'b': target 'b' is not a declared node".to_string(),
                "edge 'b' -> 'c': source 'b' is not a declared node".to_string(),
            ]
        );

        let err = builder.build().unwrap_err();
        assert_eq!(err.violations().len(), 4);
    }

    #[test]
    fn test_missing_entry_point() {
        let builder = builder_with(&["a"]);
        assert_eq!(builder.validate(), vec!["entry point is not set"]);
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_router_targets_checked() {
        let mut builder = builder_with(&["a", "b"]);
        let router = DynamicRouter::new("r", RoutingStrategy::FirstMatch)
            .with_rule(RouteCondition::new("x", Predicate::new(|_| true), "ghost"));
        assert!(builder.add_router("a", router).is_err());

        let router = DynamicRouter::new("r", RoutingStrategy::FirstMatch).with_default("b");
        builder.add_router("a", router).unwrap();
        builder.set_entry_point("a").unwrap();
        builder.remove_node("b");
        assert_eq!(
            builder.validate(),
            vec!["router 'r' on 'a': target 'b' is not a declared node"]
        );
    }

    #[test]
    fn test_build_succeeds_for_valid_graph() {
        let mut builder = builder_with(&["a", "b"]);
        builder.add_edge("a", "b").unwrap().set_entry_point("a").unwrap();
        let graph = builder.build().unwrap();
        assert_eq!(graph.entry_point(), "a");
        assert!(graph.validate().is_empty());
    }
}
