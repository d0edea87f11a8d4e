//! Compiled graph - immutable, validated workflow structure
//!
//! A [`CompiledGraph`] is produced by [`GraphBuilder::build`](crate::GraphBuilder::build)
//! and never changes afterwards. It is `Send + Sync` and meant to be shared
//! behind an `Arc` by every execution that uses it.
//!
//! Two adjacency views are offered:
//!
//! - [`CompiledGraph::get_next_nodes`] - the full structural list of edge
//!   targets in declaration order, conditions not evaluated
//! - [`CompiledGraph::traversable_nodes`] / [`CompiledGraph::next_nodes`] - the
//!   targets actually reachable for a given state, via the node's router if it
//!   has one and via edge conditions otherwise
//!
//! [`CompiledGraph::to_dict`] gives a stable, serializable description of the
//! structure for export and visualization tools.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use flowgraph_state::WorkflowState;

use crate::builder::structural_violations;
use crate::error::{GraphError, Result};
use crate::graph::{Edge, Node, NodeId};
use crate::hooks::{ObserverRegistry, PredicateSite};
use crate::router::{DynamicRouter, RouterDescription};

/// Serializable view of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: NodeId,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Serializable view of an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub from: NodeId,
    pub to: NodeId,
    pub conditional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Serializable structural view of a whole graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub entry_point: NodeId,
    pub nodes: Vec<NodeDescription>,
    pub edges: Vec<EdgeDescription>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routers: BTreeMap<NodeId, RouterDescription>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Immutable, validated graph
#[derive(Debug)]
pub struct CompiledGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    adjacency: HashMap<NodeId, Vec<usize>>,
    entry_point: NodeId,
    routers: BTreeMap<NodeId, DynamicRouter>,
    metadata: Map<String, Value>,
    observers: ObserverRegistry,
}

impl CompiledGraph {
    pub(crate) fn new(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        entry_point: NodeId,
        routers: BTreeMap<NodeId, DynamicRouter>,
        metadata: Map<String, Value>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), i))
            .collect();

        let mut adjacency: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            adjacency.entry(edge.from.clone()).or_default().push(i);
        }

        Self {
            nodes,
            index,
            edges,
            adjacency,
            entry_point,
            routers,
            metadata,
            observers: ObserverRegistry::new(),
        }
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Node names in declaration order
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn router(&self, node: &str) -> Option<&DynamicRouter> {
        self.routers.get(node)
    }

    /// Observers notified about edge and route evaluation
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.has_node(name) {
            Ok(())
        } else {
            Err(GraphError::node_not_found(name))
        }
    }

    /// Outgoing edges of `name` in declaration order
    pub fn outgoing_edges(&self, name: &str) -> Result<Vec<&Edge>> {
        self.require(name)?;
        Ok(self
            .adjacency
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default())
    }

    /// Structural successors of `name`; conditions are not evaluated
    pub fn get_next_nodes(&self, name: &str) -> Result<Vec<NodeId>> {
        Ok(self
            .outgoing_edges(name)?
            .into_iter()
            .map(|edge| edge.to.clone())
            .collect())
    }

    /// Successors of `name` whose edge condition holds for `state`
    pub fn traversable_nodes(&self, name: &str, state: &WorkflowState) -> Result<Vec<NodeId>> {
        let mut targets = Vec::new();
        for edge in self.outgoing_edges(name)? {
            match edge.try_traverse(state) {
                Ok(true) => targets.push(edge.to.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(from = %edge.from, to = %edge.to, error = %e, "Edge condition failed, edge not traversable");
                    let label = format!("{} -> {}", edge.from, edge.to);
                    self.observers.predicate_error(PredicateSite::Edge, &label, &e);
                }
            }
        }
        Ok(targets)
    }

    /// Where execution goes after `name`: the router's decision if the node has
    /// one, otherwise every traversable edge target
    pub fn next_nodes(&self, name: &str, state: &WorkflowState) -> Result<Vec<NodeId>> {
        self.require(name)?;
        match self.routers.get(name) {
            Some(router) => Ok(router.route_observed(state, Some(&self.observers))),
            None => self.traversable_nodes(name, state),
        }
    }

    /// Run the action of `name` on a copy of `state` and return its partial update
    pub async fn execute_node(&self, name: &str, state: &WorkflowState) -> Result<Map<String, Value>> {
        let node = self.node(name).ok_or_else(|| GraphError::node_not_found(name))?;
        node.run(state.clone())
            .await
            .map_err(|e| GraphError::node_execution(name, e))
    }

    /// Re-run structural validation; empty for any graph produced by the builder
    pub fn validate(&self) -> Vec<String> {
        structural_violations(
            |name| self.has_node(name),
            Some(self.entry_point.as_str()),
            &self.edges,
            self.routers.iter(),
        )
    }

    /// Stable structural description
    pub fn to_dict(&self) -> GraphDescription {
        GraphDescription {
            entry_point: self.entry_point.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeDescription {
                    name: n.name.clone(),
                    metadata: n.metadata.clone(),
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|e| EdgeDescription {
                    from: e.from.clone(),
                    to: e.to.clone(),
                    conditional: e.is_conditional(),
                    expression: e.condition.as_ref().and_then(|c| c.source()).map(str::to_string),
                    metadata: e.metadata.clone(),
                })
                .collect(),
            routers: self
                .routers
                .iter()
                .map(|(node, router)| (node.clone(), router.describe()))
                .collect(),
            metadata: self.metadata.clone(),
        }
    }

    /// [`to_dict`](Self::to_dict) as JSON
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.to_dict())?)
    }
}
