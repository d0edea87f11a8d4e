//! Dynamic Router - rule-based selection of the next node from runtime state
//!
//! A [`DynamicRouter`] attached to a node replaces that node's static edges
//! when the executor decides where to go next. Each [`RouteCondition`] pairs a
//! predicate with a target node; the [`RoutingStrategy`] decides how matching
//! rules turn into a decision.
//!
//! # Strategies
//!
//! | Strategy     | Decision                                                    |
//! |--------------|-------------------------------------------------------------|
//! | `FirstMatch` | target of the first matching rule in insertion order         |
//! | `AllMatch`   | targets of every matching rule, in order, without duplicates |
//! | `Priority`   | target of the highest-priority match, ties by insertion order |
//!
//! When nothing matches, every strategy falls back to the default target (or
//! an empty decision when there is none). Rules are kept in an explicit list,
//! so evaluation order is always the order they were added in.
//!
//! A rule whose predicate fails counts as not matching and is logged.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_core::{DynamicRouter, Predicate, RouteCondition, RoutingStrategy};
//!
//! let router = DynamicRouter::new("triage", RoutingStrategy::Priority)
//!     .with_rule(RouteCondition::new("vip", Predicate::expression("state.tier == 'gold'")?, "concierge").with_priority(10))
//!     .with_rule(RouteCondition::new("large", Predicate::expression("state.amount > 1000")?, "review").with_priority(5))
//!     .with_default("standard");
//!
//! let next = router.route(&state);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use flowgraph_state::WorkflowState;

use crate::graph::NodeId;
use crate::hooks::{ObserverRegistry, PredicateSite};
use crate::predicate::Predicate;

/// How matching rules become a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    #[default]
    FirstMatch,
    AllMatch,
    Priority,
}

/// Named routing rule
#[derive(Debug, Clone)]
pub struct RouteCondition {
    pub name: String,
    pub predicate: Predicate,
    pub target: NodeId,
    pub priority: i32,
    pub metadata: Map<String, Value>,
}

impl RouteCondition {
    pub fn new(name: impl Into<String>, predicate: Predicate, target: impl Into<NodeId>) -> Self {
        Self {
            name: name.into(),
            predicate,
            target: target.into(),
            priority: 0,
            metadata: Map::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Serializable view of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescription {
    pub name: String,
    pub target: NodeId,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub metadata: Map<String, Value>,
}

/// Serializable view of a router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDescription {
    pub name: String,
    pub strategy: RoutingStrategy,
    pub rules: Vec<RouteDescription>,
    pub default: Option<NodeId>,
}

/// Rule-based router over workflow state
#[derive(Debug, Clone)]
pub struct DynamicRouter {
    name: String,
    strategy: RoutingStrategy,
    rules: Vec<RouteCondition>,
    default: Option<NodeId>,
}

impl DynamicRouter {
    pub fn new(name: impl Into<String>, strategy: RoutingStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            rules: Vec::new(),
            default: None,
        }
    }

    pub fn with_default(mut self, target: impl Into<NodeId>) -> Self {
        self.default = Some(target.into());
        self
    }

    pub fn with_rule(mut self, rule: RouteCondition) -> Self {
        self.add_rule(rule);
        self
    }

    /// Append a rule, or replace a same-named rule in place
    pub fn add_rule(&mut self, rule: RouteCondition) {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn remove_rule(&mut self, name: &str) -> Option<RouteCondition> {
        let index = self.rules.iter().position(|r| r.name == name)?;
        Some(self.rules.remove(index))
    }

    pub fn set_default(&mut self, target: Option<NodeId>) {
        self.default = target;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    pub fn rules(&self) -> &[RouteCondition] {
        &self.rules
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Every node this router can send execution to
    pub fn targets(&self) -> Vec<&str> {
        self.rules
            .iter()
            .map(|r| r.target.as_str())
            .chain(self.default.as_deref())
            .collect()
    }

    fn matches(&self, rule: &RouteCondition, state: &WorkflowState, observers: Option<&ObserverRegistry>) -> bool {
        match rule.predicate.evaluate(state) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(router = %self.name, rule = %rule.name, error = %e, "Route predicate failed, treating as no match");
                if let Some(observers) = observers {
                    observers.predicate_error(PredicateSite::Route, &rule.name, &e);
                }
                false
            }
        }
    }

    fn fallback(&self) -> Vec<NodeId> {
        self.default.iter().cloned().collect()
    }

    /// Resolve the routing decision for `state`
    pub fn route(&self, state: &WorkflowState) -> Vec<NodeId> {
        self.route_observed(state, None)
    }

    /// First target of the decision, if any
    pub fn route_one(&self, state: &WorkflowState) -> Option<NodeId> {
        self.route(state).into_iter().next()
    }

    /// Resolve the decision, reporting predicate failures to `observers`
    pub fn route_observed(&self, state: &WorkflowState, observers: Option<&ObserverRegistry>) -> Vec<NodeId> {
        let decision = match self.strategy {
            RoutingStrategy::FirstMatch => self
                .rules
                .iter()
                .find(|rule| self.matches(rule, state, observers))
                .map(|rule| vec![rule.target.clone()]),
            RoutingStrategy::AllMatch => {
                let mut seen = HashSet::new();
                let targets: Vec<NodeId> = self
                    .rules
                    .iter()
                    .filter(|rule| self.matches(rule, state, observers))
                    .filter(|rule| seen.insert(rule.target.clone()))
                    .map(|rule| rule.target.clone())
                    .collect();
                (!targets.is_empty()).then_some(targets)
            }
            RoutingStrategy::Priority => {
                let mut best: Option<&RouteCondition> = None;
                for rule in &self.rules {
                    if self.matches(rule, state, observers)
                        && best.map_or(true, |b| rule.priority > b.priority)
                    {
                        best = Some(rule);
                    }
                }
                best.map(|rule| vec![rule.target.clone()])
            }
        };

        let decision = decision.unwrap_or_else(|| self.fallback());
        tracing::debug!(router = %self.name, strategy = ?self.strategy, decision = ?decision, "Route resolved");
        decision
    }

    pub fn describe(&self) -> RouterDescription {
        RouterDescription {
            name: self.name.clone(),
            strategy: self.strategy,
            rules: self
                .rules
                .iter()
                .map(|r| RouteDescription {
                    name: r.name.clone(),
                    target: r.target.clone(),
                    priority: r.priority,
                    expression: r.predicate.source().map(str::to_string),
                    metadata: r.metadata.clone(),
                })
                .collect(),
            default: self.default.clone(),
        }
    }
}
