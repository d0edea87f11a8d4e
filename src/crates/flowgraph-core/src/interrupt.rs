//! Human-in-the-loop interrupts
//!
//! This module decides *when* execution must stop and wait for a human
//! decision, and keeps track of the decisions that are outstanding.
//!
//! # Overview
//!
//! - [`InterruptCondition`] - named predicate over state, composable with
//!   `&`, `|` and `!`
//! - [`InterruptPolicy`] - ordered conditions, always-interrupt nodes, and the
//!   registry of [`ApprovalRequest`]s keyed by thread id
//!
//! # Failure semantics
//!
//! A condition whose predicate fails evaluates to **false**, meaning "do not
//! interrupt". Edge conditions fail the other way (the edge is not taken), so a
//! broken interrupt condition lets execution continue while a broken edge
//! condition stops it. Both are logged and reported to observers. Composite
//! conditions propagate a failure of any operand they evaluate, so `!broken`
//! is also false.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  Executor reaches node N with state S                   │
//! └──────────────┬─────────────────────────────────────────┘
//!                │ should_interrupt(S, N)?
//!                ↓
//! ┌────────────────────────────────────────────────────────┐
//! │  InterruptPolicy                                        │
//! │  • N in always-interrupt list       → yes               │
//! │  • any condition true (in order)    → yes               │
//! │  • otherwise                        → no                │
//! └──────────────┬─────────────────────────────────────────┘
//!                │ yes
//!                ↓
//! ┌────────────────────────────────────────────────────────┐
//! │  create_request(thread, N, reason) → ApprovalRequest   │
//! │  • pause and return, or                                  │
//! │  • wait_for_approval(thread, timeout)                    │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use flowgraph_core::{InterruptCondition, InterruptPolicy};
//! use serde_json::json;
//!
//! let policy = InterruptPolicy::new();
//! policy.add_condition(
//!     "large_amount",
//!     InterruptCondition::field_greater_than("amount", 10_000.0)
//!         & !InterruptCondition::field_equals("approved_by_rule", json!(true)),
//! );
//! policy.add_always_interrupt("deploy_production");
//!
//! if policy.should_interrupt(&state, "transfer") {
//!     let request = policy.create_request("thread-1", "transfer", "amount over limit", None);
//!     // hand request.record() to an operator UI
//! }
//! ```

use std::collections::HashMap;
use std::ops::{BitAnd, BitOr, Not};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;

use flowgraph_state::WorkflowState;

use crate::approval::{ApprovalRecord, ApprovalRequest, ApprovalStatus};
use crate::error::{GraphError, Result};
use crate::expression::{json_eq, ExpressionError};
use crate::graph::NodeId;
use crate::hooks::{ObserverRegistry, PredicateSite};
use crate::predicate::{Predicate, PredicateError};

/// Named, composable interrupt predicate
///
/// A predicate that fails evaluates to `false`, meaning "do not interrupt", so
/// a broken interrupt condition fails open. Edge conditions fail closed: a
/// broken one is treated as not satisfied and its edge is not taken.
#[derive(Debug, Clone)]
pub struct InterruptCondition {
    name: String,
    predicate: Predicate,
}

impl InterruptCondition {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        Self::from_predicate(name, Predicate::new(f))
    }

    pub fn from_predicate(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    /// Condition compiled from a textual expression
    pub fn from_expression(source: &str) -> std::result::Result<Self, ExpressionError> {
        Ok(Self::from_predicate(source, Predicate::expression(source)?))
    }

    pub fn always() -> Self {
        Self::new("always", |_| true)
    }

    pub fn never() -> Self {
        Self::new("never", |_| false)
    }

    /// `field` (dotted path) equals `value`
    pub fn field_equals(field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        let name = format!("{} == {}", field, value);
        Self::new(name, move |state| {
            state.get_path(&field).map_or(false, |v| json_eq(v, &value))
        })
    }

    /// `field` is a number greater than `threshold`; false when missing or non-numeric
    pub fn field_greater_than(field: impl Into<String>, threshold: f64) -> Self {
        let field = field.into();
        let name = format!("{} > {}", field, threshold);
        Self::new(name, move |state| {
            state
                .get_path(&field)
                .and_then(Value::as_f64)
                .map_or(false, |v| v > threshold)
        })
    }

    /// `field` is a number less than `threshold`; false when missing or non-numeric
    pub fn field_less_than(field: impl Into<String>, threshold: f64) -> Self {
        let field = field.into();
        let name = format!("{} < {}", field, threshold);
        Self::new(name, move |state| {
            state
                .get_path(&field)
                .and_then(Value::as_f64)
                .map_or(false, |v| v < threshold)
        })
    }

    pub fn field_exists(field: impl Into<String>) -> Self {
        let field = field.into();
        let name = format!("exists({})", field);
        Self::new(name, move |state| state.get_path(&field).is_some())
    }

    /// Sequence field holds `value`, string field contains it, or object field has it as a key
    pub fn field_contains(field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        let name = format!("{} contains {}", field, value);
        Self::new(name, move |state| match (state.get_path(&field), &value) {
            (Some(Value::Array(items)), needle) => items.iter().any(|item| json_eq(item, needle)),
            (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
            (Some(Value::Object(map)), Value::String(key)) => map.contains_key(key),
            _ => false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Evaluate, surfacing predicate failures
    pub fn try_evaluate(&self, state: &WorkflowState) -> std::result::Result<bool, PredicateError> {
        self.predicate.evaluate(state)
    }

    /// Evaluate; a failing predicate counts as false
    pub fn evaluate(&self, state: &WorkflowState) -> bool {
        match self.try_evaluate(state) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(condition = %self.name, error = %e, "Interrupt condition failed, not interrupting");
                false
            }
        }
    }

    pub fn and(self, other: InterruptCondition) -> Self {
        let name = format!("({} & {})", self.name, other.name);
        Self::from_predicate(
            name,
            Predicate::fallible(move |state| {
                Ok(self.try_evaluate(state)? && other.try_evaluate(state)?)
            }),
        )
    }

    pub fn or(self, other: InterruptCondition) -> Self {
        let name = format!("({} | {})", self.name, other.name);
        Self::from_predicate(
            name,
            Predicate::fallible(move |state| {
                Ok(self.try_evaluate(state)? || other.try_evaluate(state)?)
            }),
        )
    }

    pub fn negate(self) -> Self {
        let name = format!("!{}", self.name);
        Self::from_predicate(
            name,
            Predicate::fallible(move |state| Ok(!self.try_evaluate(state)?)),
        )
    }
}

impl BitAnd for InterruptCondition {
    type Output = InterruptCondition;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for InterruptCondition {
    type Output = InterruptCondition;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl Not for InterruptCondition {
    type Output = InterruptCondition;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

/// Decides where execution pauses for approval and tracks the resulting requests
#[derive(Debug, Default)]
pub struct InterruptPolicy {
    conditions: RwLock<Vec<(String, InterruptCondition)>>,
    always_interrupt: RwLock<Vec<NodeId>>,
    requests: RwLock<HashMap<String, ApprovalRequest>>,
    default_timeout: Option<Duration>,
    observers: RwLock<ObserverRegistry>,
}

impl InterruptPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout applied to requests created without an explicit one
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_observers(mut self, observers: ObserverRegistry) -> Self {
        self.observers = RwLock::new(observers);
        self
    }

    pub fn observers(&self) -> ObserverRegistry {
        self.observers.read().clone()
    }

    /// Report to `registry` from now on
    ///
    /// Observers registered on the current registry are carried over, so they
    /// keep receiving events. Requests created earlier keep reporting to the
    /// registry they were created with.
    pub fn share_observers(&self, registry: &ObserverRegistry) {
        let mut current = self.observers.write();
        if current.same_as(registry) {
            return;
        }
        registry.absorb(&current);
        *current = registry.clone();
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Register a condition, replacing a same-named one in place
    pub fn add_condition(&self, name: impl Into<String>, condition: InterruptCondition) {
        let name = name.into();
        let mut conditions = self.conditions.write();
        match conditions.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = condition,
            None => conditions.push((name, condition)),
        }
    }

    pub fn remove_condition(&self, name: &str) -> bool {
        let mut conditions = self.conditions.write();
        let before = conditions.len();
        conditions.retain(|(n, _)| n != name);
        conditions.len() != before
    }

    pub fn condition_names(&self) -> Vec<String> {
        self.conditions.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Always interrupt before `node`, regardless of state
    pub fn add_always_interrupt(&self, node: impl Into<NodeId>) {
        let node = node.into();
        let mut nodes = self.always_interrupt.write();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    pub fn remove_always_interrupt(&self, node: &str) -> bool {
        let mut nodes = self.always_interrupt.write();
        let before = nodes.len();
        nodes.retain(|n| n != node);
        nodes.len() != before
    }

    /// Why execution should stop before `node_name`, if it should
    pub fn interrupt_reason(&self, state: &WorkflowState, node_name: &str) -> Option<String> {
        if self.always_interrupt.read().iter().any(|n| n == node_name) {
            return Some(format!("node '{}' always requires approval", node_name));
        }

        let conditions = self.conditions.read();
        for (name, condition) in conditions.iter() {
            match condition.try_evaluate(state) {
                Ok(true) => return Some(format!("condition '{}' matched", name)),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(condition = %name, node = node_name, error = %e, "Interrupt condition failed, not interrupting");
                    self.observers().predicate_error(PredicateSite::Interrupt, name, &e);
                }
            }
        }
        None
    }

    pub fn should_interrupt(&self, state: &WorkflowState, node_name: &str) -> bool {
        self.interrupt_reason(state, node_name).is_some()
    }

    /// Register a new pending request for `state_id`, replacing any previous one
    pub fn create_request(
        &self,
        state_id: impl Into<String>,
        node_name: impl Into<String>,
        reason: impl Into<String>,
        timeout: Option<Duration>,
    ) -> ApprovalRequest {
        let state_id = state_id.into();
        let node_name = node_name.into();
        let reason = reason.into();
        let observers = self.observers();
        let request = ApprovalRequest::with_observers(
            state_id.clone(),
            node_name.clone(),
            reason.clone(),
            timeout.or(self.default_timeout),
            Some(observers.clone()),
        );

        if let Some(previous) = self.requests.write().insert(state_id.clone(), request.clone()) {
            if previous.is_pending() {
                tracing::warn!(state_id = %state_id, previous_node = %previous.node_name(), "Replacing pending approval request");
            }
        }

        tracing::info!(state_id = %state_id, node = %node_name, reason = %reason, "Approval requested");
        observers.interrupt_raised(&state_id, &node_name, &reason);
        request
    }

    pub fn get_request(&self, state_id: &str) -> Option<ApprovalRequest> {
        self.requests.read().get(state_id).cloned()
    }

    /// Remove the request for `state_id`; a pending one is rejected by `system`
    pub fn cancel_request(&self, state_id: &str) -> Option<ApprovalRequest> {
        let request = self.requests.write().remove(state_id)?;
        if request.is_pending() {
            let _ = request.reject("system", Some("cancelled".to_string()));
        }
        Some(request)
    }

    /// Records of every unresolved request, oldest first
    pub fn pending_requests(&self) -> Vec<ApprovalRecord> {
        let mut pending: Vec<ApprovalRecord> = self
            .requests
            .read()
            .values()
            .filter(|r| r.is_pending())
            .map(ApprovalRequest::record)
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// Time out every pending request whose own timeout has elapsed
    pub fn expire_requests(&self) -> usize {
        self.requests
            .read()
            .values()
            .filter(|r| r.is_pending() && r.check_expired())
            .count()
    }

    /// Wait for the decision on the request registered for `state_id`
    pub async fn wait_for_approval(
        &self,
        state_id: &str,
        timeout: Option<Duration>,
    ) -> Result<ApprovalStatus> {
        let request = self
            .get_request(state_id)
            .ok_or_else(|| GraphError::request_not_found(state_id))?;
        request.wait(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> WorkflowState {
        WorkflowState::from_value(value).unwrap()
    }

    #[test]
    fn test_field_greater_than() {
        let cond = InterruptCondition::field_greater_than("value", 100.0);
        assert!(cond.evaluate(&state(json!({"value": 150}))));
        assert!(!cond.evaluate(&state(json!({"value": 50}))));
        assert!(!cond.evaluate(&state(json!({}))));
        assert!(!cond.evaluate(&state(json!({"value": "lots"}))));
    }

    #[test]
    fn test_policy_interrupts_above_threshold() {
        let policy = InterruptPolicy::new();
        policy.add_condition("big", InterruptCondition::field_greater_than("value", 100.0));

        assert!(policy.should_interrupt(&state(json!({"value": 150})), "n"));
        assert!(!policy.should_interrupt(&state(json!({"value": 50})), "n"));
        assert_eq!(
            policy.interrupt_reason(&state(json!({"value": 150})), "n").as_deref(),
            Some("condition 'big' matched")
        );
    }

    #[test]
    fn test_field_factories() {
        let s = state(json!({"tier": "gold", "tags": ["urgent"], "meta": {"k": 1}, "n": 3}));
        assert!(InterruptCondition::field_equals("tier", json!("gold")).evaluate(&s));
        assert!(InterruptCondition::field_exists("meta.k").evaluate(&s));
        assert!(!InterruptCondition::field_exists("meta.z").evaluate(&s));
        assert!(InterruptCondition::field_contains("tags", json!("urgent")).evaluate(&s));
        assert!(InterruptCondition::field_contains("tier", json!("ol")).evaluate(&s));
        assert!(InterruptCondition::field_contains("meta", json!("k")).evaluate(&s));
        assert!(InterruptCondition::field_less_than("n", 4.0).evaluate(&s));
    }

    #[test]
    fn test_operators_build_new_conditions() {
        let big = InterruptCondition::field_greater_than("v", 10.0);
        let flagged = InterruptCondition::field_equals("flag", json!(true));
        let both = big.clone() & flagged.clone();
        let either = big.clone() | flagged;
        let not_big = !big.clone();

        let s = state(json!({"v": 20, "flag": false}));
        assert!(!both.evaluate(&s));
        assert!(either.evaluate(&s));
        assert!(!not_big.evaluate(&s));
        assert!(big.evaluate(&s));
        assert_eq!(both.name(), "(v > 10 & flag == true)");
    }

    #[test]
    fn test_failing_condition_does_not_interrupt() {
        let broken = InterruptCondition::from_expression("state.s > 1").unwrap();
        let s = state(json!({"s": "text"}));
        assert!(!broken.evaluate(&s));
        assert!(!(!broken.clone()).evaluate(&s));

        let policy = InterruptPolicy::new();
        policy.add_condition("broken", broken);
        assert!(!policy.should_interrupt(&s, "node"));
    }

    #[test]
    fn test_policy_always_interrupt_nodes() {
        let policy = InterruptPolicy::new();
        policy.add_always_interrupt("deploy");
        assert!(policy.should_interrupt(&WorkflowState::new(), "deploy"));
        assert!(!policy.should_interrupt(&WorkflowState::new(), "build"));

        assert!(policy.remove_always_interrupt("deploy"));
        assert!(!policy.should_interrupt(&WorkflowState::new(), "deploy"));
    }

    #[test]
    fn test_policy_reports_first_matching_condition() {
        let policy = InterruptPolicy::new();
        policy.add_condition("first", InterruptCondition::field_exists("a"));
        policy.add_condition("second", InterruptCondition::always());

        let reason = policy.interrupt_reason(&state(json!({"a": 1})), "n").unwrap();
        assert!(reason.contains("first"));
        assert_eq!(policy.condition_names(), vec!["first", "second"]);

        assert!(policy.remove_condition("second"));
        assert!(!policy.should_interrupt(&WorkflowState::new(), "n"));
    }

    #[test]
    fn test_request_registry() {
        let policy = InterruptPolicy::new().with_default_timeout(Duration::from_secs(30));
        let request = policy.create_request("t1", "deploy", "prod", None);

        assert_eq!(request.timeout(), Some(Duration::from_secs(30)));
        assert!(policy.get_request("t1").unwrap().same_request(&request));
        assert_eq!(policy.pending_requests().len(), 1);

        let replacement = policy.create_request("t1", "deploy", "again", Some(Duration::from_secs(5)));
        assert!(!policy.get_request("t1").unwrap().same_request(&request));
        assert_eq!(replacement.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel_rejects_pending_request() {
        let policy = InterruptPolicy::new();
        let request = policy.create_request("t1", "deploy", "prod", None);

        let cancelled = policy.cancel_request("t1").unwrap();
        assert!(cancelled.is_rejected());
        assert_eq!(request.record().rejecter.as_deref(), Some("system"));
        assert!(policy.get_request("t1").is_none());
        assert!(policy.cancel_request("t1").is_none());
    }

    #[tokio::test]
    async fn test_wait_for_unknown_request() {
        let policy = InterruptPolicy::new();
        let err = policy.wait_for_approval("ghost", None).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
