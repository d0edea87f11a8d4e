//! Execution observers
//!
//! Observers are told about node entry, edge traversal, interrupts, approval
//! decisions, and predicate failures. Callbacks are synchronous and
//! fire-and-forget: they cannot influence execution, and a panicking observer is
//! caught and logged so it never takes the engine down with it.
//!
//! A [`GraphExecutor`](crate::executor::GraphExecutor) points its interrupt
//! policy at the graph's registry, so observers registered through
//! [`CompiledGraph::observers`](crate::compiled::CompiledGraph::observers) see
//! interrupts and approval decisions too.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::approval::ApprovalStatus;
use crate::predicate::PredicateError;

/// Where a predicate failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateSite {
    Edge,
    Route,
    Interrupt,
}

/// Receives execution events; every method defaults to a no-op
pub trait ExecutionObserver: Send + Sync {
    fn on_node_entered(&self, _thread_id: &str, _node: &str) {}

    fn on_edge_traversed(&self, _thread_id: &str, _from: &str, _to: &str) {}

    fn on_interrupt_raised(&self, _state_id: &str, _node: &str, _reason: &str) {}

    fn on_approval_resolved(&self, _state_id: &str, _node: &str, _status: ApprovalStatus) {}

    fn on_predicate_error(&self, _site: PredicateSite, _name: &str, _error: &PredicateError) {}
}

/// Fan-out to a set of observers
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Arc<RwLock<Vec<Arc<dyn ExecutionObserver>>>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Whether both handles point at the same observer list
    pub fn same_as(&self, other: &ObserverRegistry) -> bool {
        Arc::ptr_eq(&self.observers, &other.observers)
    }

    /// Register every observer of `other` that is not registered here yet
    pub fn absorb(&self, other: &ObserverRegistry) {
        if self.same_as(other) {
            return;
        }
        let incoming = other.observers.read().clone();
        let mut observers = self.observers.write();
        for observer in incoming {
            let known = observers
                .iter()
                .any(|o| Arc::as_ptr(o) as *const () == Arc::as_ptr(&observer) as *const ());
            if !known {
                observers.push(observer);
            }
        }
    }

    fn each(&self, event: &'static str, f: impl Fn(&dyn ExecutionObserver)) {
        let observers = self.observers.read().clone();
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
                tracing::warn!(event, "Execution observer panicked");
            }
        }
    }

    pub fn node_entered(&self, thread_id: &str, node: &str) {
        self.each("node_entered", |o| o.on_node_entered(thread_id, node));
    }

    pub fn edge_traversed(&self, thread_id: &str, from: &str, to: &str) {
        self.each("edge_traversed", |o| o.on_edge_traversed(thread_id, from, to));
    }

    pub fn interrupt_raised(&self, state_id: &str, node: &str, reason: &str) {
        self.each("interrupt_raised", |o| o.on_interrupt_raised(state_id, node, reason));
    }

    pub fn approval_resolved(&self, state_id: &str, node: &str, status: ApprovalStatus) {
        self.each("approval_resolved", |o| o.on_approval_resolved(state_id, node, status));
    }

    pub fn predicate_error(&self, site: PredicateSite, name: &str, error: &PredicateError) {
        self.each("predicate_error", |o| o.on_predicate_error(site, name, error));
    }
}

/// Observer that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn on_node_entered(&self, thread_id: &str, node: &str) {
        tracing::info!(thread_id, node, "Node entered");
    }

    fn on_edge_traversed(&self, thread_id: &str, from: &str, to: &str) {
        tracing::debug!(thread_id, from, to, "Edge traversed");
    }

    fn on_interrupt_raised(&self, state_id: &str, node: &str, reason: &str) {
        tracing::info!(state_id, node, reason, "Interrupt raised, awaiting approval");
    }

    fn on_approval_resolved(&self, state_id: &str, node: &str, status: ApprovalStatus) {
        tracing::info!(state_id, node, status = ?status, "Approval resolved");
    }

    fn on_predicate_error(&self, site: PredicateSite, name: &str, error: &PredicateError) {
        tracing::warn!(site = ?site, name, error = %error, "Predicate evaluation failed");
    }
}
