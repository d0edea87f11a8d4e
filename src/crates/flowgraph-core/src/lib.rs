//! # flowgraph-core
//!
//! Graph construction, dynamic routing, and human approval gating for
//! stateful workflows.
//!
//! ## Overview
//!
//! A workflow is a directed graph of named async [`Node`]s connected by
//! [`Edge`]s. Edges may carry a condition, written either as a Rust closure or
//! as a small expression string (`state.priority == "high" and
//! len(state.items) > 2`). A node may additionally own a [`DynamicRouter`] that
//! picks its successors from ordered or prioritized rules.
//!
//! Before a node runs, an [`InterruptPolicy`] can stop execution and open an
//! [`ApprovalRequest`]. A human approves or rejects it, or it times out, and
//! the [`GraphExecutor`] either continues or ends the run. Thread state lives in
//! `flowgraph-state` and every mutation made during a run goes through its
//! audited `StateModifier`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      GraphExecutor                        │
//! │   frontier loop · max_steps · pause / wait for approval   │
//! └──────┬──────────────────┬───────────────────┬─────────────┘
//!        │                  │                   │
//!        ▼                  ▼                   ▼
//! ┌──────────────┐  ┌────────────────┐  ┌────────────────────┐
//! │CompiledGraph │  │InterruptPolicy │  │ StateModifier      │
//! │ nodes, edges │  │ conditions     │  │ (flowgraph-state)  │
//! │ routers      │  │ ApprovalRequest│  │ history, checkpoint│
//! └──────┬───────┘  └────────────────┘  └────────────────────┘
//!        │
//!        ▼
//! ┌──────────────┐   ┌──────────────┐
//! │ Predicate    │──►│ Expression   │
//! └──────────────┘   └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flowgraph_core::{GraphBuilder, GraphExecutor, InterruptCondition, InterruptPolicy};
//! use flowgraph_state::{InMemoryStateStore, StateModifier, WorkflowState};
//!
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_node("review", review)?
//!     .add_node("publish", publish)?
//!     .add_expression_edge("review", "publish", "state.score >= 0.8")?
//!     .set_entry_point("review")?;
//! let graph = Arc::new(builder.build()?);
//!
//! let policy = Arc::new(InterruptPolicy::new());
//! policy.add_always_interrupt("publish");
//!
//! let modifier = StateModifier::new(Arc::new(InMemoryStateStore::new()));
//! let executor = GraphExecutor::new(graph, modifier).with_policy(policy);
//! let outcome = executor.invoke("doc-7", WorkflowState::new()).await?;
//! ```
//!
//! ## Failure handling
//!
//! Structural problems are collected and reported together by
//! [`GraphBuilder::build`]. Condition failures never abort a run: the edge,
//! rule, or interrupt condition counts as false, a `warn` event is logged and
//! [`ExecutionObserver::on_predicate_error`] fires. Node action errors
//! propagate as [`GraphError::NodeExecution`].

pub mod approval;
pub mod builder;
pub mod compiled;
pub mod config;
pub mod error;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod hooks;
pub mod interrupt;
pub mod predicate;
pub mod router;
pub mod telemetry;

pub use approval::{ApprovalError, ApprovalRecord, ApprovalRequest, ApprovalStatus};
pub use builder::GraphBuilder;
pub use compiled::{CompiledGraph, EdgeDescription, GraphDescription, NodeDescription};
pub use config::{ApprovalMode, EngineConfig};
pub use error::{GraphError, Result};
pub use executor::{ExecutionOutcome, GraphExecutor, PENDING_NODES_FIELD};
pub use expression::{Expression, ExpressionError};
pub use graph::{BoxError, Edge, Node, NodeAction, NodeId, NodeOutput};
pub use hooks::{ExecutionObserver, ObserverRegistry, PredicateSite, TracingObserver};
pub use interrupt::{InterruptCondition, InterruptPolicy};
pub use predicate::{Predicate, PredicateError, PredicateFn};
pub use router::{DynamicRouter, RouteCondition, RouteDescription, RouterDescription, RoutingStrategy};

pub use flowgraph_state::WorkflowState;
