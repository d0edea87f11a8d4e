//! Sequential graph executor with approval gating
//!
//! [`GraphExecutor`] ties the pieces together for one thread at a time:
//!
//! ```text
//!   frontier (FIFO, starts at entry point)
//!        │
//!        ▼
//!   ┌──────────────┐  interrupt?   ┌─────────────────────────────┐
//!   │ load state   │──────────────►│ Pause: persist frontier,    │
//!   └──────┬───────┘               │        return Interrupted   │
//!          │ no                    │ Wait:  block on decision    │
//!          ▼                       └─────────────────────────────┘
//!   ┌──────────────┐
//!   │ execute node │  partial update ──► StateModifier::modify_state
//!   └──────┬───────┘
//!          ▼
//!   router decision, or every traversable edge ──► push to frontier
//! ```
//!
//! While paused the remaining frontier lives in the reserved
//! [`PENDING_NODES_FIELD`] of the persisted state, so a resume can happen from
//! another process that shares the store and the interrupt policy.
//!
//! ```rust,ignore
//! let executor = GraphExecutor::new(Arc::new(graph), modifier)
//!     .with_policy(policy.clone());
//!
//! match executor.invoke("order-42", initial).await? {
//!     ExecutionOutcome::Interrupted { node, .. } => {
//!         policy.get_request("order-42").unwrap().approve("alice", None)?;
//!         executor.resume("order-42").await?;
//!     }
//!     ExecutionOutcome::Completed { state, .. } => println!("{:?}", state),
//!     ExecutionOutcome::Rejected { .. } => {}
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{Map, Value};

use flowgraph_state::{StateModifier, WorkflowState};

use crate::approval::{ApprovalError, ApprovalRecord, ApprovalStatus};
use crate::compiled::CompiledGraph;
use crate::config::{ApprovalMode, EngineConfig};
use crate::error::{GraphError, Result};
use crate::graph::NodeId;
use crate::interrupt::InterruptPolicy;

/// Reserved state field holding the frontier of a paused run
pub const PENDING_NODES_FIELD: &str = "_pending_nodes";

/// How a run ended
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The frontier drained
    Completed {
        state: WorkflowState,
        visited: Vec<NodeId>,
    },
    /// Stopped before `node` waiting for a decision
    Interrupted {
        node: NodeId,
        request: ApprovalRecord,
    },
    /// The decision for `node` was a rejection
    Rejected {
        node: NodeId,
        request: ApprovalRecord,
    },
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ExecutionOutcome::Interrupted { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ExecutionOutcome::Rejected { .. })
    }

    /// Final state of a completed run
    pub fn state(&self) -> Option<&WorkflowState> {
        match self {
            ExecutionOutcome::Completed { state, .. } => Some(state),
            _ => None,
        }
    }
}

enum Gate {
    Proceed,
    Stop(ExecutionOutcome),
}

/// Drives a [`CompiledGraph`] over persisted thread state
#[derive(Debug, Clone)]
pub struct GraphExecutor {
    graph: Arc<CompiledGraph>,
    policy: Arc<InterruptPolicy>,
    modifier: StateModifier,
    config: EngineConfig,
}

impl GraphExecutor {
    pub fn new(graph: Arc<CompiledGraph>, modifier: StateModifier) -> Self {
        let policy = InterruptPolicy::new().with_observers(graph.observers().clone());
        Self {
            graph,
            policy: Arc::new(policy),
            modifier,
            config: EngineConfig::default(),
        }
    }

    /// Use `policy` for interrupts, reporting its events to the graph's observers
    pub fn with_policy(mut self, policy: Arc<InterruptPolicy>) -> Self {
        policy.share_observers(self.graph.observers());
        self.policy = policy;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph(&self) -> &Arc<CompiledGraph> {
        &self.graph
    }

    pub fn policy(&self) -> &Arc<InterruptPolicy> {
        &self.policy
    }

    pub fn modifier(&self) -> &StateModifier {
        &self.modifier
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Seed `thread_id` with `initial` and run from the entry point
    #[tracing::instrument(skip(self, initial))]
    pub async fn invoke(&self, thread_id: &str, initial: WorkflowState) -> Result<ExecutionOutcome> {
        self.config.validate()?;

        let mut initial = initial;
        initial.remove(PENDING_NODES_FIELD);
        self.modifier.save_state(thread_id, &initial).await?;

        tracing::info!(entry = %self.graph.entry_point(), "Starting run");
        let frontier = VecDeque::from([self.graph.entry_point().to_string()]);
        self.drive(thread_id, frontier, None).await
    }

    /// Continue a paused thread whose approval request was granted
    ///
    /// The approved node runs without a second interrupt check. A rejected
    /// request ends the run: the paused frontier is cleared, `status` becomes
    /// `"rejected"`, the request is consumed, and the call yields
    /// [`ExecutionOutcome::Rejected`]. A pending or timed-out request is an
    /// error and stays registered.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, thread_id: &str) -> Result<ExecutionOutcome> {
        self.config.validate()?;

        let request = self
            .policy
            .get_request(thread_id)
            .ok_or_else(|| GraphError::request_not_found(thread_id))?;
        let node = request.node_name();

        match request.status() {
            ApprovalStatus::Approved => {}
            ApprovalStatus::Rejected => {
                self.clear_pending(thread_id).await?;
                self.modifier.reject_workflow(thread_id).await?;
                self.policy.cancel_request(thread_id);
                tracing::info!(node = %node, "Resume after rejection, run ends");
                return Ok(ExecutionOutcome::Rejected {
                    node,
                    request: request.record(),
                });
            }
            status => {
                return Err(ApprovalError::NotApproved {
                    request_id: request.request_id(),
                    status,
                }
                .into());
            }
        }

        let state = self
            .modifier
            .load_for_resume(thread_id, &self.config.state_version)
            .await?;
        let mut frontier = pending_nodes(&state);
        if frontier.is_empty() {
            frontier.push_back(node.clone());
        }
        self.modifier.save_state(thread_id, &state).await?;
        self.clear_pending(thread_id).await?;
        self.modifier.resume_workflow(thread_id).await?;
        self.policy.cancel_request(thread_id);

        tracing::info!(node = %node, pending = frontier.len(), "Resuming run");
        self.drive(thread_id, frontier, Some(node)).await
    }

    async fn drive(
        &self,
        thread_id: &str,
        mut frontier: VecDeque<NodeId>,
        mut approved: Option<NodeId>,
    ) -> Result<ExecutionOutcome> {
        let observers = self.graph.observers();
        let mut visited = Vec::new();
        let mut steps = 0usize;

        while let Some(node) = frontier.pop_front() {
            let state = self.modifier.load_state(thread_id).await?;

            if approved.as_deref() == Some(node.as_str()) {
                approved = None;
            } else if let Gate::Stop(outcome) = self.gate(thread_id, &node, &state, &frontier).await? {
                return Ok(outcome);
            }

            steps += 1;
            if steps > self.config.max_steps {
                tracing::warn!(thread_id, limit = self.config.max_steps, "Step limit exceeded");
                return Err(GraphError::StepLimitExceeded {
                    thread_id: thread_id.to_string(),
                    limit: self.config.max_steps,
                });
            }

            observers.node_entered(thread_id, &node);
            tracing::debug!(thread_id, node = %node, step = steps, "Executing node");
            let update = self.graph.execute_node(&node, &state).await?;
            let state = if update.is_empty() {
                state
            } else {
                self.modifier.modify_state(thread_id, update).await?
            };
            visited.push(node.clone());

            for next in self.graph.next_nodes(&node, &state)? {
                observers.edge_traversed(thread_id, &node, &next);
                if !frontier.contains(&next) {
                    frontier.push_back(next);
                }
            }
        }

        let state = self.modifier.load_state(thread_id).await?;
        tracing::info!(thread_id, steps, "Run completed");
        Ok(ExecutionOutcome::Completed { state, visited })
    }

    async fn gate(
        &self,
        thread_id: &str,
        node: &str,
        state: &WorkflowState,
        rest: &VecDeque<NodeId>,
    ) -> Result<Gate> {
        let Some(reason) = self.policy.interrupt_reason(state, node) else {
            return Ok(Gate::Proceed);
        };

        let request =
            self.policy
                .create_request(thread_id, node, reason, self.config.approval_timeout());

        match self.config.approval_mode {
            ApprovalMode::Pause => {
                let mut pending: Vec<Value> = vec![Value::from(node)];
                pending.extend(rest.iter().map(|n| Value::from(n.as_str())));

                let mut update = Map::new();
                update.insert(PENDING_NODES_FIELD.to_string(), Value::Array(pending));
                self.modifier.modify_state(thread_id, update).await?;
                self.modifier.pause_workflow(thread_id).await?;

                tracing::info!(thread_id, node, "Run paused for approval");
                Ok(Gate::Stop(ExecutionOutcome::Interrupted {
                    node: node.to_string(),
                    request: request.record(),
                }))
            }
            ApprovalMode::Wait => match request.wait(None).await? {
                ApprovalStatus::Approved => {
                    self.policy.cancel_request(thread_id);
                    Ok(Gate::Proceed)
                }
                _ => {
                    tracing::info!(thread_id, node, "Approval rejected, run ends");
                    Ok(Gate::Stop(ExecutionOutcome::Rejected {
                        node: node.to_string(),
                        request: request.record(),
                    }))
                }
            },
        }
    }

    async fn clear_pending(&self, thread_id: &str) -> Result<()> {
        let state = self.modifier.load_state(thread_id).await?;
        if state.contains(PENDING_NODES_FIELD) {
            self.modifier.delete_field(thread_id, PENDING_NODES_FIELD).await?;
        }
        Ok(())
    }
}

fn pending_nodes(state: &WorkflowState) -> VecDeque<NodeId> {
    state
        .get(PENDING_NODES_FIELD)
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
