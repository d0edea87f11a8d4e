//! Approval requests - the human decision behind an interrupt
//!
//! An [`ApprovalRequest`] starts `Pending` and moves exactly once to
//! `Approved`, `Rejected`, or `Timeout`. Any later transition attempt fails with
//! [`ApprovalError::AlreadyResolved`] and leaves the recorded decision intact.
//!
//! ```text
//!              approve()
//!           ┌────────────► Approved
//!           │  reject()
//! Pending ──┼────────────► Rejected
//!           │  timeout_request() / wait timer / check_expired()
//!           └────────────► Timeout
//! ```
//!
//! The request is a cheap, cloneable handle. Waiters are woken through a
//! `tokio::sync::watch` channel the moment a decision is recorded, and a
//! decision that races the wait timer wins if it lands first.
//!
//! ```rust,ignore
//! let request = policy.create_request("thread-1", "deploy", "production change", None);
//!
//! // Elsewhere, an operator decides
//! request.approve("alice", Some("looks good".into()))?;
//!
//! // The executor side
//! let status = policy.wait_for_approval("thread-1", Some(Duration::from_secs(300))).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::hooks::ObserverRegistry;

/// Decision state of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Timeout,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// Invalid approval transition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApprovalError {
    #[error("Approval request {request_id} is already {status:?}")]
    AlreadyResolved {
        request_id: Uuid,
        status: ApprovalStatus,
    },

    #[error("Approval request {request_id} is {status:?}, not approved")]
    NotApproved {
        request_id: Uuid,
        status: ApprovalStatus,
    },
}

/// Serializable snapshot of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub request_id: Uuid,
    pub state_id: String,
    pub node_name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejecter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

struct Inner {
    record: Mutex<ApprovalRecord>,
    timeout: Option<Duration>,
    created: Instant,
    status_tx: watch::Sender<ApprovalStatus>,
    observers: Option<ObserverRegistry>,
}

/// Shared handle to one approval decision
#[derive(Clone)]
pub struct ApprovalRequest {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApprovalRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApprovalRequest").field(&*self.inner.record.lock()).finish()
    }
}

enum Decision {
    Approve(String),
    Reject(String),
    Timeout,
}

impl ApprovalRequest {
    pub fn new(
        state_id: impl Into<String>,
        node_name: impl Into<String>,
        reason: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self::with_observers(state_id, node_name, reason, timeout, None)
    }

    pub(crate) fn with_observers(
        state_id: impl Into<String>,
        node_name: impl Into<String>,
        reason: impl Into<String>,
        timeout: Option<Duration>,
        observers: Option<ObserverRegistry>,
    ) -> Self {
        let record = ApprovalRecord {
            request_id: Uuid::new_v4(),
            state_id: state_id.into(),
            node_name: node_name.into(),
            reason: reason.into(),
            timeout_ms: timeout.map(|t| t.as_millis() as u64),
            status: ApprovalStatus::Pending,
            approver: None,
            rejecter: None,
            comment: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        let (status_tx, _) = watch::channel(ApprovalStatus::Pending);

        Self {
            inner: Arc::new(Inner {
                record: Mutex::new(record),
                timeout,
                created: Instant::now(),
                status_tx,
                observers,
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.record.lock().request_id
    }

    pub fn state_id(&self) -> String {
        self.inner.record.lock().state_id.clone()
    }

    pub fn node_name(&self) -> String {
        self.inner.record.lock().node_name.clone()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn status(&self) -> ApprovalStatus {
        self.inner.record.lock().status
    }

    /// Copy of the full request record
    pub fn record(&self) -> ApprovalRecord {
        self.inner.record.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == ApprovalStatus::Pending
    }

    pub fn is_approved(&self) -> bool {
        self.status() == ApprovalStatus::Approved
    }

    pub fn is_rejected(&self) -> bool {
        self.status() == ApprovalStatus::Rejected
    }

    pub fn is_timed_out(&self) -> bool {
        self.status() == ApprovalStatus::Timeout
    }

    /// Whether two handles refer to the same request
    pub fn same_request(&self, other: &ApprovalRequest) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn resolve(&self, decision: Decision, comment: Option<String>) -> std::result::Result<(), ApprovalError> {
        let (status, state_id, node) = {
            let mut record = self.inner.record.lock();
            if record.status.is_terminal() {
                return Err(ApprovalError::AlreadyResolved {
                    request_id: record.request_id,
                    status: record.status,
                });
            }

            let status = match decision {
                Decision::Approve(approver) => {
                    record.approver = Some(approver);
                    ApprovalStatus::Approved
                }
                Decision::Reject(rejecter) => {
                    record.rejecter = Some(rejecter);
                    ApprovalStatus::Rejected
                }
                Decision::Timeout => ApprovalStatus::Timeout,
            };
            record.status = status;
            if comment.is_some() {
                record.comment = comment;
            }
            record.resolved_at = Some(Utc::now());
            (record.status, record.state_id.clone(), record.node_name.clone())
        };

        self.inner.status_tx.send_replace(status);
        tracing::info!(state_id = %state_id, node = %node, status = ?status, "Approval request resolved");
        if let Some(observers) = &self.inner.observers {
            observers.approval_resolved(&state_id, &node, status);
        }
        Ok(())
    }

    pub fn approve(&self, approver: impl Into<String>, comment: Option<String>) -> std::result::Result<(), ApprovalError> {
        self.resolve(Decision::Approve(approver.into()), comment)
    }

    pub fn reject(&self, rejecter: impl Into<String>, comment: Option<String>) -> std::result::Result<(), ApprovalError> {
        self.resolve(Decision::Reject(rejecter.into()), comment)
    }

    pub fn timeout_request(&self) -> std::result::Result<(), ApprovalError> {
        self.resolve(Decision::Timeout, None)
    }

    /// Move to `Timeout` if the request's own timeout has elapsed
    ///
    /// Returns whether the request is timed out after the check.
    pub fn check_expired(&self) -> bool {
        if let Some(limit) = self.inner.timeout {
            if self.is_pending() && self.inner.created.elapsed() >= limit {
                let _ = self.timeout_request();
            }
        }
        self.is_timed_out()
    }

    async fn resolved(&self) -> ApprovalStatus {
        let mut rx = self.inner.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }

    /// Suspend until a decision is recorded or the timeout elapses
    ///
    /// `timeout` overrides the request's own timeout; with neither, waits
    /// indefinitely. On expiry the request moves to `Timeout` and
    /// [`GraphError::ApprovalTimeout`] is returned, unless a decision landed
    /// first, in which case that decision is returned.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<ApprovalStatus> {
        let Some(limit) = timeout.or(self.inner.timeout) else {
            return Ok(self.resolved().await);
        };

        match tokio::time::timeout(limit, self.resolved()).await {
            Ok(status) => Ok(status),
            Err(_) => match self.timeout_request() {
                Err(ApprovalError::AlreadyResolved { status, .. })
                    if status != ApprovalStatus::Timeout =>
                {
                    Ok(status)
                }
                _ => {
                    let record = self.record();
                    tracing::warn!(state_id = %record.state_id, node = %record.node_name, timeout_ms = limit.as_millis() as u64, "Approval timed out");
                    Err(GraphError::ApprovalTimeout {
                        state_id: record.state_id,
                        node: record.node_name,
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
        }
    }
}
