//! Predicates over workflow state
//!
//! A [`Predicate`] is either a host closure or a compiled [`Expression`]. Both
//! are evaluated through [`Predicate::evaluate`], which never panics: a panic
//! inside a closure is caught and reported as [`PredicateError::Panicked`].
//!
//! What a failure *means* is decided by the caller. Edges and routing rules
//! treat a failed predicate as false (the transition is not taken). Interrupt
//! conditions also treat it as false, which means "do not interrupt".

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use flowgraph_state::WorkflowState;

use crate::expression::{Expression, ExpressionError};

/// Reason a predicate could not produce a boolean
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredicateError {
    #[error("Type mismatch in '{operation}': {left} vs {right}")]
    TypeMismatch {
        operation: String,
        left: String,
        right: String,
    },

    #[error("Predicate panicked: {0}")]
    Panicked(String),

    #[error("Predicate failed: {0}")]
    Failed(String),
}

/// Fallible closure over state
pub type PredicateFn = Arc<dyn Fn(&WorkflowState) -> Result<bool, PredicateError> + Send + Sync>;

/// Boolean test over workflow state
#[derive(Clone)]
pub enum Predicate {
    Closure(PredicateFn),
    Expression(Arc<Expression>),
}

impl Predicate {
    /// Wrap an infallible closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        Self::Closure(Arc::new(move |state| Ok(f(state))))
    }

    /// Wrap a closure that can report its own failure
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&WorkflowState) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self::Closure(Arc::new(f))
    }

    /// Compile a textual condition
    pub fn expression(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self::Expression(Arc::new(Expression::parse(source)?)))
    }

    pub fn evaluate(&self, state: &WorkflowState) -> Result<bool, PredicateError> {
        match self {
            Predicate::Expression(expr) => expr.evaluate(state),
            Predicate::Closure(f) => match catch_unwind(AssertUnwindSafe(|| f(state))) {
                Ok(result) => result,
                Err(payload) => Err(PredicateError::Panicked(panic_message(payload.as_ref()))),
            },
        }
    }

    /// Expression source, if this predicate was compiled from text
    pub fn source(&self) -> Option<&str> {
        match self {
            Predicate::Expression(expr) => Some(expr.source()),
            Predicate::Closure(_) => None,
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Closure(_) => f.write_str("Predicate(<function>)"),
            Predicate::Expression(expr) => write!(f, "Predicate({:?})", expr.source()),
        }
    }
}

impl From<Expression> for Predicate {
    fn from(expr: Expression) -> Self {
        Self::Expression(Arc::new(expr))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
