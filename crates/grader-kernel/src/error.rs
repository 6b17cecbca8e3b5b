//! Error types for the executor
//!
//! Every invocation ends in a value or exactly one of these errors:
//! - a failure captured inside the task
//! - a worker that terminated without delivering anything
//! - a deadline that expired before delivery

use crate::state::TaskState;
use crate::task::TaskFailure;
use std::time::Duration;

/// Caller-visible outcome of a failed invocation
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task ran and reported a failure
    #[error("task failed: {0}")]
    Failed(#[from] TaskFailure),

    /// The worker terminated without writing a result
    #[error("worker lost: {reason}")]
    WorkerLost {
        /// How the worker ended (panic message, exit status, signal)
        reason: String,
    },

    /// No result arrived before the configured deadline
    #[error("task timed out after {after:?}")]
    Timeout {
        /// The deadline that expired
        after: Duration,
    },

    /// The worker could not be started
    #[error("failed to start worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The task input could not be encoded for the worker
    #[error("failed to encode task input: {0}")]
    Encode(#[from] serde_json::Error),

    /// The invocation state machine was driven out of order
    #[error("invocation state error: {0}")]
    State(#[from] TransitionError),
}

impl TaskError {
    /// Build a lost-worker error
    #[inline]
    pub fn lost(reason: impl Into<String>) -> Self {
        Self::WorkerLost {
            reason: reason.into(),
        }
    }

    /// Check if the worker died without delivering
    #[inline]
    #[must_use]
    pub fn is_worker_lost(&self) -> bool {
        matches!(self, Self::WorkerLost { .. })
    }

    /// Check if the deadline expired
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The captured task failure, if that is what ended the invocation
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Illegal move in the invocation state machine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct TransitionError {
    /// State before the attempted move
    pub from: TaskState,
    /// Requested state
    pub to: TaskState,
}
