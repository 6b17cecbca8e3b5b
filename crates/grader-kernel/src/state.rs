//! Invocation state machine
//!
//! Idle -> Dispatched -> AwaitingResult -> Completed | Failed | Lost | TimedOut
//!
//! Inline runs skip AwaitingResult: there is no channel to wait on.

use crate::error::TransitionError;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Not started
    Idle,
    /// Worker started and handed its input
    Dispatched,
    /// Caller blocked on worker termination
    AwaitingResult,
    /// Value delivered
    Completed,
    /// Failure object delivered
    Failed,
    /// Worker ended without delivering
    Lost,
    /// Deadline expired before delivery
    TimedOut,
}

impl TaskState {
    /// Check if no further transitions are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Lost | Self::TimedOut
        )
    }
}

/// Validates a state transition.
pub fn validate_transition(from: TaskState, to: TaskState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: TaskState) -> Vec<TaskState> {
    use TaskState::*;
    match from {
        Idle => vec![Dispatched],
        Dispatched => vec![AwaitingResult, Completed, Failed, TimedOut],
        AwaitingResult => vec![Completed, Failed, Lost, TimedOut],
        Completed | Failed | Lost | TimedOut => vec![],
    }
}

/// History of a single invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    id: TaskId,
    history: Vec<TaskState>,
}

impl Invocation {
    /// Start a fresh invocation in `Idle`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: TaskId::new(),
            history: vec![TaskState::Idle],
        }
    }

    /// Invocation ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.history.last().copied().unwrap_or(TaskState::Idle)
    }

    /// Every state visited, in order
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[TaskState] {
        &self.history
    }

    /// Move to `to`, rejecting illegal transitions
    pub fn advance(&mut self, to: TaskState) -> Result<(), TransitionError> {
        validate_transition(self.state(), to)?;
        tracing::debug!(task_id = %self.id, from = ?self.state(), to = ?to, "invocation transition");
        self.history.push(to);
        Ok(())
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_path() {
        let mut inv = Invocation::new();
        inv.advance(TaskState::Dispatched).unwrap();
        inv.advance(TaskState::AwaitingResult).unwrap();
        inv.advance(TaskState::Lost).unwrap();

        assert_eq!(
            inv.history(),
            &[
                TaskState::Idle,
                TaskState::Dispatched,
                TaskState::AwaitingResult,
                TaskState::Lost
            ]
        );
        assert!(inv.state().is_terminal());
    }

    #[test]
    fn test_inline_cannot_be_lost() {
        assert!(validate_transition(TaskState::Dispatched, TaskState::Lost).is_err());
        assert!(validate_transition(TaskState::Dispatched, TaskState::Completed).is_ok());
    }

    #[test]
    fn test_terminal_state_rejects_second_signal() {
        let mut inv = Invocation::new();
        inv.advance(TaskState::Dispatched).unwrap();
        inv.advance(TaskState::Completed).unwrap();

        let err = inv.advance(TaskState::Failed).unwrap_err();
        assert_eq!(err.from, TaskState::Completed);
        assert_eq!(inv.state(), TaskState::Completed);
    }

    #[test]
    fn test_idle_must_dispatch_first() {
        let mut inv = Invocation::new();
        assert!(inv.advance(TaskState::AwaitingResult).is_err());
        assert_eq!(inv.history().len(), 1);
    }
}
