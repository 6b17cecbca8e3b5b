//! Task model
//!
//! A task is a unit of work the executor can run at any isolation level:
//! - `Input` and `Output` are serde types so they can cross a process boundary
//! - `run` reports completion through exactly one path: a value or a `TaskFailure`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique invocation identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work runnable inline, on a worker thread, or in a worker process.
#[async_trait::async_trait]
pub trait Task: Send + Sync + 'static {
    /// Input handed to the worker at dispatch
    type Input: Serialize + DeserializeOwned + Send + 'static;
    /// Value delivered back on success
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run the task to completion.
    ///
    /// Resource cleanup internal to the task happens before this returns,
    /// whichever path is taken.
    async fn run(&self, input: Self::Input) -> Result<Self::Output, TaskFailure>;
}

/// Classification of a captured failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request payload could not be decoded
    PayloadParse,
    /// Any other failure raised inside the task
    Internal,
}

/// Failure object captured at the task boundary.
///
/// Serializable so a worker process can hand it back over its reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?} failure: {message}")]
pub struct TaskFailure {
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable description
    pub message: String,
}

impl TaskFailure {
    /// Create a failure of the given kind
    #[inline]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Payload decoding failure
    #[inline]
    pub fn payload_parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::PayloadParse, message)
    }

    /// Generic failure
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    /// Check if this failure came from payload decoding
    #[inline]
    #[must_use]
    pub fn is_payload_parse(&self) -> bool {
        self.kind == FailureKind::PayloadParse
    }
}
