//! Worker side of process isolation
//!
//! A worker process reads one JSON-encoded input from its stdin, runs the task
//! and writes exactly one `WorkerReply` document to its stdout. Stdout is the
//! delivery channel, so nothing else may be written there.

use crate::task::{Task, TaskFailure};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The single item a worker hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply<T> {
    /// Normal return
    Completed {
        /// Task output
        value: T,
    },
    /// Captured failure
    Failed {
        /// Failure object
        failure: TaskFailure,
    },
}

impl<T> WorkerReply<T> {
    /// Convert back into the task's result
    pub fn into_result(self) -> Result<T, TaskFailure> {
        match self {
            Self::Completed { value } => Ok(value),
            Self::Failed { failure } => Err(failure),
        }
    }
}

impl<T> From<Result<T, TaskFailure>> for WorkerReply<T> {
    fn from(result: Result<T, TaskFailure>) -> Self {
        match result {
            Ok(value) => Self::Completed { value },
            Err(failure) => Self::Failed { failure },
        }
    }
}

/// Serve one invocation: read input, run `task`, write the reply.
///
/// # Errors
/// Only I/O errors on the channel itself are returned; task failures and
/// undecodable input are written to `writer` as a `Failed` reply.
pub async fn serve<T, R, W>(task: &T, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    T: Task,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).await?;

    let result = match serde_json::from_slice::<T::Input>(&raw) {
        Ok(input) => task.run(input).await,
        Err(e) => {
            tracing::debug!("worker input is not valid JSON: {}", e);
            Err(TaskFailure::payload_parse(format!("invalid worker input: {e}")))
        }
    };

    let reply = WorkerReply::from(result);
    let mut encoded = serde_json::to_vec(&reply).map_err(std::io::Error::other)?;
    encoded.push(b'\n');

    writer.write_all(&encoded).await?;
    writer.flush().await
}
