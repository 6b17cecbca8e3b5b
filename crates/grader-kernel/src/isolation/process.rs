//! Process-level isolation
//!
//! Input goes to the worker's stdin as JSON. The worker's stdout is the
//! delivery channel and must hold exactly one `WorkerReply` once it exits.
//! Stderr is inherited so worker logs reach the caller's log stream.

use super::WorkerCommand;
use crate::error::TaskError;
use crate::task::TaskFailure;
use crate::worker::WorkerReply;
use serde::de::DeserializeOwned;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// A task running in a child process
pub(crate) struct ProcessWorker {
    child: Child,
    stdout: ChildStdout,
    feeder: JoinHandle<std::io::Result<()>>,
}

impl ProcessWorker {
    /// Start the worker and begin streaming `payload` to its stdin
    pub(crate) fn spawn(command: &WorkerCommand, payload: Vec<u8>) -> std::io::Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout not captured"))?;

        // Written concurrently with the stdout drain so large inputs cannot deadlock.
        let feeder = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        tracing::debug!(pid = ?child.id(), program = %command.program.display(), "worker process started");

        Ok(Self {
            child,
            stdout,
            feeder,
        })
    }

    /// Wait for the process to exit, then decode its single reply.
    pub(crate) async fn wait<O: DeserializeOwned>(
        &mut self,
    ) -> Result<Result<O, TaskFailure>, TaskError> {
        let mut raw = Vec::new();
        let (read, status) = tokio::join!(self.stdout.read_to_end(&mut raw), self.child.wait());

        let status = status.map_err(|e| TaskError::lost(format!("could not wait on worker: {e}")))?;
        if let Err(e) = read {
            tracing::warn!("reading worker reply failed: {}", e);
        }

        // A worker that dies early closes its stdin, so a broken pipe here is expected.
        match (&mut self.feeder).await {
            Ok(Err(e)) => tracing::debug!("worker input not fully written: {}", e),
            Err(e) => tracing::debug!("worker input feeder aborted: {}", e),
            Ok(Ok(())) => {}
        }

        decode_reply(&raw, status)
    }

    /// Forcibly stop the worker
    pub(crate) async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("failed to kill worker process: {}", e);
        }
        self.feeder.abort();
    }
}

fn decode_reply<O: DeserializeOwned>(
    raw: &[u8],
    status: ExitStatus,
) -> Result<Result<O, TaskFailure>, TaskError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        tracing::error!("worker process lost: {}", status);
        return Err(TaskError::lost(format!(
            "worker exited ({status}) without a reply"
        )));
    }

    match serde_json::from_slice::<WorkerReply<O>>(raw) {
        Ok(reply) => {
            if !status.success() {
                tracing::warn!("worker delivered a reply but exited with {}", status);
            }
            Ok(reply.into_result())
        }
        Err(e) => {
            tracing::error!("worker process sent an undecodable reply: {}", e);
            Err(TaskError::lost(format!(
                "worker exited ({status}) with an undecodable reply: {e}"
            )))
        }
    }
}
