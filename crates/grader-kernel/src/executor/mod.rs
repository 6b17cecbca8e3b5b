//! Isolated Task Executor
//!
//! Runs a `Task` at the configured isolation level and delivers exactly one
//! outcome to the caller: the task's value or a `TaskError`.
//!
//! # Critical Invariant
//!
//! A worker crash never reaches the caller as a crash. A thread panic or an
//! abnormal process exit that leaves the delivery channel empty is reported as
//! `TaskError::WorkerLost`. No retries happen at this layer.

use crate::error::TaskError;
use crate::isolation::process::ProcessWorker;
use crate::isolation::thread::ThreadWorker;
use crate::isolation::{Isolation, WorkerCommand};
use crate::state::{Invocation, TaskState};
use crate::task::{Task, TaskFailure};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Where tasks run
    pub isolation: Isolation,
    /// Optional deadline for a single invocation
    pub timeout: Option<Duration>,
}

impl ExecutorConfig {
    /// Create a configuration without a deadline
    #[inline]
    #[must_use]
    pub fn new(isolation: Isolation) -> Self {
        Self {
            isolation,
            timeout: None,
        }
    }

    /// With a per-invocation deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Task executor
///
/// There is no default isolation level: only `Subprocess` survives an abort or
/// an OOM kill, and it needs a worker command.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    config: ExecutorConfig,
}

impl TaskExecutor {
    /// Create a new executor
    #[inline]
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Executor that runs tasks in the caller's context
    #[inline]
    #[must_use]
    pub fn inline() -> Self {
        Self::new(ExecutorConfig::new(Isolation::Inline))
    }

    /// Executor that runs each task on its own thread
    #[inline]
    #[must_use]
    pub fn thread() -> Self {
        Self::new(ExecutorConfig::new(Isolation::Thread))
    }

    /// Executor that runs each task in a worker process
    #[inline]
    #[must_use]
    pub fn subprocess(command: WorkerCommand) -> Self {
        Self::new(ExecutorConfig::new(Isolation::Subprocess(command)))
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `task` with `input` and return its single outcome.
    ///
    /// # Errors
    /// - `TaskError::Failed` if the task reported a failure
    /// - `TaskError::WorkerLost` if an isolated worker ended without a result
    /// - `TaskError::Timeout` if a configured deadline expired
    /// - `TaskError::Spawn` / `TaskError::Encode` if the worker could not be started
    ///
    /// # Panics
    /// In inline mode a panic inside the task propagates to the caller.
    pub async fn execute<T: Task>(
        &self,
        task: &Arc<T>,
        input: T::Input,
    ) -> Result<T::Output, TaskError> {
        self.execute_recorded(task, input).await.1
    }

    /// Like [`execute`](Self::execute), also returning the invocation history.
    pub async fn execute_recorded<T: Task>(
        &self,
        task: &Arc<T>,
        input: T::Input,
    ) -> (Invocation, Result<T::Output, TaskError>) {
        let mut invocation = Invocation::new();
        let span = tracing::info_span!("task", task_id = %invocation.id(), task = task.name());

        let result = async {
            let delivered = self.dispatch(task, input, &mut invocation).await;
            let result = delivered.and_then(|r| r.map_err(TaskError::Failed));
            let terminal = terminal_state(&result);

            if let Err(e) = invocation.advance(terminal) {
                tracing::error!("invocation ended out of order: {}", e);
            }
            match &result {
                Ok(_) => tracing::debug!("task completed"),
                Err(e) => tracing::error!("task did not complete: {}", e),
            }
            result
        }
        .instrument(span)
        .await;

        (invocation, result)
    }

    async fn dispatch<T: Task>(
        &self,
        task: &Arc<T>,
        input: T::Input,
        invocation: &mut Invocation,
    ) -> Result<Result<T::Output, TaskFailure>, TaskError> {
        invocation.advance(TaskState::Dispatched)?;

        match &self.config.isolation {
            Isolation::Inline => {
                self.bounded(async { Ok::<_, TaskError>(task.run(input).await) })
                    .await
            }
            Isolation::Thread => {
                let worker = ThreadWorker::spawn(Arc::clone(task), input, invocation.id())?;
                invocation.advance(TaskState::AwaitingResult)?;
                // A timed-out thread cannot be killed; it is left to finish on its own.
                self.bounded(worker.join()).await
            }
            Isolation::Subprocess(command) => {
                let payload = serde_json::to_vec(&input)?;
                let mut worker = ProcessWorker::spawn(command, payload)?;
                invocation.advance(TaskState::AwaitingResult)?;

                match self.config.timeout {
                    None => worker.wait().await,
                    Some(after) => {
                        let waited = tokio::time::timeout(after, worker.wait()).await;
                        match waited {
                            Ok(delivered) => delivered,
                            Err(_) => {
                                worker.kill().await;
                                Err(TaskError::Timeout { after })
                            }
                        }
                    }
                }
            }
        }
    }

    async fn bounded<F, O>(&self, fut: F) -> Result<O, TaskError>
    where
        F: Future<Output = Result<O, TaskError>>,
    {
        match self.config.timeout {
            None => fut.await,
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .unwrap_or(Err(TaskError::Timeout { after })),
        }
    }
}

fn terminal_state<O>(result: &Result<O, TaskError>) -> TaskState {
    match result {
        Ok(_) => TaskState::Completed,
        Err(TaskError::WorkerLost { .. }) => TaskState::Lost,
        Err(TaskError::Timeout { .. }) => TaskState::TimedOut,
        Err(_) => TaskState::Failed,
    }
}
