//! Thread-level isolation
//!
//! The worker owns a current-thread runtime so a panic unwinds only that
//! thread. The caller joins the thread first and drains the channel after.

use crate::error::TaskError;
use crate::task::{Task, TaskFailure, TaskId};
use std::any::Any;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

type Delivery<O> = Result<O, TaskFailure>;

/// A task running on its own OS thread
pub(crate) struct ThreadWorker<O> {
    handle: JoinHandle<()>,
    delivery: oneshot::Receiver<Delivery<O>>,
}

impl<O: Send + 'static> ThreadWorker<O> {
    /// Start `task` on a fresh thread
    pub(crate) fn spawn<T>(task: Arc<T>, input: T::Input, id: TaskId) -> std::io::Result<Self>
    where
        T: Task<Output = O>,
    {
        let (tx, rx) = oneshot::channel();

        let handle = std::thread::Builder::new()
            .name(format!("grader-worker-{id}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("worker runtime failed to start: {}", e);
                        return;
                    }
                };

                let result = runtime.block_on(task.run(input));
                // The caller may have stopped listening after a timeout.
                let _ = tx.send(result);
            })?;

        Ok(Self {
            handle,
            delivery: rx,
        })
    }

    /// Wait for the thread to terminate, then drain the channel once.
    pub(crate) async fn join(self) -> Result<Delivery<O>, TaskError> {
        let Self {
            handle,
            mut delivery,
        } = self;

        let crash = match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => None,
            Ok(Err(payload)) => Some(panic_message(payload.as_ref())),
            Err(e) => Some(format!("join failed: {e}")),
        };

        match delivery.try_recv() {
            Ok(result) => Ok(result),
            Err(_) => {
                let reason = crash.unwrap_or_else(|| "worker exited without a result".to_string());
                tracing::error!("worker thread lost: {}", reason);
                Err(TaskError::lost(reason))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_both_payload_types() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked: static");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked: owned");

        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked");
    }
}
