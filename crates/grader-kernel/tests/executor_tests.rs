//! Executor Tests
//!
//! Isolation integrity and single delivery across all three isolation levels.
//! Process-level tests drive `sh` as the worker so crashes can be staged
//! without a dedicated worker binary.

use grader_kernel::prelude::*;
use pretty_assertions::assert_eq;
use std::time::Duration;

/// Caller-side handle for a task whose body only ever runs in a worker.
struct Remote;

#[async_trait::async_trait]
impl Task for Remote {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "remote"
    }

    async fn run(&self, _input: String) -> Result<String, TaskFailure> {
        Err(TaskFailure::internal("runs only inside a worker process"))
    }
}

/// Local task with scripted behaviour.
struct Scripted;

#[async_trait::async_trait]
impl Task for Scripted {
    type Input = String;
    type Output = usize;

    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, input: String) -> Result<usize, TaskFailure> {
        match input.as_str() {
            "crash" => panic!("simulated fault"),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(0)
            }
            "" => Err(TaskFailure::payload_parse("empty input")),
            other => Ok(other.len()),
        }
    }
}

fn sh(script: &str) -> TaskExecutor {
    TaskExecutor::subprocess(WorkerCommand::new("sh").args(["-c", script]))
}

/// Every test bounds its wait so a hang shows up as a failure, not a stuck run.
async fn bounded<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(20), fut)
        .await
        .expect("executor must not hang")
}

fn assert_single_terminal(inv: &Invocation) {
    let terminal = inv.history().iter().filter(|s| s.is_terminal()).count();
    assert_eq!(terminal, 1, "history: {:?}", inv.history());
    assert!(inv.state().is_terminal());
}

#[tokio::test]
async fn test_thread_value_round_trip() {
    let (inv, result) = bounded(TaskExecutor::thread().execute_recorded(&Arc::new(Scripted), "four".into())).await;

    assert_eq!(result.unwrap(), 4);
    assert_single_terminal(&inv);
    assert_eq!(
        inv.history(),
        &[TaskState::Idle, TaskState::Dispatched, TaskState::AwaitingResult, TaskState::Completed]
    );
}

#[tokio::test]
async fn test_thread_crash_is_worker_lost() {
    let (inv, result) = bounded(TaskExecutor::thread().execute_recorded(&Arc::new(Scripted), "crash".into())).await;

    assert!(result.unwrap_err().is_worker_lost());
    assert_eq!(inv.state(), TaskState::Lost);
    assert_single_terminal(&inv);
}

#[tokio::test]
async fn test_caller_survives_repeated_crashes() {
    let executor = TaskExecutor::thread();
    let task = Arc::new(Scripted);

    for _ in 0..5 {
        let result = bounded(executor.execute(&task, "crash".into())).await;
        assert!(result.unwrap_err().is_worker_lost());
    }

    // The executor is still usable afterwards.
    assert_eq!(bounded(executor.execute(&task, "ok".into())).await.unwrap(), 2);
}

#[tokio::test]
async fn test_thread_timeout() {
    let executor = TaskExecutor::new(
        ExecutorConfig::new(Isolation::Thread).with_timeout(Duration::from_millis(100)),
    );
    let (inv, result) = bounded(executor.execute_recorded(&Arc::new(Scripted), "slow".into())).await;

    assert!(result.unwrap_err().is_timeout());
    assert_eq!(inv.state(), TaskState::TimedOut);
}

#[tokio::test]
async fn test_inline_failure_propagates() {
    let result = bounded(TaskExecutor::inline().execute(&Arc::new(Scripted), String::new())).await;

    let err = result.unwrap_err();
    assert!(err.failure().is_some_and(TaskFailure::is_payload_parse));
}

#[cfg(unix)]
mod process {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_process_reply_is_delivered() {
        let executor = sh(r#"input=$(cat); printf '{"status":"completed","value":%s}\n' "$input""#);
        let (inv, result) = bounded(executor.execute_recorded(&Arc::new(Remote), "pong".into())).await;

        assert_eq!(result.unwrap(), "pong");
        assert_single_terminal(&inv);
    }

    #[tokio::test]
    async fn test_process_failure_is_delivered() {
        let executor = sh(r#"cat >/dev/null; printf '{"status":"failed","failure":{"kind":"payload_parse","message":"bad body"}}'"#);
        let result = bounded(executor.execute(&Arc::new(Remote), "x".into())).await;

        let err = result.unwrap_err();
        let failure = err.failure().expect("failure delivered");
        assert!(failure.is_payload_parse());
        assert_eq!(failure.message, "bad body");
    }

    #[tokio::test]
    async fn test_process_killed_by_signal_is_lost() {
        let executor = sh("cat >/dev/null; kill -9 $$");
        let (inv, result) = bounded(executor.execute_recorded(&Arc::new(Remote), "x".into())).await;

        let err = result.unwrap_err();
        assert!(err.is_worker_lost(), "got {err:?}");
        assert_eq!(inv.state(), TaskState::Lost);
    }

    #[tokio::test]
    async fn test_process_abort_is_contained() {
        let executor = sh("cat >/dev/null; kill -ABRT $$");
        let (inv, result) = bounded(executor.execute_recorded(&Arc::new(Remote), "x".into())).await;

        assert!(result.unwrap_err().is_worker_lost());
        assert_single_terminal(&inv);
    }

    #[tokio::test]
    async fn test_process_receives_command_env() {
        let executor = TaskExecutor::subprocess(
            WorkerCommand::new("sh")
                .args([
                    "-c",
                    r#"cat >/dev/null; printf '{"status":"completed","value":"%s"}' "$GRADER_TEST_VALUE""#,
                ])
                .env("GRADER_TEST_VALUE", "from-parent"),
        );
        let result = bounded(executor.execute(&Arc::new(Remote), "x".into())).await;

        assert_eq!(result.unwrap(), "from-parent");
    }

    #[tokio::test]
    async fn test_process_exit_without_reply_is_lost() {
        let result = bounded(sh("exit 3").execute(&Arc::new(Remote), "x".into())).await;
        assert!(result.unwrap_err().is_worker_lost());
    }

    #[tokio::test]
    async fn test_process_second_reply_is_rejected() {
        let executor = sh(r#"cat >/dev/null; echo '{"status":"completed","value":"a"}'; echo '{"status":"completed","value":"b"}'"#);
        let result = bounded(executor.execute(&Arc::new(Remote), "x".into())).await;

        assert!(result.unwrap_err().is_worker_lost());
    }

    #[tokio::test]
    async fn test_process_timeout_kills_worker() {
        let executor = TaskExecutor::new(
            ExecutorConfig::new(Isolation::Subprocess(
                WorkerCommand::new("sh").args(["-c", "sleep 30"]),
            ))
            .with_timeout(Duration::from_millis(200)),
        );
        let started = std::time::Instant::now();
        let (inv, result) = bounded(executor.execute_recorded(&Arc::new(Remote), "x".into())).await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(inv.state(), TaskState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let executor = TaskExecutor::subprocess(WorkerCommand::new("/nonexistent/grader-worker"));
        let (inv, result) = bounded(executor.execute_recorded(&Arc::new(Remote), "x".into())).await;

        assert!(matches!(result, Err(TaskError::Spawn(_))));
        assert_eq!(inv.state(), TaskState::Failed);
    }
}
