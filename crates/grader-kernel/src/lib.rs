//! Grader Kernel (grader-kernel)
//!
//! Isolated task execution core. A task runs inline, on a worker thread, or
//! in a worker process, and the caller always observes exactly one outcome:
//! the task's value, its captured failure, a lost worker, or a timeout.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use grader_kernel::prelude::*;
//!
//! let executor = TaskExecutor::thread();
//! let reply = executor.execute(&Arc::new(my_task), input).await?;
//! ```

pub mod error;
pub mod executor;
pub mod isolation;
pub mod state;
pub mod task;
pub mod worker;

pub use error::{TaskError, TransitionError};
pub use executor::{ExecutorConfig, TaskExecutor};
pub use isolation::{Isolation, WorkerCommand};
pub use state::{Invocation, TaskState};
pub use task::{FailureKind, Task, TaskFailure, TaskId};
pub use worker::WorkerReply;

/// Common imports for running tasks
pub mod prelude {
    pub use crate::error::TaskError;
    pub use crate::executor::{ExecutorConfig, TaskExecutor};
    pub use crate::isolation::{Isolation, WorkerCommand};
    pub use crate::state::{Invocation, TaskState};
    pub use crate::task::{FailureKind, Task, TaskFailure};
    pub use std::sync::Arc;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
