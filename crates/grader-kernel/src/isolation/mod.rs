//! Isolation Module
//!
//! Isolation primitives the executor dispatches to:
//! - `Inline`: the caller's own context, no channel
//! - `Thread`: a dedicated OS thread with its own runtime and a one-shot channel
//! - `Subprocess`: a separate OS process, stdin for the input and stdout as the channel

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub(crate) mod process;
pub(crate) mod thread;

/// Isolation level chosen per deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// Run in the caller's context; failures and panics propagate directly
    Inline,
    /// Run on a worker thread; a panic is reported as a lost worker.
    ///
    /// Only panics are contained. An abort, a stack overflow or an OOM kill
    /// takes the whole process down; use `Subprocess` for untrusted work.
    Thread,
    /// Run in a worker process; any abnormal exit is reported as a lost worker
    Subprocess(WorkerCommand),
}

impl Isolation {
    /// Check if a delivery channel sits between worker and caller
    #[inline]
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        !matches!(self, Self::Inline)
    }
}

/// Command line that starts a worker process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments passed to it
    pub args: Vec<String>,
    /// Extra environment variables, on top of the inherited environment
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl WorkerCommand {
    /// Create a worker command with no arguments
    #[inline]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append an argument
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[inline]
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the worker
    #[inline]
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}
