//! Error types for the render grader
//!
//! Provides error handling for:
//! - Artifact retrieval failures
//! - Submission payload decoding failures
//! - Configuration loading and validation
//! - The caller-facing adapter surface

use grader_kernel::{TaskError, TaskFailure};

/// Artifact retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No reference was supplied
    #[error("empty artifact reference")]
    EmptyReference,

    /// Connection, DNS or transfer failure
    #[error("network error fetching {url}: {source}")]
    Network {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("unexpected status {status} fetching {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Local file or temporary resource failure
    #[error("artifact i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which part of the submission failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadPart {
    /// The envelope itself
    Envelope,
    /// `xqueue_body`
    Body,
    /// `grader_payload` inside the body
    GraderPayload,
    /// `xqueue_files`
    Files,
}

impl std::fmt::Display for PayloadPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Envelope => "envelope",
            Self::Body => "xqueue_body",
            Self::GraderPayload => "grader_payload",
            Self::Files => "xqueue_files",
        };
        f.write_str(name)
    }
}

/// Malformed JSON somewhere in the submission
#[derive(Debug, thiserror::Error)]
#[error("malformed {part}: {message}")]
pub struct PayloadParseError {
    /// Offending part
    pub part: PayloadPart,
    /// Decoder message
    pub message: String,
}

impl PayloadParseError {
    /// Create from a serde error
    #[inline]
    pub fn new(part: PayloadPart, err: &serde_json::Error) -> Self {
        Self {
            part,
            message: err.to_string(),
        }
    }
}

impl From<PayloadParseError> for TaskFailure {
    fn from(err: PayloadParseError) -> Self {
        TaskFailure::payload_parse(err.to_string())
    }
}

/// Caller-facing adapter errors
///
/// Every variant is an infrastructure problem, never a verdict on the submission.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Submission payload could not be decoded
    #[error("payload parse error: {0}")]
    PayloadParse(String),

    /// Execution failed, the worker was lost, or the deadline expired
    #[error(transparent)]
    Task(TaskError),
}

impl From<TaskError> for AdapterError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Failed(failure) if failure.is_payload_parse() => {
                Self::PayloadParse(failure.message)
            }
            other => Self::Task(other),
        }
    }
}

impl AdapterError {
    /// Check if the submission payload was malformed
    #[inline]
    #[must_use]
    pub fn is_payload_parse(&self) -> bool {
        matches!(self, Self::PayloadParse(_))
    }

    /// Check if an isolated worker died without replying
    #[inline]
    #[must_use]
    pub fn is_worker_lost(&self) -> bool {
        matches!(self, Self::Task(e) if e.is_worker_lost())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `GraderConfig`
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// HTTP client could not be built
    #[error("cannot build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Worker executable could not be determined
    #[error("cannot locate worker executable: {0}")]
    WorkerProgram(#[from] std::io::Error),

    /// Resolved configuration could not be handed to or read by a worker
    #[error("worker config: {0}")]
    WorkerConfig(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_error_becomes_payload_failure() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let failure: TaskFailure = PayloadParseError::new(PayloadPart::GraderPayload, &err).into();

        assert!(failure.is_payload_parse());
        assert!(failure.message.contains("grader_payload"));
    }

    #[test]
    fn adapter_error_classifies_task_errors() {
        let parse = AdapterError::from(TaskError::Failed(TaskFailure::payload_parse("x")));
        assert!(parse.is_payload_parse());

        let lost = AdapterError::from(TaskError::lost("killed"));
        assert!(lost.is_worker_lost());
        assert!(!lost.is_payload_parse());

        let generic = AdapterError::from(TaskError::Failed(TaskFailure::internal("x")));
        assert!(matches!(generic, AdapterError::Task(TaskError::Failed(_))));
    }
}
