//! Request/Reply adapter
//!
//! Decodes the queue envelope, runs the grading pipeline through the
//! executor and builds the reply. Decoding happens inside the task, so a
//! malformed payload is a task failure classified as `PayloadParse`.

use crate::config::GraderConfig;
use crate::error::{AdapterError, ConfigError, PayloadParseError, PayloadPart};
use crate::pipeline::GradingPipeline;
use crate::scoring::GradingOutcome;
use crate::telemetry::{self, MetricsSink};
use grader_kernel::{Task, TaskExecutor, TaskFailure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Inbound envelope as delivered by the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// JSON string: `{"student_response": ..., "grader_payload": ...}`
    pub xqueue_body: String,
    /// JSON string: logical filename -> URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xqueue_files: Option<String>,
}

impl Submission {
    /// Build an envelope from already-encoded parts
    pub fn new(xqueue_body: impl Into<String>, xqueue_files: Option<String>) -> Self {
        Self {
            xqueue_body: xqueue_body.into(),
            xqueue_files,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmissionBody {
    student_response: String,
    grader_payload: String,
}

/// Grader-specific parameters; only checked for well-formedness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraderPayload(pub serde_json::Value);

impl std::fmt::Display for GraderPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded envelope
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSubmission {
    /// What the student typed, if anything
    pub student_response: String,
    /// Grader configuration carried by the problem
    pub grader_payload: GraderPayload,
    /// Logical filename -> URL
    pub files: HashMap<String, String>,
}

/// Outbound reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// 0 or 1
    pub score: u8,
    /// Student-facing message
    pub msg: String,
}

impl From<&GradingOutcome> for Reply {
    fn from(outcome: &GradingOutcome) -> Self {
        Self {
            score: outcome.score(),
            msg: outcome.message().to_string(),
        }
    }
}

/// The grading task: envelope in, reply out
pub struct XQueueAdapter {
    pipeline: GradingPipeline,
    metrics: Arc<dyn MetricsSink>,
}

impl XQueueAdapter {
    /// Create an adapter reporting to `metrics`
    pub fn new(pipeline: GradingPipeline, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { pipeline, metrics }
    }

    /// Grading pipeline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &GradingPipeline {
        &self.pipeline
    }

    /// Decode the nested JSON of an envelope
    pub fn decode(&self, submission: &Submission) -> Result<DecodedSubmission, PayloadParseError> {
        let body: SubmissionBody = serde_json::from_str(&submission.xqueue_body)
            .map_err(|e| PayloadParseError::new(PayloadPart::Body, &e))?;

        let grader_payload = match serde_json::from_str(&body.grader_payload) {
            Ok(value) => GraderPayload(value),
            Err(e) => {
                self.metrics.increment(telemetry::GRADER_PAYLOAD_ERROR);
                tracing::debug!("error parsing: '{}' -- {}", body.grader_payload, e);
                return Err(PayloadParseError::new(PayloadPart::GraderPayload, &e));
            }
        };

        let files = match submission.xqueue_files.as_deref() {
            None => HashMap::new(),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| PayloadParseError::new(PayloadPart::Files, &e))?,
        };

        Ok(DecodedSubmission {
            student_response: body.student_response,
            grader_payload,
            files,
        })
    }
}

#[async_trait::async_trait]
impl Task for XQueueAdapter {
    type Input = Submission;
    type Output = Reply;

    fn name(&self) -> &str {
        "xqueue-grade"
    }

    async fn run(&self, submission: Submission) -> Result<Reply, TaskFailure> {
        self.metrics.increment(telemetry::PROCESS_ITEM);

        let decoded = self.decode(&submission).map_err(|e| {
            tracing::error!("process_item: {}", e);
            TaskFailure::from(e)
        })?;
        tracing::debug!(payload = %decoded.grader_payload, "processing submission");

        let started = Instant::now();
        let outcome = self.pipeline.grade(&decoded.files).await;
        self.metrics
            .histogram(telemetry::GRADING_TIME, started.elapsed().as_secs_f64());

        let reply = Reply::from(&outcome);
        self.metrics.increment(telemetry::REPLIES);
        Ok(reply)
    }
}

/// Executor plus adapter: the caller-facing grading entry point
#[derive(Clone)]
pub struct Grader {
    executor: TaskExecutor,
    adapter: Arc<XQueueAdapter>,
}

impl Grader {
    /// Create from parts
    pub fn new(executor: TaskExecutor, adapter: XQueueAdapter) -> Self {
        Self {
            executor,
            adapter: Arc::new(adapter),
        }
    }

    /// Build the production grader.
    ///
    /// Process workers receive `config` as resolved here, so every isolation
    /// mode grades with the same settings.
    pub fn from_config(
        config: &GraderConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ConfigError> {
        let pipeline = GradingPipeline::from_config(config)?;
        let executor = TaskExecutor::new(config.executor_config()?);
        Ok(Self::new(executor, XQueueAdapter::new(pipeline, metrics)))
    }

    /// Grade one submission.
    ///
    /// # Errors
    /// - `AdapterError::PayloadParse` for malformed JSON anywhere in the envelope
    /// - `AdapterError::Task` for lost workers, timeouts and other task failures
    pub async fn handle(&self, submission: Submission) -> Result<Reply, AdapterError> {
        Ok(self.executor.execute(&self.adapter, submission).await?)
    }

    /// The task this grader runs
    #[inline]
    #[must_use]
    pub fn adapter(&self) -> &Arc<XQueueAdapter> {
        &self.adapter
    }

    /// The executor this grader dispatches through
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }
}
