//! Render Grader (grader-core)
//!
//! Grades a submitted render against a reference image:
//! - Decodes the queue envelope and its nested JSON
//! - Fetches the render into a scoped temporary file
//! - Compares it to the reference with SSIM
//! - Replies with a pass/fail score and a fixed message
//!
//! Every submission runs through the isolated executor from `grader-kernel`.
//!
//! # Example
//!
//! ```rust,ignore
//! use grader_core::prelude::*;
//!
//! let config = GraderConfig::load(None)?;
//! let grader = Grader::from_config(&config, Arc::new(MetricsFacade))?;
//! let reply = grader.handle(submission).await?;
//! println!("{} {}", reply.score, reply.msg);
//! ```

#![warn(unreachable_pub)]

pub mod adapter;
pub mod compare;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod scoring;
pub mod telemetry;

pub use adapter::{DecodedSubmission, Grader, GraderPayload, Reply, Submission, XQueueAdapter};
pub use compare::{ImageComparator, SsimComparator, SIMILARITY_UNAVAILABLE};
pub use config::{GraderConfig, IsolationMode};
pub use error::{AdapterError, ConfigError, FetchError, PayloadParseError, PayloadPart};
pub use fetch::{ArtifactFetcher, FetchedArtifact, HttpFetcher};
pub use pipeline::GradingPipeline;
pub use scoring::{GradingOutcome, Scorer, Verdict};
pub use telemetry::{MetricsFacade, MetricsSink, NoopMetrics};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for grading submissions
    pub use crate::{
        AdapterError, Grader, GraderConfig, GradingOutcome, MetricsFacade, MetricsSink, Reply,
        Submission, Verdict,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
