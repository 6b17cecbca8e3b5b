//! Metrics sink (telemetry)
//!
//! Injected into the adapter so grading can be tested without a live
//! metrics backend. Implementations must be fire-and-forget and safe for
//! concurrent use without per-invocation locking.

/// Counter: submissions picked up for grading
pub const PROCESS_ITEM: &str = "render_grader.process_item";
/// Counter: grader payloads that were not valid JSON
pub const GRADER_PAYLOAD_ERROR: &str = "render_grader.grader_payload_error";
/// Histogram: seconds spent grading one submission
pub const GRADING_TIME: &str = "render_grader.grading_time";
/// Counter: replies produced without an error
pub const REPLIES: &str = "render_grader.replies";

/// Destination for counters and histograms
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by one
    fn increment(&self, name: &'static str);

    /// Record a histogram observation
    fn histogram(&self, name: &'static str, value: f64);
}

/// Sink backed by the process-wide `metrics` recorder
///
/// Without an installed recorder every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsFacade;

impl MetricsSink for MetricsFacade {
    fn increment(&self, name: &'static str) {
        metrics::counter!(name).increment(1);
    }

    fn histogram(&self, name: &'static str, value: f64) {
        metrics::histogram!(name).record(value);
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _name: &'static str) {}

    fn histogram(&self, _name: &'static str, _value: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_without_recorder_is_noop() {
        let sink = MetricsFacade;
        sink.increment(PROCESS_ITEM);
        sink.histogram(GRADING_TIME, 0.25);
    }
}
