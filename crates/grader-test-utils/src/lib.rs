//! Testing utilities for the render grader workspace
//!
//! Shared fixtures, doubles and envelope builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use grader_core::compare::ImageComparator;
use grader_core::scoring::Scorer;
use grader_core::telemetry::MetricsSink;
use grader_core::{ArtifactFetcher, FetchError, FetchedArtifact, GradingPipeline, Submission};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pixel pattern for generated fixtures
pub type Pattern = fn(u32, u32) -> [u8; 3];

pub fn gradient(x: u32, y: u32) -> [u8; 3] {
    [(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8]
}

pub fn checkerboard(x: u32, y: u32) -> [u8; 3] {
    if (x / 4 + y / 4) % 2 == 0 {
        [255, 255, 255]
    } else {
        [0, 0, 0]
    }
}

/// Write a PNG of the given size and return its path
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32, pattern: Pattern) -> PathBuf {
    let image = image::RgbImage::from_fn(width, height, |x, y| image::Rgb(pattern(x, y)));
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

/// Encode a PNG in memory
pub fn png_bytes(width: u32, height: u32, pattern: Pattern) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| image::Rgb(pattern(x, y)));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Envelope with an empty grader payload and the given files mapping
pub fn submission(files: Option<serde_json::Value>) -> Submission {
    let body = serde_json::json!({ "student_response": "", "grader_payload": "{}" });
    Submission::new(body.to_string(), files.map(|f| f.to_string()))
}

/// Envelope whose render points at `url`
pub fn render_submission(url: &str) -> Submission {
    submission(Some(serde_json::json!({ "render": url })))
}

/// Fetcher that hands out local paths and counts opens and closes
#[derive(Debug, Default)]
pub struct CountingFetcher {
    pub fail: bool,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactFetcher for CountingFetcher {
    async fn fetch(&self, reference: &str) -> Result<FetchedArtifact, FetchError> {
        if self.fail {
            return Err(FetchError::Status {
                url: reference.to_string(),
                status: 503,
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::clone(&self.closed);
        Ok(FetchedArtifact::with_release(reference, move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Comparator returning a fixed similarity
#[derive(Debug, Clone, Copy)]
pub struct FixedComparator(pub f64);

impl ImageComparator for FixedComparator {
    fn compare(&self, _reference: &Path, _candidate: &Path) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    Increment(&'static str),
    Histogram(&'static str, f64),
}

/// Sink that keeps every observation
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MetricEvent::Increment(n) if *n == name))
            .count()
    }

    pub fn histogram(&self, name: &str) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MetricEvent::Histogram(n, v) if *n == name => Some(*v),
                _ => None,
            })
            .collect()
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment(&self, name: &'static str) {
        self.events.lock().push(MetricEvent::Increment(name));
    }

    fn histogram(&self, name: &'static str, value: f64) {
        self.events.lock().push(MetricEvent::Histogram(name, value));
    }
}

/// Pipeline over doubles with the default threshold
pub fn pipeline_with(
    fetcher: Arc<dyn ArtifactFetcher>,
    comparator: Arc<dyn ImageComparator>,
) -> GradingPipeline {
    GradingPipeline::new(fetcher, comparator, Scorer::default(), "reference.png")
}
