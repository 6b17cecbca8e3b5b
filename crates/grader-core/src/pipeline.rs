//! Grading pipeline: fetch -> compare -> score
//!
//! Steps run strictly in that order. A submission without the expected
//! artifact is graded incorrect without fetching anything; a fetch failure is
//! recovered into the unavailable similarity and so into a server error.

use crate::compare::{ImageComparator, SsimComparator, SIMILARITY_UNAVAILABLE};
use crate::config::GraderConfig;
use crate::fetch::{ArtifactFetcher, HttpFetcher};
use crate::scoring::{GradingOutcome, Scorer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fetcher, comparator and scorer wired together
#[derive(Clone)]
pub struct GradingPipeline {
    fetcher: Arc<dyn ArtifactFetcher>,
    comparator: Arc<dyn ImageComparator>,
    scorer: Scorer,
    reference_image: PathBuf,
    artifact_key: String,
}

impl GradingPipeline {
    /// Create a pipeline comparing against `reference_image`
    pub fn new(
        fetcher: Arc<dyn ArtifactFetcher>,
        comparator: Arc<dyn ImageComparator>,
        scorer: Scorer,
        reference_image: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            comparator,
            scorer,
            reference_image: reference_image.into(),
            artifact_key: GraderConfig::default().artifact_key,
        }
    }

    /// Production pipeline: HTTP fetcher and SSIM comparator
    pub fn from_config(config: &GraderConfig) -> reqwest::Result<Self> {
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;
        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(SsimComparator::new()),
            Scorer::new(config.similarity_threshold),
            config.reference_image.clone(),
        )
        .with_artifact_key(config.artifact_key.clone()))
    }

    /// With the logical filename looked up in the files mapping
    #[inline]
    #[must_use]
    pub fn with_artifact_key(mut self, key: impl Into<String>) -> Self {
        self.artifact_key = key.into();
        self
    }

    /// Logical filename of the render
    #[inline]
    #[must_use]
    pub fn artifact_key(&self) -> &str {
        &self.artifact_key
    }

    /// Reference image path
    #[inline]
    #[must_use]
    pub fn reference_image(&self) -> &Path {
        &self.reference_image
    }

    /// Grade a submission's files mapping
    pub async fn grade(&self, files: &HashMap<String, String>) -> GradingOutcome {
        let Some(reference) = files.get(&self.artifact_key) else {
            tracing::debug!(key = %self.artifact_key, "submission has no render, grading as incorrect");
            return GradingOutcome::INCORRECT;
        };

        let similarity = self.similarity(reference).await;
        let outcome = self.scorer.score(similarity);
        tracing::info!(similarity, verdict = ?outcome.verdict(), "render graded");
        outcome
    }

    /// Fetch `reference` and compare it to the reference image.
    ///
    /// The fetched artifact is released before returning, whatever the comparator did.
    pub async fn similarity(&self, reference: &str) -> f64 {
        let artifact = match self.fetcher.fetch(reference).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!("fetching render failed: {}", e);
                return SIMILARITY_UNAVAILABLE;
            }
        };

        let similarity = self.comparator.compare(&self.reference_image, artifact.path());

        if let Err(e) = artifact.release() {
            tracing::warn!("releasing fetched render failed: {}", e);
        }
        similarity
    }
}

impl std::fmt::Debug for GradingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingPipeline")
            .field("scorer", &self.scorer)
            .field("reference_image", &self.reference_image)
            .field("artifact_key", &self.artifact_key)
            .finish_non_exhaustive()
    }
}
