//! Artifact fetching
//!
//! A fetched artifact is a local file with a scoped lifetime: it exists from
//! fetch until the comparison finishes, and is released when the handle drops
//! on every path, including comparator failure.

use crate::error::FetchError;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

mod http;

pub use http::HttpFetcher;

/// Retrieves a submitted artifact into a local temporary resource
#[async_trait::async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch `reference` (URL or path). No retries.
    async fn fetch(&self, reference: &str) -> Result<FetchedArtifact, FetchError>;
}

enum Backing {
    /// Deleted when dropped
    TempFile(NamedTempFile),
    /// Arbitrary release hook, run exactly once
    Custom(Option<Box<dyn FnOnce() + Send>>),
}

/// Handle to locally retrieved bytes
pub struct FetchedArtifact {
    path: PathBuf,
    backing: Backing,
}

impl FetchedArtifact {
    /// Wrap a temporary file; the file is deleted on release
    #[must_use]
    pub fn from_temp(file: NamedTempFile) -> Self {
        Self {
            path: file.path().to_path_buf(),
            backing: Backing::TempFile(file),
        }
    }

    /// Wrap a path whose lifetime is managed by `release`
    #[must_use]
    pub fn with_release<F>(path: impl Into<PathBuf>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            path: path.into(),
            backing: Backing::Custom(Some(Box::new(release))),
        }
    }

    /// Local path of the artifact
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now, reporting deletion errors that a drop would swallow
    pub fn release(mut self) -> std::io::Result<()> {
        match std::mem::replace(&mut self.backing, Backing::Custom(None)) {
            Backing::TempFile(file) => file.close(),
            Backing::Custom(mut hook) => {
                if let Some(release) = hook.take() {
                    release();
                }
                Ok(())
            }
        }
    }
}

impl Drop for FetchedArtifact {
    fn drop(&mut self) {
        if let Backing::Custom(hook) = &mut self.backing {
            if let Some(release) = hook.take() {
                release();
            }
        }
    }
}

impl std::fmt::Debug for FetchedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedArtifact")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn temp_artifact_is_deleted_on_release() {
        let artifact = FetchedArtifact::from_temp(NamedTempFile::new().unwrap());
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        artifact.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn temp_artifact_is_deleted_on_drop() {
        let artifact = FetchedArtifact::from_temp(NamedTempFile::new().unwrap());
        let path = artifact.path().to_path_buf();

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn custom_release_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let artifact = FetchedArtifact::with_release("/tmp/none", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        artifact.release().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
