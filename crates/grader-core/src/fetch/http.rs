//! HTTP and filesystem fetcher
//!
//! `http(s)://` references are streamed chunk by chunk into a temporary file.
//! `file://` URLs and bare paths are copied the same way, so the comparator
//! always sees a private copy it can release.

use super::{ArtifactFetcher, FetchedArtifact};
use crate::error::FetchError;
use reqwest::Url;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Fetcher backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        // Thread workers each drive their own runtime; pooled connections would outlive it
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client })
    }

    /// Create from an existing client
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: Url) -> Result<FetchedArtifact, FetchError> {
        let shown = url.to_string();
        let network = |source| FetchError::Network {
            url: shown.clone(),
            source,
        };

        let mut response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: shown.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = NamedTempFile::new()?;
        let mut written = 0_usize;
        while let Some(chunk) = response.chunk().await.map_err(network)? {
            file.write_all(&chunk)?;
            written += chunk.len();
        }
        file.flush()?;

        tracing::debug!(url = %shown, bytes = written, "artifact downloaded");
        Ok(FetchedArtifact::from_temp(file))
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> Result<FetchedArtifact, FetchError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(FetchError::EmptyReference);
        }

        match locate(reference) {
            Location::Remote(url) => self.download(url).await,
            Location::Local(path) => copy_local(path).await,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

fn locate(reference: &str) -> Location {
    match Url::parse(reference) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Location::Remote(url),
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .unwrap_or_else(|()| PathBuf::from(url.path()));
            Location::Local(path)
        }
        _ => Location::Local(PathBuf::from(reference)),
    }
}

async fn copy_local(path: PathBuf) -> Result<FetchedArtifact, FetchError> {
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        let mut source = std::fs::File::open(&path)?;
        let mut file = NamedTempFile::new()?;
        std::io::copy(&mut source, &mut file)?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(std::io::Error::other)??;

    Ok(FetchedArtifact::from_temp(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_classifies_references() {
        assert!(matches!(locate("https://example.com/r.png"), Location::Remote(_)));
        assert!(matches!(locate("http://localhost:8080/r.png"), Location::Remote(_)));
        assert_eq!(locate("img/r.png"), Location::Local(PathBuf::from("img/r.png")));
        assert_eq!(locate("/tmp/r.png"), Location::Local(PathBuf::from("/tmp/r.png")));
    }

    #[cfg(unix)]
    #[test]
    fn locate_file_url() {
        assert_eq!(
            locate("file:///tmp/r.png"),
            Location::Local(PathBuf::from("/tmp/r.png"))
        );
    }

    #[tokio::test]
    async fn empty_reference_is_rejected() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(fetcher.fetch("  ").await, Err(FetchError::EmptyReference)));
    }

    #[tokio::test]
    async fn local_file_is_copied_and_released() {
        let mut source = NamedTempFile::new().unwrap();
        source.write_all(b"render bytes").unwrap();

        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let artifact = fetcher.fetch(source.path().to_str().unwrap()).await.unwrap();

        assert_ne!(artifact.path(), source.path());
        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"render bytes");

        let copy = artifact.path().to_path_buf();
        artifact.release().unwrap();
        assert!(!copy.exists());
        assert!(source.path().exists());
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let result = fetcher.fetch("/nonexistent/render.png").await;
        assert!(matches!(result, Err(FetchError::Io(_))));
    }
}
