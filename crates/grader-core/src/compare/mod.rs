//! Image comparison
//!
//! A comparator never raises: an image pair that cannot be compared yields
//! `SIMILARITY_UNAVAILABLE`, which is distinct from any real score.

use std::path::Path;

mod ssim;

pub use ssim::{mean_ssim, to_grayscale, GrayImage, SsimComparator, SsimError, SSIM_WINDOW};

/// Sentinel meaning "comparison could not be performed"
pub const SIMILARITY_UNAVAILABLE: f64 = -1.0;

/// Produces a similarity percentage for an image pair
#[cfg_attr(test, mockall::automock)]
pub trait ImageComparator: Send + Sync {
    /// Similarity in `[0, 100]`, or `SIMILARITY_UNAVAILABLE`.
    ///
    /// Identical inputs always give identical scores.
    fn compare(&self, reference: &Path, candidate: &Path) -> f64;
}

/// Check for the unavailable sentinel
#[inline]
#[must_use]
#[allow(clippy::float_cmp)]
pub fn is_unavailable(similarity: f64) -> bool {
    similarity == SIMILARITY_UNAVAILABLE
}
