//! Structural similarity over grayscale renders
//!
//! Grayscale uses ITU-R BT.601 luma weights. SSIM uses a 7x7 uniform window,
//! K1 = 0.01, K2 = 0.03, a data range of 255 and sample covariance, averaged
//! over every window that fits inside the image. Images that cannot be
//! compared (undecodable, different sizes, smaller than a window) yield the
//! unavailable sentinel.

use super::{ImageComparator, SIMILARITY_UNAVAILABLE};
use std::path::Path;

/// Side length of the square SSIM window
pub const SSIM_WINDOW: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// 8-bit single-channel image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GrayImage {
    /// Wrap raw pixels; `None` if the buffer does not match the dimensions
    #[must_use]
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw pixels
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Why two images could not be scored
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SsimError {
    /// Images differ in size
    #[error("dimension mismatch: {0:?} vs {1:?}")]
    DimensionMismatch((usize, usize), (usize, usize)),
    /// Smaller than one window in some direction
    #[error("image smaller than the {SSIM_WINDOW}x{SSIM_WINDOW} window")]
    TooSmall,
}

/// Convert to grayscale with BT.601 weights
#[must_use]
pub fn to_grayscale(image: &image::DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            let luma = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
            luma.round().clamp(0.0, 255.0) as u8
        })
        .collect();

    GrayImage {
        width: width as usize,
        height: height as usize,
        pixels,
    }
}

/// Summed-area table with a zero row and column in front
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the window whose top-left corner is `(x, y)`
    fn window(&self, x: usize, y: usize) -> f64 {
        let s = self.stride;
        let (x1, y1) = (x + SSIM_WINDOW, y + SSIM_WINDOW);
        self.sums[y1 * s + x1] - self.sums[y * s + x1] - self.sums[y1 * s + x] + self.sums[y * s + x]
    }
}

/// Mean SSIM of two equally sized grayscale images, in `[-1, 1]`
pub fn mean_ssim(a: &GrayImage, b: &GrayImage) -> Result<f64, SsimError> {
    if (a.width, a.height) != (b.width, b.height) {
        return Err(SsimError::DimensionMismatch(
            (a.width, a.height),
            (b.width, b.height),
        ));
    }
    let (width, height) = (a.width, a.height);
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return Err(SsimError::TooSmall);
    }

    let pa = |i: usize| f64::from(a.pixels[i]);
    let pb = |i: usize| f64::from(b.pixels[i]);
    let sum_a = Integral::build(width, height, pa);
    let sum_b = Integral::build(width, height, pb);
    let sum_aa = Integral::build(width, height, |i| pa(i) * pa(i));
    let sum_bb = Integral::build(width, height, |i| pb(i) * pb(i));
    let sum_ab = Integral::build(width, height, |i| pa(i) * pb(i));

    let np = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0_usize;
    for y in 0..=height - SSIM_WINDOW {
        for x in 0..=width - SSIM_WINDOW {
            let ux = sum_a.window(x, y) / np;
            let uy = sum_b.window(x, y) / np;
            let vx = cov_norm * (sum_aa.window(x, y) / np - ux * ux);
            let vy = cov_norm * (sum_bb.window(x, y) / np - uy * uy);
            let vxy = cov_norm * (sum_ab.window(x, y) / np - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    Ok(total / count as f64)
}

/// SSIM comparator over decoded raster files
#[derive(Debug, Clone, Copy, Default)]
pub struct SsimComparator;

impl SsimComparator {
    /// Create a comparator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode by content; fetched renders live in extensionless temp files
    fn decode(path: &Path) -> image::ImageResult<image::DynamicImage> {
        image::ImageReader::open(path)?.with_guessed_format()?.decode()
    }

    fn load(path: &Path) -> Option<GrayImage> {
        match Self::decode(path) {
            Ok(image) => Some(to_grayscale(&image)),
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot decode image: {}", e);
                None
            }
        }
    }
}

impl ImageComparator for SsimComparator {
    fn compare(&self, reference: &Path, candidate: &Path) -> f64 {
        let (Some(reference), Some(candidate)) = (Self::load(reference), Self::load(candidate))
        else {
            return SIMILARITY_UNAVAILABLE;
        };

        match mean_ssim(&reference, &candidate) {
            Ok(ssim) => (ssim * 100.0).clamp(0.0, 100.0),
            Err(e) => {
                tracing::warn!("cannot compare: {}", e);
                SIMILARITY_UNAVAILABLE
            }
        }
    }
}
