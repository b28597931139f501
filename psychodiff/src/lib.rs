//! # psychodiff
//!
//! Perceptual distance between two images in the butteraugli family.
//!
//! The metric models:
//! - Opsin: photoreceptor response with local adaptation
//! - XYB: a hybrid opponent/trichromatic color space
//! - Frequency bands: UHF, HF, MF and LF components compared separately
//! - Visual masking: busy texture hides errors next to it
//! - Multi-resolution: a half-resolution pass blended into the result
//!
//! The output is a per-pixel difference map and a scalar score, the map's
//! maximum.
//!
//! ## Quality Thresholds
//!
//! - Score < [`GOOD`]: images are perceived as identical
//! - Score between [`GOOD`] and [`BAD`]: subtle differences may be noticeable
//! - Score > [`BAD`]: visible difference
//!
//! ## Example
//!
//! ```rust
//! use psychodiff::{compare_srgb, DiffParams, Img, RGB8};
//!
//! // A horizontal ramp, and the same ramp with one column brightened.
//! let (width, height) = (24, 16);
//! let ramp: Vec<RGB8> = (0..width * height)
//!     .map(|i| {
//!         let v = (i % width * 10) as u8;
//!         RGB8::new(v, v, v)
//!     })
//!     .collect();
//! let mut edited = ramp.clone();
//! for y in 0..height {
//!     edited[y * width + 12].g += 30;
//! }
//!
//! let reference = Img::new(ramp, width, height);
//! let distorted = Img::new(edited, width, height);
//! let result = compare_srgb(reference.as_ref(), distorted.as_ref(), &DiffParams::default())?;
//! assert!(result.score > 0.0);
//! assert_eq!(result.diffmap.width(), width);
//! # Ok::<(), psychodiff::DiffError>(())
//! ```
//!
//! For many comparisons against the same reference, build a [`Comparator`]
//! once and reuse it.
//!
//! ## Features
//!
//! - **`rayon`**: process image rows in parallel
//! - **`internals`**: expose pipeline modules for testing/benchmarking (unstable API)

#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Tuned constants keep their full published precision.
#![allow(clippy::unreadable_literal)]
#![allow(clippy::excessive_precision)]
// Explicit mul/add keeps rounding identical across targets.
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::float_cmp)]

/// Declares pipeline modules that are public only with the `internals`
/// feature.
macro_rules! pipeline_modules {
    ($($name:ident),* $(,)?) => {
        $(
            #[cfg(feature = "internals")]
            pub mod $name;
            #[cfg(not(feature = "internals"))]
            pub(crate) mod $name;
        )*
    };
}

pipeline_modules!(blur, combine, consts, image, malta, mask, opsin, psycho, resample);

mod comparator;
mod diff;
mod parallel;
mod scratch;

pub use comparator::Comparator;
pub use image::srgb_to_linear;

// Re-export imgref and rgb types for convenience
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::{RGB, RGB8};

use consts::{FUZZY_M0, FUZZY_SCALER, FUZZY_WIDTH};

/// Errors returned by comparisons.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum DiffError {
    /// Reference and distorted images differ in size.
    #[error("image dimensions don't match: {w1}x{h1} vs {w2}x{h2}")]
    DimensionMismatch {
        /// Reference width.
        w1: usize,
        /// Reference height.
        h1: usize,
        /// Distorted width.
        w2: usize,
        /// Distorted height.
        h2: usize,
    },
    /// An image has no pixels.
    #[error("empty image: {width}x{height}")]
    EmptyImage {
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },
    /// A parameter is not finite and positive.
    #[error("invalid parameter {name} = {value}: must be finite and positive")]
    InvalidParams {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f32,
    },
}

/// Comparison parameters.
///
/// Use the builder pattern to construct:
/// ```rust
/// use psychodiff::DiffParams;
///
/// let params = DiffParams::new()
///     .with_intensity_target(250.0)  // HDR display
///     .with_hf_asymmetry(1.5)        // Penalize new artifacts more
///     .with_recursive_blend(true);   // Blend every coarser level
/// assert_eq!(params.hf_asymmetry(), 1.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DiffParams {
    hf_asymmetry: f32,
    xmul: f32,
    intensity_target: f32,
    recursive_blend: bool,
}

impl Default for DiffParams {
    fn default() -> Self {
        Self {
            hf_asymmetry: 1.0,
            xmul: 1.0,
            intensity_target: 80.0,
            recursive_blend: false,
        }
    }
}

impl DiffParams {
    /// Creates parameters with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the intensity target (display brightness in nits).
    #[must_use]
    pub fn with_intensity_target(mut self, intensity_target: f32) -> Self {
        self.intensity_target = intensity_target;
        self
    }

    /// Sets the HF asymmetry multiplier.
    /// Values > 1.0 penalize new high-frequency artifacts more than blurring.
    #[must_use]
    pub fn with_hf_asymmetry(mut self, hf_asymmetry: f32) -> Self {
        self.hf_asymmetry = hf_asymmetry;
        self
    }

    /// Sets the X channel multiplier.
    #[must_use]
    pub fn with_xmul(mut self, xmul: f32) -> Self {
        self.xmul = xmul;
        self
    }

    /// Sets whether every coarser level is blended in, rather than only the
    /// half-resolution one.
    #[must_use]
    pub fn with_recursive_blend(mut self, recursive_blend: bool) -> Self {
        self.recursive_blend = recursive_blend;
        self
    }

    /// Returns the HF asymmetry multiplier.
    #[must_use]
    pub fn hf_asymmetry(&self) -> f32 {
        self.hf_asymmetry
    }

    /// Returns the X channel multiplier.
    #[must_use]
    pub fn xmul(&self) -> f32 {
        self.xmul
    }

    /// Returns the intensity target in nits.
    #[must_use]
    pub fn intensity_target(&self) -> f32 {
        self.intensity_target
    }

    /// Returns whether every coarser level is blended in.
    #[must_use]
    pub fn recursive_blend(&self) -> bool {
        self.recursive_blend
    }

    pub(crate) fn validate(&self) -> Result<(), DiffError> {
        for (name, value) in [
            ("hf_asymmetry", self.hf_asymmetry),
            ("xmul", self.xmul),
            ("intensity_target", self.intensity_target),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DiffError::InvalidParams { name, value });
            }
        }
        Ok(())
    }
}

/// Score threshold for "good" (images look the same).
pub const GOOD: f64 = 1.0;

/// Score threshold for "bad" (visible difference).
pub const BAD: f64 = 2.0;

/// Comparison result.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Global difference score, the maximum of `diffmap`.
    pub score: f64,
    /// Per-pixel difference map, same size as the inputs.
    pub diffmap: ImgVec<f32>,
}

/// Compares two linear RGB images.
///
/// Values are nominally in 0.0-1.0; `intensity_target` maps 1.0 to nits.
///
/// # Errors
/// - [`DiffError::DimensionMismatch`] if the sizes differ
/// - [`DiffError::EmptyImage`] if either dimension is zero
/// - [`DiffError::InvalidParams`] for a non-finite or non-positive parameter
///
/// Images smaller than 8x8 are padded internally and are not an error.
pub fn compare(
    reference: ImgRef<RGB<f32>>,
    distorted: ImgRef<RGB<f32>>,
    params: &DiffParams,
) -> Result<DiffResult, DiffError> {
    check_same_size(reference.width(), reference.height(), distorted.width(), distorted.height())?;
    Comparator::new(reference, params)?.compare(distorted)
}

/// Compares two 8-bit sRGB images.
///
/// # Errors
/// Same as [`compare`].
///
/// # Example
/// ```rust
/// use psychodiff::{compare_srgb, DiffParams, Img, RGB8};
///
/// let img = Img::new(vec![RGB8::new(128, 128, 128); 16 * 16], 16, 16);
/// let result = compare_srgb(img.as_ref(), img.as_ref(), &DiffParams::default())?;
/// assert_eq!(result.score, 0.0);
/// # Ok::<(), psychodiff::DiffError>(())
/// ```
pub fn compare_srgb(
    reference: ImgRef<RGB8>,
    distorted: ImgRef<RGB8>,
    params: &DiffParams,
) -> Result<DiffResult, DiffError> {
    check_same_size(reference.width(), reference.height(), distorted.width(), distorted.height())?;
    Comparator::new_srgb(reference, params)?.compare_srgb(distorted)
}

fn check_same_size(w1: usize, h1: usize, w2: usize, h2: usize) -> Result<(), DiffError> {
    if w1 != w2 || h1 != h2 {
        return Err(DiffError::DimensionMismatch { w1, h1, w2, h2 });
    }
    Ok(())
}

/// Maximum of a difference map, 0 for an empty map.
#[must_use]
pub fn score_from_diffmap(diffmap: ImgRef<f32>) -> f64 {
    diffmap
        .pixels()
        .fold(0.0f32, f32::max)
        .into()
}

/// `(mean(v^p))^(1/p)` over a difference map, 0 for an empty map.
///
/// Larger `p` approaches [`score_from_diffmap`]; smaller `p` rewards maps
/// whose error is concentrated in few pixels. `p` should be positive.
#[must_use]
pub fn pnorm_from_diffmap(diffmap: ImgRef<f32>, p: f64) -> f64 {
    let count = diffmap.width() * diffmap.height();
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = diffmap.pixels().map(|v| f64::from(v).powf(p)).sum();
    (sum / count as f64).powf(1.0 / p)
}

/// Maps a score to a soft class in `[0, 2]`: 2 is "identical", 0 is "bad".
///
/// Monotone decreasing, with `fuzzy_class(1.0) == 0.7777`.
#[must_use]
pub fn fuzzy_class(score: f64) -> f64 {
    let val = FUZZY_M0 / (1.0 + ((score - 1.0) * FUZZY_WIDTH).exp());
    if score < 1.0 {
        // [1, 2] onto [scaler, 2]
        (val - 1.0) * (2.0 - FUZZY_SCALER) + FUZZY_SCALER
    } else {
        val * FUZZY_SCALER
    }
}

/// Score at which [`fuzzy_class`] reaches `seek`, by bisection.
///
/// Results lie in `(-2, 2)`.
#[must_use]
pub fn fuzzy_inverse(seek: f64) -> f64 {
    let mut pos = 0.0;
    let mut range = 1.0;
    while range >= 1e-10 {
        if fuzzy_class(pos) < seek {
            pos -= range;
        } else {
            pos += range;
        }
        range *= 0.5;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(width: usize, height: usize) -> ImgVec<RGB8> {
        let pixels = (0..width * height)
            .map(|i| RGB8::new((i % 256) as u8, ((i * 2) % 256) as u8, ((i * 3) % 256) as u8))
            .collect();
        Img::new(pixels, width, height)
    }

    #[test]
    fn test_identical_images() {
        let img = pattern(16, 16);
        let result = compare_srgb(img.as_ref(), img.as_ref(), &DiffParams::default())
            .expect("valid input");
        assert!(result.score < 0.001, "got {}", result.score);
    }

    #[test]
    fn test_different_images() {
        let black = Img::new(vec![RGB8::new(0, 0, 0); 16 * 16], 16, 16);
        let white = Img::new(vec![RGB8::new(255, 255, 255); 16 * 16], 16, 16);
        let result = compare_srgb(black.as_ref(), white.as_ref(), &DiffParams::default())
            .expect("valid input");
        assert!(result.score > 1.0, "got {}", result.score);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = compare_srgb(pattern(16, 16).as_ref(), pattern(8, 8).as_ref(), &DiffParams::default());
        assert!(matches!(result, Err(DiffError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_small_images_are_padded_not_rejected() {
        let img = pattern(4, 4);
        let result = compare_srgb(img.as_ref(), img.as_ref(), &DiffParams::default())
            .expect("small images are valid");
        assert_eq!((result.diffmap.width(), result.diffmap.height()), (4, 4));
    }

    #[test]
    fn test_invalid_params() {
        let img = pattern(8, 8);
        for (params, name) in [
            (DiffParams::new().with_hf_asymmetry(0.0), "hf_asymmetry"),
            (DiffParams::new().with_xmul(f32::NAN), "xmul"),
            (DiffParams::new().with_intensity_target(-80.0), "intensity_target"),
        ] {
            match compare_srgb(img.as_ref(), img.as_ref(), &params) {
                Err(DiffError::InvalidParams { name: got, .. }) => assert_eq!(got, name),
                other => panic!("expected InvalidParams for {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_error_display() {
        let err = DiffError::DimensionMismatch { w1: 16, h1: 16, w2: 17, h2: 16 };
        assert_eq!(err.to_string(), "image dimensions don't match: 16x16 vs 17x16");
    }

    #[test]
    fn test_score_and_pnorm() {
        let map = Img::new(vec![0.0f32, 1.0, 2.0, 3.0], 2, 2);
        assert_eq!(score_from_diffmap(map.as_ref()), 3.0);
        let p1 = pnorm_from_diffmap(map.as_ref(), 1.0);
        assert!((p1 - 1.5).abs() < 1e-12);
        let p8 = pnorm_from_diffmap(map.as_ref(), 8.0);
        assert!(p8 > p1 && p8 < 3.0);

        let empty: ImgVec<f32> = Img::new(Vec::new(), 5, 0);
        assert_eq!(score_from_diffmap(empty.as_ref()), 0.0);
        assert_eq!(pnorm_from_diffmap(empty.as_ref(), 3.0), 0.0);
    }

    #[test]
    fn test_fuzzy_class_anchors() {
        assert!((fuzzy_class(1.0) - FUZZY_SCALER).abs() < 1e-12);
        assert!(fuzzy_class(-10.0) > 1.99);
        assert!(fuzzy_class(10.0) < 1e-10);
    }

    #[test]
    fn test_fuzzy_inverse_round_trip() {
        for s in [0.0, 0.5, 1.0, 1.3, 1.9] {
            let back = fuzzy_inverse(fuzzy_class(s));
            assert!((back - s).abs() < 1e-6, "{s} -> {back}");
        }
    }
}
