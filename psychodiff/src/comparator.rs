//! Reusable comparison against a fixed reference.

use imgref::{ImgRef, ImgVec};
use rgb::{RGB, RGB8};

use crate::consts::{MIN_SIZE, SUPERSAMPLE_WEIGHT};
use crate::diff::{psycho_diffmap, BandWeights};
use crate::image::{Image3F, ImageF};
use crate::mask::mask_psycho_image;
use crate::opsin::opsin_dynamics_image;
use crate::psycho::{separate_frequencies, PsychoImage};
use crate::resample::{add_supersampled_2x, subsample_2x};
use crate::scratch::ScratchImage;
use crate::{score_from_diffmap, DiffError, DiffParams, DiffResult};

/// Placement of a below-minimum image inside its padded working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Padding {
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
}

impl Padding {
    fn for_size(width: usize, height: usize) -> Option<Self> {
        if width >= MIN_SIZE && height >= MIN_SIZE {
            return None;
        }
        let padded_w = width.max(MIN_SIZE);
        let padded_h = height.max(MIN_SIZE);
        Some(Self {
            x0: (padded_w - width) / 2,
            y0: (padded_h - height) / 2,
            width,
            height,
        })
    }

    /// Replicates edge pixels of `image` out to the padded size.
    fn apply(&self, image: &Image3F) -> Image3F {
        let padded_w = self.width.max(MIN_SIZE);
        let padded_h = self.height.max(MIN_SIZE);
        let source = |p: usize, offset: usize, size: usize| {
            let shifted = if p > offset { p - offset } else { 0 };
            shifted.min(size - 1)
        };
        let planes = std::array::from_fn(|c| {
            let plane = image.plane(c);
            ImageF::from_fn(padded_w, padded_h, |x, y| {
                plane.get(
                    source(x, self.x0, self.width),
                    source(y, self.y0, self.height),
                )
            })
        });
        Image3F::from_planes(planes)
    }

    fn crop(&self, map: &ImageF) -> ImageF {
        map.crop(self.x0, self.y0, self.width, self.height)
    }
}

/// Precomputed reference for repeated comparisons.
///
/// Building a comparator runs the color adapter and frequency split on the
/// reference once; each [`Comparator::compare`] then only processes the
/// distorted image. A comparator is immutable after construction and can be
/// shared across threads; overlapping calls on the same instance give all
/// but one of them a temporary scratch grid.
///
/// ```rust
/// use psychodiff::{Comparator, DiffParams, Img, RGB};
///
/// let gray = Img::new(vec![RGB::new(0.2f32, 0.2, 0.2); 32 * 32], 32, 32);
/// let comparator = Comparator::new(gray.as_ref(), &DiffParams::default())?;
///
/// let mut brighter = gray.clone();
/// brighter.buf_mut()[16 * 32 + 16] = RGB::new(0.25, 0.25, 0.25);
/// let result = comparator.compare(brighter.as_ref())?;
/// assert!(result.score > 0.0);
/// # Ok::<(), psychodiff::DiffError>(())
/// ```
#[derive(Debug)]
pub struct Comparator {
    params: DiffParams,
    width: usize,
    height: usize,
    padding: Option<Padding>,
    reference: PsychoImage,
    scratch: ScratchImage,
    sub: Option<Box<Comparator>>,
}

impl Comparator {
    /// Prepares `reference` (linear RGB) for comparison.
    ///
    /// # Errors
    /// [`DiffError::InvalidParams`] for non-finite or non-positive parameters,
    /// [`DiffError::EmptyImage`] if either dimension is zero.
    pub fn new(reference: ImgRef<'_, RGB<f32>>, params: &DiffParams) -> Result<Self, DiffError> {
        params.validate()?;
        check_not_empty(reference.width(), reference.height())?;
        Ok(Self::from_linear(Image3F::from_linear_rgb(reference), params))
    }

    /// Prepares an 8-bit sRGB `reference`.
    ///
    /// # Errors
    /// Same as [`Comparator::new`].
    pub fn new_srgb(reference: ImgRef<'_, RGB8>, params: &DiffParams) -> Result<Self, DiffError> {
        params.validate()?;
        check_not_empty(reference.width(), reference.height())?;
        Ok(Self::from_linear(Image3F::from_srgb(reference), params))
    }

    fn from_linear(rgb: Image3F, params: &DiffParams) -> Self {
        let (width, height) = (rgb.width(), rgb.height());
        let padding = Padding::for_size(width, height);
        let working = match &padding {
            Some(padding) => padding.apply(&rgb),
            None => rgb,
        };
        let comparator = Self::build_level(working, params, true);
        log::debug!(
            "comparator {}x{} (working {}x{}), {} level(s)",
            width,
            height,
            comparator.width,
            comparator.height,
            comparator.levels()
        );
        Self {
            width,
            height,
            padding,
            ..comparator
        }
    }

    /// Builds one resolution level over an image of at least `MIN_SIZE`.
    fn build_level(rgb: Image3F, params: &DiffParams, descend: bool) -> Self {
        let (width, height) = (rgb.width(), rgb.height());
        let scratch = ScratchImage::new(width, height);
        let reference = {
            let mut blurred = scratch.checkout();
            separate_frequencies(&opsin_dynamics_image(
                &rgb,
                params.intensity_target(),
                &mut blurred,
            ))
        };

        let child_fits = width.div_ceil(2) >= MIN_SIZE && height.div_ceil(2) >= MIN_SIZE;
        let sub = (descend && child_fits).then(|| {
            Box::new(Self::build_level(
                subsample_2x(&rgb),
                params,
                params.recursive_blend(),
            ))
        });

        Self {
            params: params.clone(),
            width,
            height,
            padding: None,
            reference,
            scratch,
            sub,
        }
    }

    /// Number of resolution levels, this one included.
    fn levels(&self) -> usize {
        1 + self.sub.as_ref().map_or(0, |sub| sub.levels())
    }

    /// Compares a linear RGB image against the reference.
    ///
    /// # Errors
    /// [`DiffError::DimensionMismatch`] if `distorted` differs in size from the
    /// reference.
    pub fn compare(&self, distorted: ImgRef<'_, RGB<f32>>) -> Result<DiffResult, DiffError> {
        self.check_size(distorted.width(), distorted.height())?;
        Ok(self.compare_linear(Image3F::from_linear_rgb(distorted)))
    }

    /// Compares an 8-bit sRGB image against the reference.
    ///
    /// # Errors
    /// Same as [`Comparator::compare`].
    pub fn compare_srgb(&self, distorted: ImgRef<'_, RGB8>) -> Result<DiffResult, DiffError> {
        self.check_size(distorted.width(), distorted.height())?;
        Ok(self.compare_linear(Image3F::from_srgb(distorted)))
    }

    /// Masking field of the reference, same size as the reference.
    ///
    /// Large values mark busy areas where errors are harder to see.
    #[must_use]
    pub fn mask(&self) -> ImgVec<f32> {
        let mask = mask_psycho_image(&self.reference, &self.reference, None);
        self.crop_to_reference(mask).into_imgvec()
    }

    /// Reference width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Reference height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn params(&self) -> &DiffParams {
        &self.params
    }

    fn check_size(&self, width: usize, height: usize) -> Result<(), DiffError> {
        if width != self.width || height != self.height {
            return Err(DiffError::DimensionMismatch {
                w1: self.width,
                h1: self.height,
                w2: width,
                h2: height,
            });
        }
        Ok(())
    }

    fn compare_linear(&self, rgb: Image3F) -> DiffResult {
        let working = match &self.padding {
            Some(padding) => padding.apply(&rgb),
            None => rgb,
        };
        let map = self.crop_to_reference(self.blended_diffmap(&working)).into_imgvec();
        DiffResult {
            score: score_from_diffmap(map.as_ref()),
            diffmap: map,
        }
    }

    fn crop_to_reference(&self, map: ImageF) -> ImageF {
        match &self.padding {
            Some(padding) => padding.crop(&map),
            None => map,
        }
    }

    /// Diffmap at this level with the coarser levels blended in.
    fn blended_diffmap(&self, rgb: &Image3F) -> ImageF {
        let mut map = self.level_diffmap(rgb);
        if let Some(sub) = &self.sub {
            let sub_rgb = subsample_2x(rgb);
            let sub_map = if self.params.recursive_blend() {
                sub.blended_diffmap(&sub_rgb)
            } else {
                sub.level_diffmap(&sub_rgb)
            };
            add_supersampled_2x(&sub_map, SUPERSAMPLE_WEIGHT, &mut map);
        }
        map
    }

    /// Diffmap at this level alone.
    fn level_diffmap(&self, rgb: &Image3F) -> ImageF {
        let xyb = {
            let mut blurred = self.scratch.checkout();
            opsin_dynamics_image(rgb, self.params.intensity_target(), &mut blurred)
        };
        let distorted = separate_frequencies(&xyb);
        let map = psycho_diffmap(
            &self.reference,
            &distorted,
            BandWeights {
                hf_asymmetry: f64::from(self.params.hf_asymmetry()),
                xmul: self.params.xmul(),
            },
        );
        log::trace!(
            "level {}x{}: max {}",
            self.width,
            self.height,
            map.max_value()
        );
        map
    }
}

fn check_not_empty(width: usize, height: usize) -> Result<(), DiffError> {
    if width == 0 || height == 0 {
        return Err(DiffError::EmptyImage { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::Img;

    fn gray(width: usize, height: usize, v: f32) -> ImgVec<RGB<f32>> {
        Img::new(vec![RGB::new(v, v, v); width * height], width, height)
    }

    #[test]
    fn test_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Comparator>();
    }

    #[test]
    fn test_padding_window() {
        assert_eq!(Padding::for_size(8, 30), None);
        let p = Padding::for_size(3, 12).expect("3 wide needs padding");
        assert_eq!((p.x0, p.y0), (2, 0));
        let p = Padding::for_size(5, 1).expect("needs padding");
        assert_eq!((p.x0, p.y0), (1, 3));
    }

    #[test]
    fn test_padding_replicates_edges() {
        let src = ImageF::from_fn(3, 3, |x, y| (x + 10 * y) as f32);
        let rgb = Image3F::from_planes([src.clone(), src.clone(), src.clone()]);
        let padding = Padding::for_size(3, 3).expect("needs padding");
        let padded = padding.apply(&rgb);
        assert_eq!((padded.width(), padded.height()), (8, 8));
        // The source image occupies rows and columns 2..5; the rest repeats
        // the nearest edge.
        assert_eq!(padded.plane(0).get(0, 0), 0.0);
        assert_eq!(padded.plane(0).get(7, 7), 22.0);
        assert_eq!(padded.plane(1).get(4, 4), 22.0);
        assert_eq!(padded.plane(2).get(3, 0), 1.0);
        assert_eq!(padding.crop(padded.plane(0)).width(), 3);
    }

    #[test]
    fn test_child_levels() {
        let params = DiffParams::default();
        assert_eq!(Comparator::new(gray(14, 14, 0.3).as_ref(), &params).map(|c| c.levels()), Ok(1));
        assert_eq!(Comparator::new(gray(15, 15, 0.3).as_ref(), &params).map(|c| c.levels()), Ok(2));
        assert_eq!(Comparator::new(gray(16, 40, 0.3).as_ref(), &params).map(|c| c.levels()), Ok(2));
        // Without recursion only one child is built, however large the image.
        assert_eq!(Comparator::new(gray(64, 64, 0.3).as_ref(), &params).map(|c| c.levels()), Ok(2));
        let recursive = params.with_recursive_blend(true);
        assert_eq!(Comparator::new(gray(64, 64, 0.3).as_ref(), &recursive).map(|c| c.levels()), Ok(4));
    }

    #[test]
    fn test_small_reference_keeps_caller_size() {
        let comparator = Comparator::new(gray(3, 5, 0.4).as_ref(), &DiffParams::default())
            .expect("valid reference");
        assert_eq!((comparator.width(), comparator.height()), (3, 5));
        let mask = comparator.mask();
        assert_eq!((mask.width(), mask.height()), (3, 5));
        let result = comparator.compare(gray(3, 5, 0.4).as_ref()).expect("same size");
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_mismatch_reports_both_sizes() {
        let comparator =
            Comparator::new(gray(16, 16, 0.4).as_ref(), &DiffParams::default()).expect("valid");
        assert_eq!(
            comparator.compare(gray(17, 16, 0.4).as_ref()).map(|r| r.score),
            Err(DiffError::DimensionMismatch { w1: 16, h1: 16, w2: 17, h2: 16 })
        );
    }

    #[test]
    fn test_empty_reference_is_rejected() {
        let empty: ImgVec<RGB<f32>> = Img::new_stride(Vec::new(), 0, 5, 1);
        assert_eq!(
            Comparator::new(empty.as_ref(), &DiffParams::default()).map(|c| c.width()),
            Err(DiffError::EmptyImage { width: 0, height: 5 })
        );
    }
}
