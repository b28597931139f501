//! Float image grids used by every pipeline stage.
//!
//! Rows are padded to a multiple of 16 floats so that SIMD loads of a full
//! row never straddle into the next one.

use imgref::{ImgRef, ImgVec};
use rgb::{RGB, RGB8};

#[inline]
fn aligned_stride(width: usize) -> usize {
    (width + 15) & !15
}

/// Single-channel floating point image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageF {
    data: Vec<f32>,
    width: usize,
    height: usize,
    stride: usize,
}

impl ImageF {
    /// Creates a new image filled with zeros.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Creates an image filled with a constant value.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        let stride = aligned_stride(width);
        Self {
            data: vec![value; stride * height],
            width,
            height,
            stride,
        }
    }

    /// Builds an image from a producer called once per pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut out = Self::new(width, height);
        for y in 0..height {
            for (x, v) in out.row_mut(y).iter_mut().enumerate() {
                *v = f(x, y);
            }
        }
        out
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Floats per row, including padding.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.stride + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.stride + x] = value;
    }

    /// Raw storage, `stride * height` floats.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Applies `f` to every pixel in place.
    pub fn map_inplace(&mut self, f: impl Fn(f32) -> f32) {
        for y in 0..self.height {
            for v in self.row_mut(y) {
                *v = f(*v);
            }
        }
    }

    /// Largest pixel value, or 0 for an empty image.
    #[must_use]
    pub fn max_value(&self) -> f32 {
        (0..self.height)
            .flat_map(|y| self.row(y).iter().copied())
            .fold(0.0f32, f32::max)
    }

    /// Converts into a tightly packed `ImgVec`.
    #[must_use]
    pub fn into_imgvec(self) -> ImgVec<f32> {
        if self.stride == self.width {
            return ImgVec::new(self.data, self.width, self.height);
        }
        let mut packed = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        ImgVec::new(packed, self.width, self.height)
    }

    /// Copies a window `width x height` starting at `(x0, y0)`.
    #[must_use]
    pub fn crop(&self, x0: usize, y0: usize, width: usize, height: usize) -> Self {
        let mut out = Self::new(width, height);
        for y in 0..height {
            out.row_mut(y)
                .copy_from_slice(&self.row(y0 + y)[x0..x0 + width]);
        }
        out
    }
}

/// Three planes of identical size (linear RGB, XYB, or per-channel
/// accumulators).
#[derive(Debug, Clone, PartialEq)]
pub struct Image3F {
    planes: [ImageF; 3],
}

impl Image3F {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            planes: [
                ImageF::new(width, height),
                ImageF::new(width, height),
                ImageF::new(width, height),
            ],
        }
    }

    /// # Panics
    /// Panics if the planes differ in size.
    #[must_use]
    pub fn from_planes(planes: [ImageF; 3]) -> Self {
        assert!(planes[0].same_size(&planes[1]));
        assert!(planes[0].same_size(&planes[2]));
        Self { planes }
    }

    /// Splits linear RGB pixels into three planes.
    #[must_use]
    pub fn from_linear_rgb(img: ImgRef<'_, RGB<f32>>) -> Self {
        let mut out = Self::new(img.width(), img.height());
        for (y, row) in img.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                out.planes[0].set(x, y, px.r);
                out.planes[1].set(x, y, px.g);
                out.planes[2].set(x, y, px.b);
            }
        }
        out
    }

    /// Splits sRGB pixels into three linear-light planes.
    #[must_use]
    pub fn from_srgb(img: ImgRef<'_, RGB8>) -> Self {
        let mut out = Self::new(img.width(), img.height());
        for (y, row) in img.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                out.planes[0].set(x, y, srgb_to_linear(px.r));
                out.planes[1].set(x, y, srgb_to_linear(px.g));
                out.planes[2].set(x, y, srgb_to_linear(px.b));
            }
        }
        out
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.planes[0].width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.planes[0].height()
    }

    #[inline]
    #[must_use]
    pub fn plane(&self, c: usize) -> &ImageF {
        &self.planes[c]
    }

    #[inline]
    pub fn plane_mut(&mut self, c: usize) -> &mut ImageF {
        &mut self.planes[c]
    }

    /// Mutable access to all three planes at once.
    #[inline]
    pub fn planes_mut(&mut self) -> &mut [ImageF; 3] {
        &mut self.planes
    }
}

static SRGB_TO_LINEAR_LUT: std::sync::LazyLock<[f32; 256]> = std::sync::LazyLock::new(|| {
    let mut lut = [0.0f32; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let v = i as f64 / 255.0;
        let linear = if v <= 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        };
        *entry = linear as f32;
    }
    lut
});

/// Converts an sRGB-encoded byte to linear light in `[0, 1]`.
#[inline]
#[must_use]
pub fn srgb_to_linear(v: u8) -> f32 {
    SRGB_TO_LINEAR_LUT[v as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::Img;

    #[test]
    fn test_image_creation() {
        let img = ImageF::new(100, 50);
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
        assert_eq!(img.stride() % 16, 0);
        assert!(img.stride() >= 100);
    }

    #[test]
    fn test_pixel_and_row_access() {
        let mut img = ImageF::new(10, 10);
        img.set(5, 3, 42.0);
        img.row_mut(7)[2] = 99.0;
        assert_eq!(img.get(5, 3), 42.0);
        assert_eq!(img.get(2, 7), 99.0);
        assert_eq!(img.row(7).len(), 10);
    }

    #[test]
    fn test_into_imgvec_drops_padding() {
        let img = ImageF::from_fn(5, 3, |x, y| (y * 5 + x) as f32);
        let packed = img.into_imgvec();
        assert_eq!(packed.width(), 5);
        assert_eq!(packed.height(), 3);
        let values: Vec<f32> = packed.pixels().collect();
        let expected: Vec<f32> = (0..15).map(|i| i as f32).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_crop() {
        let img = ImageF::from_fn(8, 8, |x, y| (x + 10 * y) as f32);
        let c = img.crop(2, 3, 3, 2);
        assert_eq!(c.row(0), &[32.0, 33.0, 34.0]);
        assert_eq!(c.row(1), &[42.0, 43.0, 44.0]);
    }

    #[test]
    fn test_max_value() {
        let mut img = ImageF::new(4, 4);
        assert_eq!(img.max_value(), 0.0);
        img.set(3, 1, 2.5);
        assert_eq!(img.max_value(), 2.5);
    }

    #[test]
    fn test_from_linear_rgb_splits_channels() {
        let px = vec![RGB::new(0.1f32, 0.2, 0.3); 6];
        let img = Image3F::from_linear_rgb(Img::new(px, 3, 2).as_ref());
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert_eq!(img.plane(0).get(2, 1), 0.1);
        assert_eq!(img.plane(1).get(0, 0), 0.2);
        assert_eq!(img.plane(2).get(1, 1), 0.3);
    }

    #[test]
    fn test_srgb_to_linear_endpoints() {
        assert_eq!(srgb_to_linear(0), 0.0);
        assert!((srgb_to_linear(255) - 1.0).abs() < 1e-6);
        assert!((srgb_to_linear(128) - 0.2158605).abs() < 1e-4);
        for i in 1..=255u8 {
            assert!(srgb_to_linear(i) > srgb_to_linear(i - 1));
        }
    }
}
