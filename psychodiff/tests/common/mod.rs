//! Common test utilities for psychodiff tests.
//!
//! Deterministic synthetic images from an LCG PRNG, so every platform sees
//! identical inputs, plus a logger hook.

#![allow(dead_code)]

use psychodiff::{Img, ImgVec, RGB, RGB8};

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// LCG PRNG
// ============================================================================

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u8(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFF) as u8
    }

    /// Uniform in `[0, 1]`.
    pub fn next_unit(&mut self) -> f32 {
        f32::from(self.next_u8()) / 255.0
    }
}

// ============================================================================
// Image generation
// ============================================================================

/// Linear RGB image with every channel set to `v`.
pub fn gray(width: usize, height: usize, v: f32) -> ImgVec<RGB<f32>> {
    Img::new(vec![RGB::new(v, v, v); width * height], width, height)
}

/// Linear RGB noise, independent per channel.
pub fn noise(width: usize, height: usize, seed: u64) -> ImgVec<RGB<f32>> {
    let mut rng = Lcg::new(seed);
    let pixels = (0..width * height)
        .map(|_| RGB::new(rng.next_unit(), rng.next_unit(), rng.next_unit()))
        .collect();
    Img::new(pixels, width, height)
}

/// sRGB image with every pixel set to `(r, g, b)`.
pub fn uniform_srgb(width: usize, height: usize, r: u8, g: u8, b: u8) -> ImgVec<RGB8> {
    Img::new(vec![RGB8::new(r, g, b); width * height], width, height)
}

/// sRGB checkerboard with square blocks.
pub fn checkerboard_srgb(width: usize, height: usize, block: usize, lo: u8, hi: u8) -> ImgVec<RGB8> {
    let pixels = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                let v = if ((x / block) + (y / block)) % 2 == 0 { hi } else { lo };
                RGB8::new(v, v, v)
            })
        })
        .collect();
    Img::new(pixels, width, height)
}

/// Copy of `img` with `(x, y)` brightened by `delta` on every channel.
pub fn with_bump(img: &ImgVec<RGB<f32>>, x: usize, y: usize, delta: f32) -> ImgVec<RGB<f32>> {
    let mut out = img.clone();
    let width = out.width();
    let px = &mut out.buf_mut()[y * width + x];
    *px = RGB::new(px.r + delta, px.g + delta, px.b + delta);
    out
}

/// Adds `amount * (u - 0.5)` noise to every channel, clamped to `[0, 1]`.
pub fn perturb(img: &ImgVec<RGB<f32>>, amount: f32, seed: u64) -> ImgVec<RGB<f32>> {
    let mut rng = Lcg::new(seed);
    let mut out = img.clone();
    for px in out.buf_mut().iter_mut() {
        let mut jitter = |v: f32| (v + amount * (rng.next_unit() - 0.5)).clamp(0.0, 1.0);
        *px = RGB::new(jitter(px.r), jitter(px.g), jitter(px.b));
    }
    out
}

/// Chebyshev distance between two pixel positions.
pub fn chebyshev(a: (usize, usize), b: (usize, usize)) -> usize {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1))
}
