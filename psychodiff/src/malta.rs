//! Malta structural comparator.
//!
//! The difference between two bands is first turned into a signed, scaled
//! "diffs" buffer. Each pixel then gets the energy of 16 short lines through
//! it: every line's taps are summed, the sum is squared, and the squares are
//! added. Oriented disagreement several pixels long produces large sums,
//! isolated noise mostly cancels.
//!
//! Two kernels exist:
//! - [`Fine`]: lines of 9 (axis and shallow) or 7 (diagonal) adjacent taps,
//!   used for the ultra-high band;
//! - [`Coarse`]: lines of 5 sparse taps reaching the same 9x9 footprint,
//!   used for the high and mid bands.

use crate::consts::{
    MALTA_LEN, MALTA_MULLI_COARSE, MALTA_MULLI_FINE, MALTA_TOO_BIG, MALTA_TOO_SMALL,
    MALTA_WEIGHT_GT, MALTA_WEIGHT_LT,
};
use crate::image::ImageF;
use crate::parallel::for_each_row;

/// Kernel footprint radius.
const RADIUS: usize = 4;
/// Side of the zero-padded window used near borders.
const WINDOW: usize = 2 * RADIUS + 1;

/// One directional line as `(dx, dy)` taps around the center.
pub type Line = &'static [(i8, i8)];

#[rustfmt::skip]
const FINE_LINES: [Line; 16] = [
    &[(-4, 0), (-3, 0), (-2, 0), (-1, 0), (0, 0), (1, 0), (2, 0), (3, 0), (4, 0)],
    &[(0, -4), (0, -3), (0, -2), (0, -1), (0, 0), (0, 1), (0, 2), (0, 3), (0, 4)],
    &[(-3, -3), (-2, -2), (-1, -1), (0, 0), (1, 1), (2, 2), (3, 3)],
    &[(3, -3), (2, -2), (1, -1), (0, 0), (-1, 1), (-2, 2), (-3, 3)],
    &[(1, -4), (1, -3), (1, -2), (0, -1), (0, 0), (0, 1), (-1, 2), (-1, 3), (-1, 4)],
    &[(-1, -4), (-1, -3), (-1, -2), (0, -1), (0, 0), (0, 1), (1, 2), (1, 3), (1, 4)],
    &[(-4, -1), (-3, -1), (-2, -1), (-1, 0), (0, 0), (1, 0), (2, 1), (3, 1), (4, 1)],
    &[(-4, 1), (-3, 1), (-2, 1), (-1, 0), (0, 0), (1, 0), (2, -1), (3, -1), (4, -1)],
    &[(-2, -3), (-1, -2), (-1, -1), (0, 0), (1, 1), (1, 2), (2, 3)],
    &[(2, -3), (1, -2), (1, -1), (0, 0), (-1, 1), (-1, 2), (-2, 3)],
    &[(-3, -2), (-2, -1), (-1, -1), (0, 0), (1, 1), (2, 1), (3, 2)],
    &[(3, -2), (2, -1), (1, -1), (0, 0), (-1, 1), (-2, 1), (-3, 2)],
    // The last four repeat lines 8, 7, 6 and 5, doubling their weight.
    &[(-4, 1), (-3, 1), (-2, 1), (-1, 0), (0, 0), (1, 0), (2, -1), (3, -1), (4, -1)],
    &[(-4, -1), (-3, -1), (-2, -1), (-1, 0), (0, 0), (1, 0), (2, 1), (3, 1), (4, 1)],
    &[(-1, -4), (-1, -3), (-1, -2), (0, -1), (0, 0), (0, 1), (1, 2), (1, 3), (1, 4)],
    &[(1, -4), (1, -3), (1, -2), (0, -1), (0, 0), (0, 1), (-1, 2), (-1, 3), (-1, 4)],
];

#[rustfmt::skip]
const COARSE_LINES: [Line; 16] = [
    &[(-4, 0), (-2, 0), (0, 0), (2, 0), (4, 0)],
    &[(0, -4), (0, -2), (0, 0), (0, 2), (0, 4)],
    &[(-3, -3), (-2, -2), (0, 0), (2, 2), (3, 3)],
    &[(3, -3), (2, -2), (0, 0), (-2, 2), (-3, 3)],
    &[(1, -4), (1, -2), (0, 0), (-1, 2), (-1, 4)],
    &[(-1, -4), (-1, -2), (0, 0), (1, 2), (1, 4)],
    &[(-4, -1), (-2, -1), (0, 0), (2, 1), (4, 1)],
    &[(-4, 1), (-2, 1), (0, 0), (2, -1), (4, -1)],
    &[(-2, -3), (-1, -2), (0, 0), (1, 2), (2, 3)],
    &[(2, -3), (1, -2), (0, 0), (-1, 2), (-2, 3)],
    &[(-3, -2), (-2, -1), (0, 0), (2, 1), (3, 2)],
    &[(3, -2), (2, -1), (0, 0), (-2, 1), (-3, 2)],
    &[(-4, 2), (-2, 1), (0, 0), (2, -1), (4, -2)],
    &[(-4, -2), (-2, -1), (0, 0), (2, 1), (4, 2)],
    &[(-2, -4), (-1, -2), (0, 0), (1, 2), (2, 4)],
    &[(2, -4), (1, -2), (0, 0), (-1, 2), (-2, 4)],
];

/// Sums one line with a fixed pairing so every implementation rounds alike.
#[inline]
fn line_sum(v: &[f32]) -> f32 {
    match *v {
        [a, b, c, d, e] => (a + b) + (c + (d + e)),
        [a, b, c, d, e, f, g] => (a + b) + (c + ((d + e) + (f + g))),
        [a, b, c, d, e, f, g, h, i] => (((a + b) + (c + d)) + ((e + f) + (g + h))) + i,
        _ => v.iter().sum(),
    }
}

/// A structural kernel over a 9x9 neighborhood of a diffs buffer.
///
/// `unit` has a portable default driven by [`MaltaKernel::lines`];
/// implementors may override it with a specialized version as long as the
/// result matches the default.
pub trait MaltaKernel: Sync {
    /// Overall gain folded into the diffs scaling.
    const MULLI: f64;

    /// Directional lines as `(dx, dy)` taps around the center.
    fn lines(&self) -> &'static [Line];

    /// Line energy at `center` in `d`, whose rows are `stride` apart. All
    /// taps within `RADIUS` rows and columns of `center` must be in bounds.
    #[inline]
    fn unit(&self, d: &[f32], center: usize, stride: usize) -> f32 {
        let mut taps = [0.0f32; WINDOW];
        let mut energy = 0.0f32;
        for line in self.lines() {
            for (slot, &(dx, dy)) in taps.iter_mut().zip(line.iter()) {
                let offset = isize::from(dy) * stride as isize + isize::from(dx);
                *slot = d[center.wrapping_add_signed(offset)];
            }
            let sum = line_sum(&taps[..line.len()]);
            energy += sum * sum;
        }
        energy
    }
}

/// 9- and 7-tap kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fine;

/// 5-tap kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coarse;

impl MaltaKernel for Fine {
    const MULLI: f64 = MALTA_MULLI_FINE;

    fn lines(&self) -> &'static [Line] {
        &FINE_LINES
    }
}

impl MaltaKernel for Coarse {
    const MULLI: f64 = MALTA_MULLI_COARSE;

    fn lines(&self) -> &'static [Line] {
        &COARSE_LINES
    }
}

/// Kernel response at `(x, y)`, reading zero outside the image.
pub fn padded_unit<K: MaltaKernel>(kernel: &K, diffs: &ImageF, x: usize, y: usize) -> f32 {
    let (width, height) = (diffs.width(), diffs.height());
    if x >= RADIUS && y >= RADIUS && x + RADIUS < width && y + RADIUS < height {
        return kernel.unit(diffs.data(), y * diffs.stride() + x, diffs.stride());
    }

    let mut window = [0.0f32; WINDOW * WINDOW];
    for (wy, window_row) in window.chunks_exact_mut(WINDOW).enumerate() {
        let Some(sy) = (y + wy).checked_sub(RADIUS).filter(|&sy| sy < height) else {
            continue;
        };
        let row = diffs.row(sy);
        for (wx, v) in window_row.iter_mut().enumerate() {
            if let Some(sx) = (x + wx).checked_sub(RADIUS).filter(|&sx| sx < width) {
                *v = row[sx];
            }
        }
    }
    kernel.unit(&window, RADIUS * WINDOW + RADIUS, WINDOW)
}

/// Signed, scaled difference with half-open penalties for over- and
/// undershoot of the reference magnitude.
#[inline]
fn scaled_diff(v0: f32, v1: f32, norm1: f32, norm2_gt: f32, norm2_lt: f32) -> f32 {
    let absval = 0.5 * (v0.abs() + v1.abs());
    let scaler = norm2_gt / (norm1 + absval);
    let mut out = scaler * (v0 - v1);

    let scaler2 = f64::from(norm2_lt / (norm1 + absval));
    let fabs0 = f64::from(v0.abs());
    let too_small = MALTA_TOO_SMALL * fabs0;
    let too_big = MALTA_TOO_BIG * fabs0;
    let (v0, v1) = (f64::from(v0), f64::from(v1));

    if v0 < 0.0 {
        if v1 > -too_small {
            out = (f64::from(out) - scaler2 * (v1 + too_small)) as f32;
        } else if v1 < -too_big {
            out = (f64::from(out) + scaler2 * (-v1 - too_big)) as f32;
        }
    } else if v1 < too_small {
        out = (f64::from(out) + scaler2 * (too_small - v1)) as f32;
    } else if v1 > too_big {
        out = (f64::from(out) - scaler2 * (v1 - too_big)) as f32;
    }
    out
}

/// Adds the Malta energy of `reference` vs `distorted` into `accum`.
///
/// `w_gt` weighs the symmetric difference, `w_lt` the half-open penalties;
/// `norm1` sets where the difference saturates relative to band magnitude.
pub fn malta_diff_map<K: MaltaKernel>(
    kernel: &K,
    reference: &ImageF,
    distorted: &ImageF,
    w_gt: f64,
    w_lt: f64,
    norm1: f64,
    accum: &mut ImageF,
) {
    debug_assert!(reference.same_size(distorted) && reference.same_size(accum));

    let denom = MALTA_LEN * 2.0 + 1.0;
    let w_pre_gt = K::MULLI * (MALTA_WEIGHT_GT * w_gt).sqrt() / denom;
    let w_pre_lt = K::MULLI * (MALTA_WEIGHT_LT * w_lt).sqrt() / denom;
    let norm2_gt = (w_pre_gt * norm1) as f32;
    let norm2_lt = (w_pre_lt * norm1) as f32;
    let norm1 = norm1 as f32;

    let mut diffs = ImageF::new(reference.width(), reference.height());
    for_each_row(&mut diffs, |y, row| {
        for ((d, &v0), &v1) in row.iter_mut().zip(reference.row(y)).zip(distorted.row(y)) {
            *d = scaled_diff(v0, v1, norm1, norm2_gt, norm2_lt);
        }
    });

    let diffs = &diffs;
    for_each_row(accum, |y, row| {
        for (x, acc) in row.iter_mut().enumerate() {
            *acc += padded_unit(kernel, diffs, x, y);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response<K: MaltaKernel>(kernel: &K, img: &ImageF) -> ImageF {
        let mut out = ImageF::new(img.width(), img.height());
        for y in 0..img.height() {
            for x in 0..img.width() {
                out.set(x, y, padded_unit(kernel, img, x, y));
            }
        }
        out
    }

    #[test]
    fn test_line_tables_are_centered() {
        for line in FINE_LINES.iter().chain(COARSE_LINES.iter()) {
            assert!(line.contains(&(0, 0)));
            assert!(line.iter().all(|&(dx, dy)| dx.abs() <= 4 && dy.abs() <= 4));
        }
        assert!(COARSE_LINES.iter().all(|l| l.len() == 5));
        assert!(FINE_LINES.iter().all(|l| l.len() == 9 || l.len() == 7));
    }

    #[test]
    fn test_zero_diffs_give_zero_energy() {
        let img = ImageF::new(16, 16);
        assert_eq!(response(&Fine, &img).max_value(), 0.0);
        assert_eq!(response(&Coarse, &img).max_value(), 0.0);
    }

    #[test]
    fn test_uniform_interior_energy() {
        // Every tap reads 1, so each line contributes its length squared.
        let img = ImageF::filled(20, 20, 1.0);
        let expected_fine: f32 = FINE_LINES.iter().map(|l| (l.len() * l.len()) as f32).sum();
        let expected_coarse = 16.0 * 25.0;
        assert!((padded_unit(&Fine, &img, 10, 10) - expected_fine).abs() < 1e-3);
        assert!((padded_unit(&Coarse, &img, 10, 10) - expected_coarse).abs() < 1e-3);
        // At a corner most taps fall outside and read zero.
        assert!(padded_unit(&Fine, &img, 0, 0) < expected_fine / 2.0);
    }

    #[test]
    fn test_padded_path_matches_direct_path() {
        let img = ImageF::from_fn(24, 24, |x, y| ((x * 31 + y * 17) % 13) as f32 - 6.0);
        for (x, y) in [(4, 4), (10, 12), (19, 19), (4, 19)] {
            let direct = Fine.unit(img.data(), y * img.stride() + x, img.stride());
            let mut window = [0.0f32; WINDOW * WINDOW];
            for wy in 0..WINDOW {
                for wx in 0..WINDOW {
                    window[wy * WINDOW + wx] = img.get(x + wx - RADIUS, y + wy - RADIUS);
                }
            }
            let padded = Fine.unit(&window, RADIUS * WINDOW + RADIUS, WINDOW);
            assert_eq!(direct, padded);
        }
    }

    #[test]
    fn test_oriented_line_beats_scattered_noise() {
        let mut line = ImageF::new(21, 21);
        for x in 6..15 {
            line.set(x, 10, 1.0);
        }
        let mut noise = ImageF::new(21, 21);
        for (i, (x, y)) in [(6, 6), (14, 8), (9, 13), (12, 4), (4, 12), (16, 16), (10, 10), (8, 15), (15, 11)]
            .into_iter()
            .enumerate()
        {
            noise.set(x, y, if i % 2 == 0 { 1.0 } else { -1.0 });
        }
        let line_energy = response(&Fine, &line).max_value();
        let noise_energy = response(&Fine, &noise).max_value();
        assert!(line_energy > 3.0 * noise_energy, "{line_energy} vs {noise_energy}");
    }

    #[test]
    fn test_diff_map_identical_is_zero() {
        let img = ImageF::from_fn(16, 16, |x, y| (x as f32 - y as f32) * 0.3);
        let mut accum = ImageF::new(16, 16);
        malta_diff_map(&Coarse, &img, &img, 37.0, 37.0, 1.0e8, &mut accum);
        assert_eq!(accum.max_value(), 0.0);
    }

    #[test]
    fn test_diff_map_accumulates() {
        let a = ImageF::filled(16, 16, 1.0);
        let mut b = a.clone();
        b.set(8, 8, 3.0);
        let mut accum = ImageF::filled(16, 16, 0.5);
        malta_diff_map(&Fine, &a, &b, 1.1, 1.1, 71.78, &mut accum);
        assert!(accum.get(8, 8) > 0.5);
        assert!((0..16).all(|y| accum.row(y).iter().all(|&v| v >= 0.5)));
    }

    #[test]
    fn test_penalties_are_asymmetric() {
        let (n1, gt, lt) = (5.0f32, 1.0f32, 1.0f32);
        // Distorted lands far on the other side of zero: penalty applies.
        let flipped = scaled_diff(1.0, -1.0, n1, gt, lt);
        let plain = gt / (n1 + 1.0) * 2.0;
        assert!(flipped > plain);
        // Distorted between 0.55x and 1.05x of the reference: no penalty.
        let inside = scaled_diff(1.0, 0.8, n1, gt, lt);
        assert!((inside - gt / (n1 + 0.9) * 0.2).abs() < 1e-6);
    }
}
