//! Gaussian blur provider.
//!
//! Two boundary treatments are in play, chosen by kernel length:
//! - length 5 (sigma 1.2 in the color adapter): separable 5-tap filter with
//!   mirrored borders, where `-1` maps to `0` and `size` maps to `size - 1`;
//! - everything else: horizontal convolution that writes its result
//!   transposed, run twice. Border columns clamp the kernel to the image and
//!   renormalize by the weight that remained.
//!
//! Both preserve constant images. The interior of the transposing pass uses
//! `f32x8` lanes and is compiled for several x86_64 feature levels.

use crate::consts::KERNEL_EXTENT;
use crate::image::ImageF;
use wide::f32x8;

/// Un-normalized Gaussian taps for `sigma`, length `2 * radius + 1`.
#[must_use]
pub fn compute_kernel(sigma: f32) -> Vec<f32> {
    let scaler = -1.0 / (2.0 * sigma * sigma);
    let radius = (KERNEL_EXTENT * sigma.abs()).max(1.0) as i32;
    (-radius..=radius)
        .map(|i| (scaler * (i * i) as f32).exp())
        .collect()
}

/// Blurs `input` into a new image.
#[must_use]
pub fn blur(input: &ImageF, sigma: f32) -> ImageF {
    let mut out = ImageF::new(input.width(), input.height());
    blur_into(input, sigma, &mut out);
    out
}

/// Blurs `input` into `out`, which must have the same size.
pub fn blur_into(input: &ImageF, sigma: f32, out: &mut ImageF) {
    debug_assert!(input.same_size(out));
    let kernel = compute_kernel(sigma);
    if kernel.len() == 5 {
        let scale = 1.0 / kernel.iter().sum::<f32>();
        let weights = [kernel[2] * scale, kernel[1] * scale, kernel[0] * scale];
        separable5_mirrored(input, &weights, out);
        return;
    }
    let mut transposed = ImageF::new(input.height(), input.width());
    convolve_transpose(input, &kernel, &mut transposed);
    convolve_transpose(&transposed, &kernel, out);
}

/// Blurs an image in place.
pub fn blur_inplace(image: &mut ImageF, sigma: f32) {
    let blurred = blur(image, sigma);
    *image = blurred;
}

/// Horizontal convolution of `input` written to `output` transposed.
fn convolve_transpose(input: &ImageF, kernel: &[f32], output: &mut ImageF) {
    debug_assert_eq!(output.width(), input.height());
    debug_assert_eq!(output.height(), input.width());
    let width = input.width();
    let half = kernel.len() / 2;

    let weight_no_border: f32 = kernel.iter().sum();
    let scale_no_border = 1.0 / weight_no_border;
    let scaled: Vec<f32> = kernel[..=half].iter().map(|&k| k * scale_no_border).collect();

    let border1 = width.min(half);
    let border2 = width.saturating_sub(half);

    for x in 0..border1 {
        convolve_border_column(input, kernel, x, output);
    }
    if border2 > border1 {
        convolve_interior(input, &scaled, border1, border2, half, output);
    }
    for x in border2.max(border1)..width {
        convolve_border_column(input, kernel, x, output);
    }
}

#[multiversion::multiversion(targets(
    "x86_64+avx512f+avx512bw+avx512cd+avx512dq+avx512vl+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
fn convolve_interior(
    input: &ImageF,
    scaled: &[f32],
    border1: usize,
    border2: usize,
    half: usize,
    output: &mut ImageF,
) {
    let len = 2 * half + 1;
    let lanes_end = border1 + (border2 - border1) / 8 * 8;
    let load = |row: &[f32], at: usize| {
        let mut lane = [0.0f32; 8];
        lane.copy_from_slice(&row[at..at + 8]);
        f32x8::from(lane)
    };

    for y in 0..input.height() {
        let row = input.row(y);

        let mut x = border1;
        while x < lanes_end {
            let start = x - half;
            let mut acc = [f32x8::splat(0.0); 4];
            for (i, &k) in scaled[..half].iter().enumerate() {
                let pair = load(row, start + i) + load(row, start + len - 1 - i);
                acc[i % 4] += pair * f32x8::splat(k);
            }
            let center = load(row, start + half) * f32x8::splat(scaled[half]);
            let sum = center + acc[0] + acc[1] + acc[2] + acc[3];
            let values: [f32; 8] = sum.into();
            for (i, &v) in values.iter().enumerate() {
                output.set(y, x + i, v);
            }
            x += 8;
        }

        for x in lanes_end..border2 {
            output.set(y, x, paired_taps(&row[x - half..=x + half], scaled));
        }
    }
}

/// Symmetric kernel over `window`: mirrored pairs rotate through four
/// accumulators, then the center tap leads the final sum.
#[inline]
fn paired_taps(window: &[f32], scaled: &[f32]) -> f32 {
    let half = scaled.len() - 1;
    let mut acc = [0.0f32; 4];
    for (i, &k) in scaled[..half].iter().enumerate() {
        acc[i % 4] += (window[i] + window[2 * half - i]) * k;
    }
    window[half] * scaled[half] + acc[0] + acc[1] + acc[2] + acc[3]
}

/// Column `x` with the kernel clipped to the image and renormalized.
fn convolve_border_column(input: &ImageF, kernel: &[f32], x: usize, output: &mut ImageF) {
    let half = kernel.len() / 2;
    let minx = x.saturating_sub(half);
    let maxx = (x + half).min(input.width() - 1);

    let taps = &kernel[minx + half - x..=maxx + half - x];
    let scale = 1.0 / taps.iter().sum::<f32>();

    for y in 0..input.height() {
        let row = &input.row(y)[minx..=maxx];
        let sum: f32 = row.iter().zip(taps).map(|(&v, &k)| v * k).sum();
        output.set(y, x, sum * scale);
    }
}

/// Reflects `x` into `0..size` without repeating the edge sample.
#[inline]
fn mirror(mut x: i64, size: i64) -> usize {
    while x < 0 || x >= size {
        x = if x < 0 { -x - 1 } else { 2 * size - 1 - x };
    }
    x as usize
}

/// Separable `[w2, w1, w0, w1, w2]` filter with mirrored borders.
#[multiversion::multiversion(targets(
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
fn separable5_mirrored(input: &ImageF, weights: &[f32; 3], output: &mut ImageF) {
    let (width, height) = (input.width(), input.height());
    let [w0, w1, w2] = *weights;
    let tap = |line: &[f32], i: usize, size: usize| -> f32 {
        let (ii, n) = (i as i64, size as i64);
        line[i] * w0
            + (line[mirror(ii - 1, n)] + line[mirror(ii + 1, n)]) * w1
            + (line[mirror(ii - 2, n)] + line[mirror(ii + 2, n)]) * w2
    };

    let mut transposed = ImageF::new(height, width);
    for y in 0..height {
        let row = input.row(y);
        for x in 0..width {
            transposed.set(y, x, tap(row, x, width));
        }
    }
    for x in 0..width {
        let column = transposed.row(x);
        for y in 0..height {
            output.set(x, y, tap(column, y, height));
        }
    }
}
