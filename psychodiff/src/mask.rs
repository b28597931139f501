//! Visual masking.
//!
//! Busy texture in the reference hides errors near it. The masking field is
//! built from the high and ultra-high X/Y bands, compressed, blurred and then
//! eroded so that a smooth patch next to texture stays unmasked.

use crate::blur::blur;
use crate::consts::{
    COMBINE_CHANNELS_MULS, EROSION_STEP, EROSION_WEIGHTS, MASK_BIAS, MASK_MUL, MASK_RADIUS,
    MASK_TO_ERROR_MUL,
};
use crate::image::ImageF;
use crate::parallel::for_each_row;
use crate::psycho::PsychoImage;

/// Local activity of the X and Y high bands.
#[must_use]
pub fn combine_channels_for_masking(hf: &[ImageF; 2], uhf: &[ImageF; 2]) -> ImageF {
    let [mx, muhf_y, mhf_y] = COMBINE_CHANNELS_MULS;
    let mut out = ImageF::new(hf[0].width(), hf[0].height());
    for_each_row(&mut out, |y, row| {
        let rows = (hf[0].row(y), hf[1].row(y), uhf[0].row(y), uhf[1].row(y));
        for (x, o) in row.iter_mut().enumerate() {
            let xd = (rows.2[x] + rows.0[x]) * mx;
            let yd = rows.3[x] * muhf_y + rows.1[x] * mhf_y;
            *o = (xd * xd + yd * yd).sqrt();
        }
    });
    out
}

/// `sqrt(mul * |v| + mul * bias) - sqrt(mul * bias)`, zero at zero.
#[must_use]
pub fn diff_precompute(input: &ImageF, mul: f32, bias: f32) -> ImageF {
    let bias = mul * bias;
    let sqrt_bias = bias.sqrt();
    let mut out = ImageF::new(input.width(), input.height());
    for_each_row(&mut out, |y, row| {
        for (o, &v) in row.iter_mut().zip(input.row(y)) {
            *o = (mul * v.abs() + bias).sqrt() - sqrt_bias;
        }
    });
    out
}

/// Keeps the three smallest values seen so far, sorted.
#[inline]
fn store_min3(v: f32, mins: &mut [f32; 3]) {
    if v >= mins[2] {
        return;
    }
    if v < mins[0] {
        mins[2] = mins[1];
        mins[1] = mins[0];
        mins[0] = v;
    } else if v < mins[1] {
        mins[2] = mins[1];
        mins[1] = v;
    } else {
        mins[2] = v;
    }
}

/// Weighted blend of the three smallest values in a sparse neighborhood.
///
/// The neighborhood is the pixel itself plus up to eight samples
/// `EROSION_STEP` away, horizontally, vertically and diagonally. Samples
/// outside the image are skipped.
#[must_use]
pub fn fuzzy_erosion(from: &ImageF) -> ImageF {
    let (width, height) = (from.width(), from.height());
    let step = EROSION_STEP;
    let mut out = ImageF::new(width, height);
    for_each_row(&mut out, |y, row| {
        let center = from.row(y);
        let up = y.checked_sub(step).map(|yy| from.row(yy));
        let down = (y + step < height).then(|| from.row(y + step));
        for (x, o) in row.iter_mut().enumerate() {
            let c = center[x];
            let mut mins = [c, 2.0 * c, 2.0 * c];
            if x >= step {
                let xx = x - step;
                store_min3(center[xx], &mut mins);
                if let Some(up) = up {
                    store_min3(up[xx], &mut mins);
                }
                if let Some(down) = down {
                    store_min3(down[xx], &mut mins);
                }
            }
            if x + step < width {
                let xx = x + step;
                store_min3(center[xx], &mut mins);
                if let Some(up) = up {
                    store_min3(up[xx], &mut mins);
                }
                if let Some(down) = down {
                    store_min3(down[xx], &mut mins);
                }
            }
            if let Some(up) = up {
                store_min3(up[x], &mut mins);
            }
            if let Some(down) = down {
                store_min3(down[x], &mut mins);
            }
            *o = EROSION_WEIGHTS[0] * mins[0]
                + EROSION_WEIGHTS[1] * mins[1]
                + EROSION_WEIGHTS[2] * mins[2];
        }
    });
    out
}

/// Masking field of `reference`.
///
/// When `ac` is given, the squared mismatch between the blurred fields of
/// `reference` and `distorted`, times `MASK_TO_ERROR_MUL`, is added to it.
#[must_use]
pub fn mask_psycho_image(
    reference: &PsychoImage,
    distorted: &PsychoImage,
    ac: Option<&mut ImageF>,
) -> ImageF {
    let field0 = combine_channels_for_masking(&reference.hf, &reference.uhf);
    let blurred0 = blur(&diff_precompute(&field0, MASK_MUL, MASK_BIAS), MASK_RADIUS);
    let mask = fuzzy_erosion(&blurred0);

    if let Some(ac) = ac {
        let field1 = combine_channels_for_masking(&distorted.hf, &distorted.uhf);
        let blurred1 = blur(&diff_precompute(&field1, MASK_MUL, MASK_BIAS), MASK_RADIUS);
        for_each_row(ac, |y, row| {
            for ((acc, &a), &b) in row.iter_mut().zip(blurred0.row(y)).zip(blurred1.row(y)) {
                let d = a - b;
                *acc += MASK_TO_ERROR_MUL * d * d;
            }
        });
    }
    mask
}
