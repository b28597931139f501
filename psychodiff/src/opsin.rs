//! Color adapter: linear RGB to the opponent XYB space.
//!
//! Unlike a static color transform, the response of each pixel depends on
//! its blurred neighborhood: a local adaptation level is computed from the
//! blurred image and turned into a per-channel sensitivity that scales the
//! unblurred response.

use crate::blur::blur_into;
use crate::consts::{GAMMA_ADD, GAMMA_BIAS, GAMMA_MUL, OPSIN_ABSORBANCE, OPSIN_BLUR_SIGMA, OPSIN_MIN_VALUE};
use crate::image::Image3F;
use crate::parallel::for_each_row3;

/// Fast approximation of `log2`.
///
/// A (2,2) rational polynomial for `log1p` after range reduction of the
/// mantissa to `[2/3, 4/3)`. L1 error around 3.9e-6.
#[inline]
#[must_use]
pub fn fast_log2f(x: f32) -> f32 {
    const P0: f32 = -1.8503833400518310E-06;
    const P1: f32 = 1.4287160470083755;
    const P2: f32 = 7.4245873327820566E-01;
    const Q0: f32 = 9.9032814277590719E-01;
    const Q1: f32 = 1.0096718572241148;
    const Q2: f32 = 1.7409343003366853E-01;

    let bits = x.to_bits() as i32;
    // 0x3f2aaaab is 2/3.
    let exp = bits.wrapping_sub(0x3f2a_aaab) >> 23;
    let mantissa = f32::from_bits(bits.wrapping_sub(exp << 23) as u32);
    let m = mantissa - 1.0;

    let yp = (P2 * m + P1) * m + P0;
    let yq = (Q2 * m + Q1) * m + Q0;
    yp / yq + exp as f32
}

/// Compressive photoreceptor response. Negative inputs read as zero.
#[inline]
#[must_use]
pub fn gamma(v: f32) -> f32 {
    const RET_MUL: f32 = GAMMA_MUL * std::f32::consts::LN_2;
    RET_MUL * fast_log2f(v.max(0.0) + GAMMA_BIAS) + GAMMA_ADD
}

/// Applies the absorbance mix to one pixel.
///
/// With `clamp`, each response is floored at its bias, which is also the
/// response to black.
#[inline]
#[must_use]
pub fn opsin_absorbance(rgb: [f32; 3], clamp: bool) -> [f32; 3] {
    OPSIN_ABSORBANCE.map(|[mr, mg, mb, bias]| {
        let v = mr * rgb[0] + mg * rgb[1] + mb * rgb[2] + bias;
        if clamp {
            v.max(bias)
        } else {
            v
        }
    })
}

/// Converts linear RGB to XYB with local adaptation.
///
/// `blurred` is working storage of the same size as `rgb`; it holds the
/// adaptation context on return.
pub fn opsin_dynamics_image(rgb: &Image3F, intensity_target: f32, blurred: &mut Image3F) -> Image3F {
    for c in 0..3 {
        blur_into(rgb.plane(c), OPSIN_BLUR_SIGMA, blurred.plane_mut(c));
    }
    let blurred: &Image3F = blurred;

    let mut xyb = Image3F::new(rgb.width(), rgb.height());
    for_each_row3(&mut xyb, |y, [out_x, out_y, out_b]| {
        let src = [rgb.plane(0).row(y), rgb.plane(1).row(y), rgb.plane(2).row(y)];
        let ctx = [
            blurred.plane(0).row(y),
            blurred.plane(1).row(y),
            blurred.plane(2).row(y),
        ];
        for x in 0..out_x.len() {
            let context = [ctx[0][x], ctx[1][x], ctx[2][x]].map(|v| v * intensity_target);
            let pixel = [src[0][x], src[1][x], src[2][x]].map(|v| v * intensity_target);

            let pre = opsin_absorbance(context, true).map(|v| v.max(OPSIN_MIN_VALUE));
            let sensitivity = pre.map(|v| (gamma(v) / v).max(OPSIN_MIN_VALUE));
            let mixed = opsin_absorbance(pixel, false);

            let mut cur = [0.0f32; 3];
            for c in 0..3 {
                cur[c] = (mixed[c] * sensitivity[c]).max(OPSIN_ABSORBANCE[c][3]);
            }
            out_x[x] = cur[0] - cur[1];
            out_y[x] = cur[0] + cur[1];
            out_b[x] = cur[2];
        }
    });
    xyb
}
