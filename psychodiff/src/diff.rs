//! Per-band differences and the single-resolution diffmap.

use crate::combine::combine_channels_to_diffmap;
use crate::consts::{
    L2_ASYMMETRIC_SCALE, L2_TOO_SMALL, NORM1_HF, NORM1_HF_X, NORM1_MF, NORM1_MF_X, NORM1_UHF,
    NORM1_UHF_X, WMUL, W_HF_MALTA, W_HF_MALTA_X, W_MF_MALTA, W_MF_MALTA_X, W_UHF_MALTA,
    W_UHF_MALTA_X,
};
use crate::image::{Image3F, ImageF};
use crate::malta::{malta_diff_map, Coarse, Fine};
use crate::mask::mask_psycho_image;
use crate::parallel::for_each_row;
use crate::psycho::PsychoImage;

/// `accum += w * (i0 - i1)^2`.
pub fn l2_diff(i0: &ImageF, i1: &ImageF, w: f32, accum: &mut ImageF) {
    if w == 0.0 {
        return;
    }
    for_each_row(accum, |y, row| {
        for ((acc, &a), &b) in row.iter_mut().zip(i0.row(y)).zip(i1.row(y)) {
            let d = a - b;
            *acc += w * d * d;
        }
    });
}

/// `out = w * (i0 - i1)^2`, overwriting.
pub fn set_l2_diff(i0: &ImageF, i1: &ImageF, w: f32, out: &mut ImageF) {
    if w == 0.0 {
        return;
    }
    for_each_row(out, |y, row| {
        for ((o, &a), &b) in row.iter_mut().zip(i0.row(y)).zip(i1.row(y)) {
            let d = a - b;
            *o = w * d * d;
        }
    });
}

/// Squared difference plus a penalty when `i1` collapses toward zero or
/// overshoots the magnitude of `i0`.
pub fn l2_diff_asymmetric(i0: &ImageF, i1: &ImageF, w_gt: f32, w_lt: f32, accum: &mut ImageF) {
    if w_gt == 0.0 && w_lt == 0.0 {
        return;
    }
    let vw_gt = w_gt * L2_ASYMMETRIC_SCALE;
    let vw_lt = w_lt * L2_ASYMMETRIC_SCALE;

    for_each_row(accum, |y, row| {
        for ((acc, &v0), &v1) in row.iter_mut().zip(i0.row(y)).zip(i1.row(y)) {
            let d = v0 - v1;
            let mut total = *acc + d * d * vw_gt;

            let fabs0 = v0.abs();
            let too_small = L2_TOO_SMALL * fabs0;
            let too_big = fabs0;
            let v = if v0 < 0.0 {
                if v1 > -too_small {
                    v1 + too_small
                } else if v1 < -too_big {
                    -v1 - too_big
                } else {
                    0.0
                }
            } else if v1 < too_small {
                too_small - v1
            } else if v1 > too_big {
                v1 - too_big
            } else {
                0.0
            };
            total += vw_lt * v * v;
            *acc = total;
        }
    });
}

/// Weights that vary with the comparator configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BandWeights {
    pub hf_asymmetry: f64,
    pub xmul: f32,
}

/// Diffmap between two decompositions of equal size, one resolution only.
pub(crate) fn psycho_diffmap(
    reference: &PsychoImage,
    distorted: &PsychoImage,
    weights: BandWeights,
) -> ImageF {
    let (width, height) = (reference.width(), reference.height());
    let a = weights.hf_asymmetry;
    let sqrt_a = a.sqrt();

    let mut ac = Image3F::new(width, height);
    let mut dc = Image3F::new(width, height);

    {
        let [ac_x, ac_y, _] = ac.planes_mut();
        malta_diff_map(&Fine, &reference.uhf[1], &distorted.uhf[1], W_UHF_MALTA * a, W_UHF_MALTA / a, NORM1_UHF, ac_y);
        malta_diff_map(&Fine, &reference.uhf[0], &distorted.uhf[0], W_UHF_MALTA_X * a, W_UHF_MALTA_X / a, NORM1_UHF_X, ac_x);
        malta_diff_map(&Coarse, &reference.hf[1], &distorted.hf[1], W_HF_MALTA * sqrt_a, W_HF_MALTA / sqrt_a, NORM1_HF, ac_y);
        malta_diff_map(&Coarse, &reference.hf[0], &distorted.hf[0], W_HF_MALTA_X * sqrt_a, W_HF_MALTA_X / sqrt_a, NORM1_HF_X, ac_x);
        malta_diff_map(&Coarse, reference.mf.plane(1), distorted.mf.plane(1), W_MF_MALTA, W_MF_MALTA, NORM1_MF, ac_y);
        malta_diff_map(&Coarse, reference.mf.plane(0), distorted.mf.plane(0), W_MF_MALTA_X, W_MF_MALTA_X, NORM1_MF_X, ac_x);
    }

    for c in 0..3 {
        if c < 2 {
            l2_diff_asymmetric(
                &reference.hf[c],
                &distorted.hf[c],
                (WMUL[c] * a) as f32,
                (WMUL[c] / a) as f32,
                ac.plane_mut(c),
            );
        }
        l2_diff(reference.mf.plane(c), distorted.mf.plane(c), WMUL[3 + c] as f32, ac.plane_mut(c));
        set_l2_diff(reference.lf.plane(c), distorted.lf.plane(c), WMUL[6 + c] as f32, dc.plane_mut(c));
    }

    let mask = mask_psycho_image(reference, distorted, Some(ac.plane_mut(1)));
    combine_channels_to_diffmap(&mask, &dc, &ac, weights.xmul)
}
