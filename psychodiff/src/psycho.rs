//! Frequency decomposer.
//!
//! Splits an XYB image into four spatial frequency bands:
//! - `lf`: everything below `SIGMA_LF`, remapped into "vals" space;
//! - `mf`: between `SIGMA_LF` and `SIGMA_HF`;
//! - `hf`: between `SIGMA_HF` and `SIGMA_UHF` (X and Y only);
//! - `uhf`: above `SIGMA_UHF` (X and Y only).
//!
//! Each split is a blur followed by a subtraction, and the shaping applied
//! between splits differs per channel. The sequence of blurs, subtractions
//! and shaping steps is fixed; reordering any of them changes the bands.

use crate::blur::{blur, blur_inplace};
use crate::consts::{
    ADD_HF_RANGE, ADD_MF_RANGE, BMUL_LF_TO_VALS, MAXCLAMP_HF, MAXCLAMP_MUL, MAXCLAMP_UHF, MUL_Y_HF,
    MUL_Y_UHF, REMOVE_HF_RANGE, REMOVE_MF_RANGE, REMOVE_UHF_RANGE, SIGMA_HF, SIGMA_LF, SIGMA_UHF,
    SUPPRESS_S, SUPPRESS_XY, XMUL_LF_TO_VALS, YMUL_LF_TO_VALS, Y_TO_B_MUL_LF_TO_VALS,
};
use crate::image::{Image3F, ImageF};
use crate::parallel::{for_each_row, for_each_row3};

/// Frequency bands of one image.
#[derive(Debug, Clone)]
pub struct PsychoImage {
    /// Ultra high frequency, X and Y.
    pub uhf: [ImageF; 2],
    /// High frequency, X and Y.
    pub hf: [ImageF; 2],
    /// Mid frequency, X, Y and B.
    pub mf: Image3F,
    /// Low frequency in vals space, X, Y and B.
    pub lf: Image3F,
}

impl PsychoImage {
    #[must_use]
    pub fn width(&self) -> usize {
        self.lf.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.lf.height()
    }
}

/// Zeroes `[-w, w]` and shifts everything outside toward zero by `w`.
#[inline]
#[must_use]
pub fn remove_range_around_zero(x: f32, w: f32) -> f32 {
    if x > w {
        x - w
    } else if x < -w {
        x + w
    } else {
        0.0
    }
}

/// Doubles `[-w, w]` and shifts everything outside away from zero by `w`.
#[inline]
#[must_use]
pub fn amplify_range_around_zero(x: f32, w: f32) -> f32 {
    if x > w {
        x + w
    } else if x < -w {
        x - w
    } else {
        x + x
    }
}

/// Compresses the part of `v` beyond `±max` by `MAXCLAMP_MUL`.
#[inline]
#[must_use]
pub fn maximum_clamp(v: f32, max: f32) -> f32 {
    if v >= max {
        (v - max) * MAXCLAMP_MUL + max
    } else if v < -max {
        (v + max) * MAXCLAMP_MUL - max
    } else {
        v
    }
}

/// Attenuates X where Y is strong.
#[inline]
fn suppress_x_by_y(x: f32, y: f32) -> f32 {
    let scaler = (SUPPRESS_XY / (y * y + SUPPRESS_XY)) * (1.0 - SUPPRESS_S) + SUPPRESS_S;
    scaler * x
}

/// Remaps blurred XYB into the space where plain squared differences are
/// compared.
#[inline]
fn xyb_low_freq_to_vals(x: f32, y: f32, b: f32) -> [f32; 3] {
    let b = Y_TO_B_MUL_LF_TO_VALS * y + b;
    [x * XMUL_LF_TO_VALS, y * YMUL_LF_TO_VALS, b * BMUL_LF_TO_VALS]
}

/// `out = a - b`, row by row.
fn subtract(a: &ImageF, b: &ImageF) -> ImageF {
    let mut out = ImageF::new(a.width(), a.height());
    for_each_row(&mut out, |y, row| {
        for ((o, &va), &vb) in row.iter_mut().zip(a.row(y)).zip(b.row(y)) {
            *o = va - vb;
        }
    });
    out
}

/// Splits X or Y into the provisional high band and the shaped mid band.
///
/// `mf` holds `xyb - lf` on entry and the blurred, shaped mid band on return.
fn separate_mf_and_hf(c: usize, mf: &mut ImageF) -> ImageF {
    let unblurred = mf.clone();
    blur_inplace(mf, SIGMA_HF);
    let hf = subtract(&unblurred, mf);
    if c == 0 {
        mf.map_inplace(|v| remove_range_around_zero(v, REMOVE_MF_RANGE));
    } else {
        mf.map_inplace(|v| amplify_range_around_zero(v, ADD_MF_RANGE));
    }
    hf
}

/// Splits the two high bands into shaped high and ultra-high bands.
fn separate_hf_and_uhf(hf: &mut [ImageF; 2]) -> [ImageF; 2] {
    let mut uhf_x = hf[0].clone();
    blur_inplace(&mut hf[0], SIGMA_UHF);
    {
        let blurred = &hf[0];
        for_each_row(&mut uhf_x, |y, row| {
            for (u, &h) in row.iter_mut().zip(blurred.row(y)) {
                *u = remove_range_around_zero(*u - h, REMOVE_UHF_RANGE);
            }
        });
    }
    hf[0].map_inplace(|v| remove_range_around_zero(v, REMOVE_HF_RANGE));

    let mut uhf_y = hf[1].clone();
    blur_inplace(&mut hf[1], SIGMA_UHF);
    hf[1].map_inplace(|v| maximum_clamp(v, MAXCLAMP_HF));
    {
        let clamped = &hf[1];
        for_each_row(&mut uhf_y, |y, row| {
            for (u, &h) in row.iter_mut().zip(clamped.row(y)) {
                *u = maximum_clamp(*u - h, MAXCLAMP_UHF) * MUL_Y_UHF;
            }
        });
    }
    hf[1].map_inplace(|v| amplify_range_around_zero(v * MUL_Y_HF, ADD_HF_RANGE));

    [uhf_x, uhf_y]
}

/// Decomposes an XYB image into its frequency bands.
#[must_use]
pub fn separate_frequencies(xyb: &Image3F) -> PsychoImage {
    let lf_planes: [ImageF; 3] = std::array::from_fn(|c| blur(xyb.plane(c), SIGMA_LF));
    let mut mf_planes: [ImageF; 3] =
        std::array::from_fn(|c| subtract(xyb.plane(c), &lf_planes[c]));

    let mut hf = [
        separate_mf_and_hf(0, &mut mf_planes[0]),
        separate_mf_and_hf(1, &mut mf_planes[1]),
    ];
    blur_inplace(&mut mf_planes[2], SIGMA_HF);

    {
        let [hf_x, hf_y] = &mut hf;
        let hf_y: &ImageF = hf_y;
        for_each_row(hf_x, |y, row| {
            for (x, &yv) in row.iter_mut().zip(hf_y.row(y)) {
                *x = suppress_x_by_y(*x, yv);
            }
        });
    }

    let uhf = separate_hf_and_uhf(&mut hf);

    let mut lf = Image3F::from_planes(lf_planes);
    for_each_row3(&mut lf, |_, [rx, ry, rb]| {
        for ((x, y), b) in rx.iter_mut().zip(ry.iter_mut()).zip(rb.iter_mut()) {
            [*x, *y, *b] = xyb_low_freq_to_vals(*x, *y, *b);
        }
    });

    PsychoImage {
        uhf,
        hf,
        mf: Image3F::from_planes(mf_planes),
        lf,
    }
}
