//! Row-parallel-for over image rows.
//!
//! With the `rayon` feature rows are handed to the global rayon pool;
//! otherwise the same closure runs over rows in order. Every caller writes
//! only to the row it is given, so both paths produce identical output.

use crate::image::{Image3F, ImageF};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Calls `f(y, row)` for every row of `out`. The row slice excludes stride
/// padding.
pub(crate) fn for_each_row<F>(out: &mut ImageF, f: F)
where
    F: Fn(usize, &mut [f32]) + Send + Sync,
{
    let (width, stride) = (out.width(), out.stride());
    if width == 0 {
        return;
    }

    #[cfg(feature = "rayon")]
    out.data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| f(y, &mut row[..width]));

    #[cfg(not(feature = "rayon"))]
    out.data_mut()
        .chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| f(y, &mut row[..width]));
}

/// Calls `f(y, [row0, row1, row2])` with the matching row of each plane.
pub(crate) fn for_each_row3<F>(out: &mut Image3F, f: F)
where
    F: Fn(usize, [&mut [f32]; 3]) + Send + Sync,
{
    let (width, stride) = (out.width(), out.plane(0).stride());
    if width == 0 {
        return;
    }
    let [p0, p1, p2] = out.planes_mut();

    #[cfg(feature = "rayon")]
    p0.data_mut()
        .par_chunks_mut(stride)
        .zip(p1.data_mut().par_chunks_mut(stride))
        .zip(p2.data_mut().par_chunks_mut(stride))
        .enumerate()
        .for_each(|(y, ((r0, r1), r2))| {
            f(y, [&mut r0[..width], &mut r1[..width], &mut r2[..width]]);
        });

    #[cfg(not(feature = "rayon"))]
    p0.data_mut()
        .chunks_mut(stride)
        .zip(p1.data_mut().chunks_mut(stride))
        .zip(p2.data_mut().chunks_mut(stride))
        .enumerate()
        .for_each(|(y, ((r0, r1), r2))| {
            f(y, [&mut r0[..width], &mut r1[..width], &mut r2[..width]]);
        });
}
