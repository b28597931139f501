//! 2x box downsampling and nearest-neighbour blend-back.

use crate::consts::SUPERSAMPLE_DAMPING;
use crate::image::{Image3F, ImageF};
use crate::parallel::for_each_row;

/// Averages 2x2 blocks into an image of size `((w + 1) / 2, (h + 1) / 2)`.
///
/// An odd trailing column or row only has half a block; it is doubled so it
/// still averages to the source level.
#[must_use]
pub fn subsample_2x(input: &Image3F) -> Image3F {
    let (width, height) = (input.width(), input.height());
    let (out_w, out_h) = (width.div_ceil(2), height.div_ceil(2));
    let planes = std::array::from_fn(|c| {
        let src = input.plane(c);
        let mut out = ImageF::new(out_w, out_h);
        for y in 0..height {
            let row_out = out.row_mut(y / 2);
            for (x, &v) in src.row(y).iter().enumerate() {
                row_out[x / 2] += 0.25 * v;
            }
        }
        if width % 2 == 1 {
            for y in 0..out_h {
                out.row_mut(y)[out_w - 1] *= 2.0;
            }
        }
        if height % 2 == 1 {
            for v in out.row_mut(out_h - 1) {
                *v *= 2.0;
            }
        }
        out
    });
    Image3F::from_planes(planes)
}

/// `dest = dest * (1 - SUPERSAMPLE_DAMPING * w) + w * src[y / 2][x / 2]`.
pub fn add_supersampled_2x(src: &ImageF, w: f32, dest: &mut ImageF) {
    debug_assert_eq!(src.width(), dest.width().div_ceil(2));
    debug_assert_eq!(src.height(), dest.height().div_ceil(2));
    let damping = 1.0 - SUPERSAMPLE_DAMPING * w;
    for_each_row(dest, |y, row| {
        let src_row = src.row(y / 2);
        for (x, d) in row.iter_mut().enumerate() {
            *d *= damping;
            *d += w * src_row[x / 2];
        }
    });
}
