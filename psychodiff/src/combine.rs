//! Mask transfer functions and final per-pixel combination.

use crate::consts::{
    GLOBAL_SCALE, MASK_DC_Y_MUL, MASK_DC_Y_OFFSET, MASK_DC_Y_SCALER, MASK_Y_MUL, MASK_Y_OFFSET,
    MASK_Y_SCALER,
};
use crate::image::{Image3F, ImageF};
use crate::parallel::for_each_row;

#[inline]
fn mask_transfer(delta: f64, offset: f64, scaler: f64, mul: f64) -> f64 {
    let c = mul / (scaler * delta + offset);
    let retval = f64::from(GLOBAL_SCALE) * (1.0 + c);
    retval * retval
}

/// Weight of AC (high and mid band) error at masking level `delta`.
#[inline]
#[must_use]
pub fn mask_y(delta: f64) -> f64 {
    mask_transfer(delta, MASK_Y_OFFSET, MASK_Y_SCALER, MASK_Y_MUL)
}

/// Weight of DC (low band) error at masking level `delta`.
#[inline]
#[must_use]
pub fn mask_dc_y(delta: f64) -> f64 {
    mask_transfer(delta, MASK_DC_Y_OFFSET, MASK_DC_Y_SCALER, MASK_DC_Y_MUL)
}

/// Sum of the three channel errors, each weighted by `mask`.
#[inline]
fn masked_sum(c: [f32; 3], mask: f32) -> f32 {
    c[0] * mask + c[1] * mask + c[2] * mask
}

/// `sqrt(mask_dc_y(m) * sum(dc) + mask_y(m) * sum(ac))` per pixel, with the
/// X planes scaled by `xmul` first. Each channel is weighted before summing.
#[must_use]
pub fn combine_channels_to_diffmap(mask: &ImageF, dc: &Image3F, ac: &Image3F, xmul: f32) -> ImageF {
    let mut out = ImageF::new(mask.width(), mask.height());
    for_each_row(&mut out, |y, row| {
        let m = mask.row(y);
        let dc_rows = [dc.plane(0).row(y), dc.plane(1).row(y), dc.plane(2).row(y)];
        let ac_rows = [ac.plane(0).row(y), ac.plane(1).row(y), ac.plane(2).row(y)];
        for (x, o) in row.iter_mut().enumerate() {
            let val = f64::from(m[x]);
            let ac_mask = mask_y(val) as f32;
            let dc_mask = mask_dc_y(val) as f32;
            let dc_diff = [dc_rows[0][x] * xmul, dc_rows[1][x], dc_rows[2][x]];
            let ac_diff = [ac_rows[0][x] * xmul, ac_rows[1][x], ac_rows[2][x]];
            *o = (masked_sum(dc_diff, dc_mask) + masked_sum(ac_diff, ac_mask)).sqrt();
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_decrease_with_activity() {
        let mut prev = (mask_y(0.0), mask_dc_y(0.0));
        for i in 1..50 {
            let d = f64::from(i) * 0.5;
            let cur = (mask_y(d), mask_dc_y(d));
            assert!(cur.0 < prev.0 && cur.1 < prev.1);
            prev = cur;
        }
        // Both level off at GLOBAL_SCALE^2.
        let floor = f64::from(GLOBAL_SCALE).powi(2);
        assert!(mask_y(1e9) > floor && mask_y(1e9) < floor * 1.001);
    }

    #[test]
    fn test_mask_dc_y_at_zero() {
        let g = f64::from(GLOBAL_SCALE);
        let expected = (g * (1.0 + MASK_DC_Y_MUL / MASK_DC_Y_OFFSET)).powi(2);
        assert!((mask_dc_y(0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_combine_zero_is_zero() {
        let mask = ImageF::filled(5, 4, 1.0);
        let out = combine_channels_to_diffmap(&mask, &Image3F::new(5, 4), &Image3F::new(5, 4), 1.0);
        assert_eq!(out.max_value(), 0.0);
    }

    #[test]
    fn test_combine_weights_x_by_xmul() {
        let mask = ImageF::new(2, 2);
        let mut ac = Image3F::new(2, 2);
        ac.plane_mut(0).fill(1.0);
        let single = combine_channels_to_diffmap(&mask, &Image3F::new(2, 2), &ac, 1.0);
        let quadruple = combine_channels_to_diffmap(&mask, &Image3F::new(2, 2), &ac, 4.0);
        assert!((quadruple.get(0, 0) - 2.0 * single.get(0, 0)).abs() < 1e-5);
    }

    #[test]
    fn test_combine_weights_each_channel_before_summing() {
        let mask = ImageF::filled(1, 1, 0.37);
        let mut dc = Image3F::new(1, 1);
        let mut ac = Image3F::new(1, 1);
        for (c, (d, a)) in [(0.1f32, 0.7f32), (1e-7, 3.3), (2.9, 1e-6)].into_iter().enumerate() {
            dc.plane_mut(c).set(0, 0, d);
            ac.plane_mut(c).set(0, 0, a);
        }
        let xmul = 1.3;
        let out = combine_channels_to_diffmap(&mask, &dc, &ac, xmul);

        let dc_mask = mask_dc_y(f64::from(0.37f32)) as f32;
        let ac_mask = mask_y(f64::from(0.37f32)) as f32;
        let dc_part = 0.1f32 * xmul * dc_mask + 1e-7 * dc_mask + 2.9 * dc_mask;
        let ac_part = 0.7f32 * xmul * ac_mask + 3.3 * ac_mask + 1e-6 * ac_mask;
        assert_eq!(out.get(0, 0), (dc_part + ac_part).sqrt());
    }
}
