//! Tuned constants of the psychovisual model.
//!
//! Every magic number used by the pipeline lives here so that a conformance
//! suite can diff them against the reference model in one place.

// ============================================================================
// Minimum working size
// ============================================================================

/// Smallest width or height the pipeline runs on directly. Smaller inputs are
/// padded up to this size by replicating edge pixels.
pub const MIN_SIZE: usize = 8;

// ============================================================================
// Blur
// ============================================================================

/// Kernel radius is `max(1, KERNEL_EXTENT * sigma)`.
pub const KERNEL_EXTENT: f32 = 2.25;

// ============================================================================
// Opsin dynamics (color adapter)
// ============================================================================

/// Blur applied to the linear input to obtain the adaptation context.
pub const OPSIN_BLUR_SIGMA: f32 = 1.2;

/// Absorbance mix: rows are the three cone-like responses, columns are
/// `[r, g, b, bias]`.
pub const OPSIN_ABSORBANCE: [[f32; 4]; 3] = [
    [
        0.299_565_503_400_583_19,
        0.633_730_878_338_259_36,
        0.077_705_617_820_981_968,
        1.755_748_364_328_735_3,
    ],
    [
        0.221_586_911_045_747_74,
        0.693_913_880_441_161_42,
        0.098_731_358_842_2,
        1.755_748_364_328_735_3,
    ],
    [
        0.02,
        0.02,
        0.204_801_290_410_261_29,
        12.226_454_707_163_354,
    ],
];

/// Floor applied to the absorbance and sensitivity values.
pub const OPSIN_MIN_VALUE: f32 = 1e-4;

/// `gamma(v) = GAMMA_MUL * ln2 * log2(v + GAMMA_BIAS) + GAMMA_ADD`.
pub const GAMMA_MUL: f32 = 19.245_013_259_874_995;
/// Bias added before the logarithm.
pub const GAMMA_BIAS: f32 = 9.971_063_576_929_914_5;
/// Offset added after the logarithm.
pub const GAMMA_ADD: f32 = -23.160_462_398_057_55;

// ============================================================================
// Frequency separation
// ============================================================================

/// Sigma separating the low frequency band.
pub const SIGMA_LF: f32 = 7.15593339443;
/// Sigma separating mid from high frequencies.
pub const SIGMA_HF: f32 = 3.22489901262;
/// Sigma separating high from ultra-high frequencies.
pub const SIGMA_UHF: f32 = 1.56416327805;

/// Dead zone removed from the X mid band.
pub const REMOVE_MF_RANGE: f32 = 0.29;
/// Window doubled in the Y mid band.
pub const ADD_MF_RANGE: f32 = 0.1;
/// Dead zone removed from the X high band.
pub const REMOVE_HF_RANGE: f32 = 1.5;
/// Window doubled in the Y high band.
pub const ADD_HF_RANGE: f32 = 0.132;
/// Dead zone removed from the X ultra-high band.
pub const REMOVE_UHF_RANGE: f32 = 0.04;

/// Soft clamp magnitude for the Y high band.
pub const MAXCLAMP_HF: f32 = 28.4691806922;
/// Soft clamp magnitude for the Y ultra-high band.
pub const MAXCLAMP_UHF: f32 = 5.19175294647;
/// Slope of the soft clamp beyond its magnitude.
pub const MAXCLAMP_MUL: f32 = 0.724216145665;

/// Gain of the Y high band.
pub const MUL_Y_HF: f32 = 2.155;
/// Gain of the Y ultra-high band.
pub const MUL_Y_UHF: f32 = 2.69313763794;

/// Strength of the X-by-Y high band suppression.
pub const SUPPRESS_XY: f32 = 46.0;
/// Floor of the X-by-Y suppression scaler.
pub const SUPPRESS_S: f32 = 0.653020556257;

/// Low-frequency remix into the comparison ("vals") space.
pub const XMUL_LF_TO_VALS: f32 = 33.832837186260;
/// Y gain of the low-frequency remix.
pub const YMUL_LF_TO_VALS: f32 = 14.458268100570;
/// B gain of the low-frequency remix.
pub const BMUL_LF_TO_VALS: f32 = 49.87984651440;
/// Y leakage subtracted from B before the remix.
pub const Y_TO_B_MUL_LF_TO_VALS: f32 = -0.362267051518;

// ============================================================================
// Malta structural comparator
// ============================================================================

/// Effective line length used to normalize the Malta weights.
pub const MALTA_LEN: f64 = 3.75;
/// Weight of the symmetric term.
pub const MALTA_WEIGHT_GT: f64 = 0.5;
/// Weight of the half-open penalty terms.
pub const MALTA_WEIGHT_LT: f64 = 0.33;
/// Overall gain of the fine (9-tap) kernel.
pub const MALTA_MULLI_FINE: f64 = 0.39905817637;
/// Overall gain of the coarse (5-tap) kernel.
pub const MALTA_MULLI_COARSE: f64 = 0.611612573796;
/// Undershoot ratio that triggers the half-open penalty.
pub const MALTA_TOO_SMALL: f64 = 0.55;
/// Overshoot ratio that triggers the half-open penalty.
pub const MALTA_TOO_BIG: f64 = 1.05;

/// Fine kernel weight for the Y ultra-high band.
pub const W_UHF_MALTA: f64 = 1.10039032555;
/// Normalization for the Y ultra-high band.
pub const NORM1_UHF: f64 = 71.7800275169;
/// Fine kernel weight for the X ultra-high band.
pub const W_UHF_MALTA_X: f64 = 173.5;
/// Normalization for the X ultra-high band.
pub const NORM1_UHF_X: f64 = 5.0;

/// Coarse kernel weight for the Y high band.
pub const W_HF_MALTA: f64 = 18.7237414387;
/// Normalization for the Y high band.
pub const NORM1_HF: f64 = 4_498_534.45232;
/// Coarse kernel weight for the X high band.
pub const W_HF_MALTA_X: f64 = 6923.99476109;
/// Normalization for the X high band.
pub const NORM1_HF_X: f64 = 8051.15833247;

/// Coarse kernel weight for the Y mid band.
pub const W_MF_MALTA: f64 = 37.0819870399;
/// Normalization for the Y mid band.
pub const NORM1_MF: f64 = 130_262_059.556;
/// Coarse kernel weight for the X mid band.
pub const W_MF_MALTA_X: f64 = 8246.75321353;
/// Normalization for the X mid band.
pub const NORM1_MF_X: f64 = 1_009_002.70582;

// ============================================================================
// L2 band differences
// ============================================================================

/// Per-band L2 weights: `[hf x, hf y, hf b, mf x, mf y, mf b, lf x, lf y, lf b]`.
pub const WMUL: [f64; 9] = [
    400.0,
    1.50815703118,
    0.0,
    2150.0,
    10.6195433239,
    16.2176043152,
    29.2353797994,
    0.844626970982,
    0.703646627719,
];

/// Scale applied to both asymmetric L2 weights.
pub const L2_ASYMMETRIC_SCALE: f32 = 0.8;
/// Undershoot ratio for the asymmetric L2 penalty.
pub const L2_TOO_SMALL: f32 = 0.4;

// ============================================================================
// Masking
// ============================================================================

/// Multipliers for combining `[x, y uhf, y hf]` into the masking field.
pub const COMBINE_CHANNELS_MULS: [f32; 3] = [2.5, 0.4, 0.4];
/// Multiplier inside `diff_precompute`.
pub const MASK_MUL: f32 = 6.19424080439;
/// Bias inside `diff_precompute` (scaled by `MASK_MUL`).
pub const MASK_BIAS: f32 = 12.61050594197;
/// Blur applied to the precomputed masking field.
pub const MASK_RADIUS: f32 = 2.7;
/// Weight of the masking mismatch added into the AC accumulator.
pub const MASK_TO_ERROR_MUL: f32 = 10.0;

/// Sampling step of the fuzzy erosion neighborhood.
pub const EROSION_STEP: usize = 3;
/// Blend of the three smallest neighborhood values.
pub const EROSION_WEIGHTS: [f32; 3] = [0.45, 0.3, 0.25];

/// `ln(80) / ln(255)`.
pub const INTENSITY_TARGET_NORMALIZATION: f32 = 0.790_799_17;
/// Raw score of a just-noticeable difference.
pub const INTERNAL_GOOD_QUALITY_THRESHOLD: f32 = 17.83 * INTENSITY_TARGET_NORMALIZATION;
/// Global scale applied inside the mask transfer functions.
pub const GLOBAL_SCALE: f32 = 1.0 / INTERNAL_GOOD_QUALITY_THRESHOLD;

/// AC mask transfer offset.
pub const MASK_Y_OFFSET: f64 = 0.829591754942;
/// AC mask transfer scaler.
pub const MASK_Y_SCALER: f64 = 0.451936922203;
/// AC mask transfer gain.
pub const MASK_Y_MUL: f64 = 2.5485944793;

/// DC mask transfer offset.
pub const MASK_DC_Y_OFFSET: f64 = 0.20025578522;
/// DC mask transfer scaler.
pub const MASK_DC_Y_SCALER: f64 = 3.87449418804;
/// DC mask transfer gain.
pub const MASK_DC_Y_MUL: f64 = 0.505054525019;

// ============================================================================
// Multi-resolution blend
// ============================================================================

/// Weight of the half resolution map when blended into the full one.
pub const SUPERSAMPLE_WEIGHT: f32 = 0.5;
/// The full resolution map is damped by `1 - SUPERSAMPLE_DAMPING * weight`.
pub const SUPERSAMPLE_DAMPING: f32 = 0.3;

// ============================================================================
// Fuzzy class
// ============================================================================

/// Steepness of the fuzzy class sigmoid.
pub const FUZZY_WIDTH: f64 = 4.8;
/// Sigmoid amplitude.
pub const FUZZY_M0: f64 = 2.0;
/// Value of the fuzzy class at score 1.0.
pub const FUZZY_SCALER: f64 = 0.7777;
