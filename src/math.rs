//! Small numeric helpers.

/// Cutoff below which `fast_exp` returns exactly 0. `e^-87` is already at
/// the edge of the f32 normal range.
const FAST_EXP_MIN_ARG: f32 = -87.0;

/// Cutoff above which `fast_exp` saturates to infinity, matching `e^x`
/// overflow for f32.
const FAST_EXP_MAX_ARG: f32 = 88.0;

/// Schraudolph bit-shift approximation of `e^x` for f32.
///
/// Accurate to a few percent over the bilateral weighting operating range
/// and monotone non-decreasing in `x`, so replacing the exact exponential
/// with it cannot reorder candidate scores built from it alone. Used by
/// the geodesic scorer only.
#[inline]
pub fn fast_exp(x: f32) -> f32 {
    if x < FAST_EXP_MIN_ARG {
        return 0.0;
    }
    if x > FAST_EXP_MAX_ARG {
        return f32::INFINITY;
    }
    // 2^23 / ln 2 scales x into the exponent field; the additive constant
    // is 127 * 2^23 shifted down to center the relative error.
    let bits = (12_102_203.0_f32 * x + 1_064_866_805.0) as i32;
    f32::from_bits(bits as u32)
}
