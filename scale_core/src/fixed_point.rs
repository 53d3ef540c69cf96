//! Fixed-point centigram arithmetic helpers.
//!
//! Weights travel through the engine as centigrams (`i32`, 1 cg = 0.01 g) so
//! debounce comparisons are exact and independent of the source unit.

/// Grams per avoirdupois ounce.
pub const GRAMS_PER_OUNCE: f64 = 28.349_523_125;

/// Quantize a floating-point grams value to integer centigrams (cg), rounding to nearest
/// and clamping to the `i32` range. Non-finite values (NaN/±Inf) map to 0.
#[inline]
pub fn quantize_to_cg_i32(x_g: f64) -> i32 {
    if !x_g.is_finite() {
        return 0;
    }
    let scaled = (x_g * 100.0).round();
    if scaled >= f64::from(i32::MAX) {
        i32::MAX
    } else if scaled <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        scaled as i32
    }
}

/// Absolute difference of two i32 values as u32 without overflow.
///
/// Uses 64-bit intermediates to avoid overflow during subtraction.
/// For any `i32` inputs, `|a - b| <= u32::MAX`, so the cast is always lossless.
#[inline]
pub fn abs_diff_i32_u32(a: i32, b: i32) -> u32 {
    let diff = i64::from(a) - i64::from(b);
    let mag = diff.unsigned_abs();
    debug_assert!(
        mag <= u64::from(u32::MAX),
        "abs_diff_i32_u32: magnitude out of u32 range: {mag}"
    );
    mag as u32
}

/// Convert a non-negative grams threshold to centigrams, rounding to nearest.
/// Negative or non-finite input maps to 0.
#[inline]
pub fn threshold_g_to_cg(g: f32) -> u32 {
    if !g.is_finite() || g <= 0.0 {
        return 0;
    }
    let scaled = (f64::from(g) * 100.0).round();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Centigrams back to grams for presentation.
#[inline]
pub fn cg_to_grams(cg: i32) -> f64 {
    f64::from(cg) / 100.0
}
