//! Integer fixed-point helpers for the tint/influence field (spec §4.8).
//!
//! Unlike the teacher's general-purpose `Scalar(i64)` type (which carries a
//! `1_000_000` scale factor for arbitrary real-valued quantities), every
//! quantity the tint field touches is already an exact integer count, so
//! only a saturating decay-multiply and a saturating accumulate are needed.

/// Trail decay factor: `65339 / 65536 ≈ 0.997`.
pub const TRAIL_DECAY_NUM: i64 = 65339;
/// Tumor/creep decay factor: `65208 / 65536 ≈ 0.995`.
pub const TUMOR_DECAY_NUM: i64 = 65208;
pub const DECAY_DEN: i64 = 65536;

pub const MAX_TINT_ACCUM: i32 = 50_000_000;

/// Multiply `value` by `num/den` in fixed point, rounding toward zero.
/// Saturates to `i32::MIN..=i32::MAX` (accumulators never approach that
/// range in practice, but the decay path must never panic on overflow).
pub fn decay(value: i32, num: i64, den: i64) -> i32 {
    let scaled = (value as i64 * num) / den;
    scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Saturating add that clamps the result to `[-MAX_TINT_ACCUM, MAX_TINT_ACCUM]`.
pub fn saturating_tint_add(accum: i32, delta: i32) -> i32 {
    let sum = accum as i64 + delta as i64;
    sum.clamp(-(MAX_TINT_ACCUM as i64), MAX_TINT_ACCUM as i64) as i32
}

/// Epsilon below which a tile is dropped from the active set. Grows as the
/// active set grows, matching the spec's adaptive-epsilon description so
/// large active sets shed low-value tiles faster than small ones.
pub fn tint_epsilon(active_count: usize) -> i32 {
    if active_count > 3000 {
        64
    } else if active_count > 2000 {
        16
    } else if active_count > 1000 {
        4
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_shrinks_toward_zero() {
        let mut v = 1_000_000;
        for _ in 0..10 {
            v = decay(v, TRAIL_DECAY_NUM, DECAY_DEN);
        }
        assert!(v < 1_000_000);
        assert!(v > 0);
    }

    #[test]
    fn decay_reaches_zero_eventually() {
        let mut v = 100;
        let mut iters = 0;
        while v > 0 && iters < 10_000 {
            v = decay(v, TRAIL_DECAY_NUM, DECAY_DEN);
            iters += 1;
        }
        assert_eq!(v, 0);
    }

    #[test]
    fn saturating_add_clamps() {
        assert_eq!(saturating_tint_add(MAX_TINT_ACCUM, 1000), MAX_TINT_ACCUM);
        assert_eq!(saturating_tint_add(-MAX_TINT_ACCUM, -1000), -MAX_TINT_ACCUM);
    }
}
