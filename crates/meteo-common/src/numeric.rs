//! Fixed-point numeric helpers for the wgf4 value encoding.

/// Out-of-band marker substituted for missing or non-finite samples.
pub const NO_DATA: f32 = -100_500.0;

/// Fixed-point scale applied to header geometry fields.
pub const DEFAULT_MULTIPLIER: i64 = 1_000_000;

/// Replace NaN or infinite samples with the [`NO_DATA`] sentinel.
///
/// Applied to every emitted grid value; header fields are never substituted.
pub fn substitute_missing(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        NO_DATA
    }
}

/// Round to 6 decimal digits, then scale to an integer, truncating toward zero.
///
/// Rounding goes through a decimal string round-trip so the result matches
/// "format to 6 decimals, parse back, multiply" exactly; bit-level truncation
/// would diverge on values like 0.1 that have no finite binary expansion.
pub fn to_fixed_point(value: f64, multiplier: i64) -> i64 {
    let rounded: f64 = format!("{value:.6}")
        .parse()
        .expect("formatted float always re-parses");
    (rounded * multiplier as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_missing_nan() {
        assert_eq!(substitute_missing(f32::NAN), NO_DATA);
        assert_eq!(substitute_missing(f32::INFINITY), NO_DATA);
        assert_eq!(substitute_missing(f32::NEG_INFINITY), NO_DATA);
    }

    #[test]
    fn test_substitute_missing_finite_identity() {
        assert_eq!(substitute_missing(0.0), 0.0);
        assert_eq!(substitute_missing(-3.25), -3.25);
        assert_eq!(substitute_missing(NO_DATA), NO_DATA);
    }

    #[test]
    fn test_to_fixed_point_scales_degrees() {
        assert_eq!(to_fixed_point(47.5, DEFAULT_MULTIPLIER), 47_500_000);
        assert_eq!(to_fixed_point(-0.02, DEFAULT_MULTIPLIER), -20_000);
        assert_eq!(to_fixed_point(0.0, DEFAULT_MULTIPLIER), 0);
    }

    #[test]
    fn test_to_fixed_point_rounds_before_scaling() {
        // 6-decimal rounding happens first; the scale then makes it exact.
        assert_eq!(to_fixed_point(13.0000004, DEFAULT_MULTIPLIER), 13_000_000);
        assert_eq!(to_fixed_point(41.4999996, DEFAULT_MULTIPLIER), 41_500_000);
    }

    #[test]
    fn test_to_fixed_point_roundtrip_across_longitudes() {
        let mut lon = -180.0_f64;
        while lon <= 180.0 {
            let encoded = to_fixed_point(lon, DEFAULT_MULTIPLIER);
            let decoded = encoded as f64 / DEFAULT_MULTIPLIER as f64;
            assert!(
                (decoded - lon).abs() < 5e-7,
                "lon {lon} round-tripped to {decoded}"
            );
            lon += 0.4375;
        }
    }
}
