//! Numeric helpers with WebAssembly semantics where Rust's differ.

use crate::trap::{Trap, TrapKind};

/// `fN.min`: NaN if either operand is NaN, and -0 is less than +0.
macro_rules! float_min_max {
    ($min:ident, $max:ident, $ty:ty) => {
        pub(crate) fn $min(a: $ty, b: $ty) -> $ty {
            if a.is_nan() || b.is_nan() {
                <$ty>::NAN
            } else if a == b {
                if a.is_sign_negative() { a } else { b }
            } else {
                a.min(b)
            }
        }

        pub(crate) fn $max(a: $ty, b: $ty) -> $ty {
            if a.is_nan() || b.is_nan() {
                <$ty>::NAN
            } else if a == b {
                if a.is_sign_positive() { a } else { b }
            } else {
                a.max(b)
            }
        }
    };
}

float_min_max!(f32_min, f32_max, f32);
float_min_max!(f64_min, f64_max, f64);

fn invalid(value: f64) -> Trap {
    if value.is_nan() {
        Trap::with_message(TrapKind::InvalidConversionToInteger, "NaN")
    } else {
        Trap::with_message(TrapKind::IntegerOverflow, format!("{value} out of range"))
    }
}

/// Truncate toward zero, trapping on NaN and on values outside
/// `(lower, upper)`. Every `f32` is exactly representable as `f64`, so both
/// widths go through here.
fn checked_trunc(value: f64, lower_exclusive: f64, upper_exclusive: f64) -> Result<f64, Trap> {
    if value.is_nan() {
        return Err(invalid(value));
    }
    let t = value.trunc();
    if t <= lower_exclusive || t >= upper_exclusive {
        return Err(invalid(value));
    }
    Ok(t)
}

pub(crate) fn i32_trunc_s(value: f64) -> Result<i32, Trap> {
    checked_trunc(value, -2_147_483_649.0, 2_147_483_648.0).map(|t| t as i32)
}

pub(crate) fn i32_trunc_u(value: f64) -> Result<i32, Trap> {
    checked_trunc(value, -1.0, 4_294_967_296.0).map(|t| t as u32 as i32)
}

pub(crate) fn i64_trunc_s(value: f64) -> Result<i64, Trap> {
    // -2^63 is exact; anything below it is out of range.
    if value.trunc() == -9_223_372_036_854_775_808.0 {
        return Ok(i64::MIN);
    }
    checked_trunc(value, -9_223_372_036_854_775_808.0, 9_223_372_036_854_775_808.0).map(|t| t as i64)
}

pub(crate) fn i64_trunc_u(value: f64) -> Result<i64, Trap> {
    checked_trunc(value, -1.0, 18_446_744_073_709_551_616.0).map(|t| t as u64 as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_follow_wasm() {
        assert!(f32_min(f32::NAN, 1.0).is_nan());
        assert!(f64_max(1.0, f64::NAN).is_nan());
        assert!(f32_min(0.0, -0.0).is_sign_negative());
        assert!(f32_max(-0.0, 0.0).is_sign_positive());
        assert_eq!(f64_min(1.0, 2.0), 1.0);
        assert_eq!(f64_max(1.0, 2.0), 2.0);
    }

    #[test]
    fn trunc_traps_outside_range() {
        assert_eq!(i32_trunc_s(-2_147_483_648.9).unwrap(), i32::MIN);
        assert_eq!(i32_trunc_s(2_147_483_647.9).unwrap(), i32::MAX);
        assert!(i32_trunc_s(2_147_483_648.0).is_err());
        assert_eq!(i32_trunc_u(-0.9).unwrap(), 0);
        assert_eq!(i32_trunc_u(4_294_967_295.0).unwrap(), -1);
        assert!(i32_trunc_u(-1.0).is_err());
        assert_eq!(i64_trunc_s(-9_223_372_036_854_775_808.0).unwrap(), i64::MIN);
        assert!(i64_trunc_s(9_223_372_036_854_775_808.0).is_err());
        assert_eq!(i64_trunc_u(1e19).unwrap(), 10_000_000_000_000_000_000u64 as i64);

        let nan = i32_trunc_s(f64::NAN).unwrap_err();
        assert_eq!(nan.kind, TrapKind::InvalidConversionToInteger);
        assert_eq!(i64_trunc_u(1e30).unwrap_err().kind, TrapKind::IntegerOverflow);
    }
}
