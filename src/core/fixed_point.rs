/*!
 * Fixed-Point Arithmetic
 * 17.14 signed fixed-point numbers for the MLFQS formulas
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Number of fractional bits
pub const FRACTION_BITS: u32 = 14;

/// Scale factor `1 << FRACTION_BITS`
const F: i32 = 1 << FRACTION_BITS;

/// 17.14 fixed-point value
///
/// Integer operands are accepted on the right-hand side of every operator, so
/// `load_avg * 2 + 1` reads the way the scheduling formulas are written.
///
/// # Performance
/// Multiplication and division widen to `i64` for the intermediate product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(F);

    /// Convert an integer
    #[inline(always)]
    pub const fn from_int(n: i32) -> Self {
        Self(n * F)
    }

    /// Wrap a raw 17.14 bit pattern
    #[inline(always)]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw 17.14 bit pattern
    #[inline(always)]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Truncate toward zero
    #[inline(always)]
    pub const fn trunc(self) -> i32 {
        self.0 / F
    }

    /// Round to nearest, halves away from zero
    #[inline]
    pub const fn round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }

    /// `self / rhs` for two fixed-point values
    #[inline]
    pub const fn div_fixed(self, rhs: Fixed) -> Self {
        Self(((self.0 as i64) * (F as i64) / (rhs.0 as i64)) as i32)
    }

    /// `self * rhs` for two fixed-point values
    #[inline]
    pub const fn mul_fixed(self, rhs: Fixed) -> Self {
        Self(((self.0 as i64) * (rhs.0 as i64) / (F as i64)) as i32)
    }

    /// Lossy conversion for display and assertions
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / F as f64
    }
}

impl Add for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Add<i32> for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn add(self, rhs: i32) -> Fixed {
        Fixed(self.0 + rhs * F)
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn sub(self, rhs: i32) -> Fixed {
        Fixed(self.0 - rhs * F)
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn mul(self, rhs: Fixed) -> Fixed {
        self.mul_fixed(rhs)
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn mul(self, rhs: i32) -> Fixed {
        Fixed(self.0 * rhs)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn div(self, rhs: Fixed) -> Fixed {
        self.div_fixed(rhs)
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn div(self, rhs: i32) -> Fixed {
        Fixed(self.0 / rhs)
    }
}

impl From<i32> for Fixed {
    fn from(n: i32) -> Self {
        Self::from_int(n)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_integer_round_trip() {
        assert_eq!(Fixed::from_int(5).trunc(), 5);
        assert_eq!(Fixed::from_int(-5).round(), -5);
        assert_eq!(Fixed::ONE.raw(), 16384);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let half = Fixed::ONE / 2;
        assert_eq!(half.round(), 1);
        assert_eq!((Fixed::ZERO - half).round(), -1);
        assert_eq!((Fixed::from_int(2) + half).round(), 3);
        assert_eq!((Fixed::from_int(-2) - half).round(), -3);
        assert_eq!((Fixed::from_int(7) / 4).round(), 2);
        assert_eq!((Fixed::from_int(5) / 4).round(), 1);
    }

    #[test]
    fn test_truncation() {
        assert_eq!((Fixed::from_int(7) / 2).trunc(), 3);
        assert_eq!((Fixed::from_int(-7) / 2).trunc(), -3);
    }

    #[test]
    fn test_mixed_arithmetic() {
        let x = Fixed::from_int(3);
        assert_eq!((x + 2).trunc(), 5);
        assert_eq!((x - 4).trunc(), -1);
        assert_eq!((x * 4).trunc(), 12);
        assert_eq!((x * Fixed::from_int(3)).trunc(), 9);
        assert_eq!((Fixed::from_int(9) / Fixed::from_int(3)).trunc(), 3);
    }

    #[test]
    fn test_load_average_coefficients() {
        // (59/60) * 0 + (1/60) * 1, scaled by 100 and rounded
        let decay = Fixed::from_int(59) / 60;
        let gain = Fixed::from_int(1) / 60;
        let load = decay * Fixed::ZERO + gain * 1;
        assert_eq!((load * 100).round(), 2);
    }

    proptest! {
        #[test]
        fn prop_round_matches_float(a in -100_000i32..100_000, b in 1i32..1_000) {
            let value = Fixed::from_int(a) / b;
            let expected = (a as f64 / b as f64).round() as i32;
            // Integer division truncates the raw value, so allow one unit of slack
            prop_assert!((value.round() - expected).abs() <= 1);
        }

        #[test]
        fn prop_mul_div_inverse(a in -1_000i32..1_000, b in 1i32..100) {
            let x = Fixed::from_int(a);
            let y = Fixed::from_int(b);
            prop_assert_eq!(((x * y) / y).round(), a);
        }

        #[test]
        fn prop_round_is_monotonic(a in -1_000_000i32..1_000_000, d in 0i32..100_000) {
            prop_assert!(Fixed::from_raw(a).round() <= Fixed::from_raw(a + d).round());
        }
    }
}
