// Signed 16.16 fixed point. Every timing comparison in gameplay goes through
// this type so a replayed session lands on the exact same raw values.

use bincode::{Decode, Encode};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

pub const FRAC_BITS: u32 = 16;
const ONE_RAW: i32 = 1 << FRAC_BITS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Fixed(i32);

/// Seconds.
pub type FixedTime = Fixed;

impl Fixed {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_RAW);
    pub const MIN: Self = Self(i32::MIN);
    pub const MAX: Self = Self(i32::MAX);
    /// Smallest positive step.
    #[cfg(test)]
    pub const EPSILON: Self = Self(1);

    #[inline(always)]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline(always)]
    pub const fn from_int(v: i32) -> Self {
        Self(v.wrapping_mul(ONE_RAW))
    }

    /// Truncating conversion used for compile-time constants and the chart
    /// compiler. Never used on the per-frame path.
    #[inline(always)]
    pub const fn from_f64(v: f64) -> Self {
        Self((v * ONE_RAW as f64) as i32)
    }

    /// `n / d` computed in fixed point, truncating toward zero.
    #[inline(always)]
    pub const fn from_ratio(n: i32, d: i32) -> Self {
        Self((((n as i64) << FRAC_BITS) / d as i64) as i32)
    }

    /// Integer part, rounding toward negative infinity.
    #[inline(always)]
    pub const fn floor_int(self) -> i32 {
        self.0 >> FRAC_BITS
    }

    /// Integer part, rounding toward zero.
    #[inline(always)]
    pub const fn trunc_int(self) -> i32 {
        self.0 / ONE_RAW
    }

    #[inline(always)]
    pub const fn abs(self) -> Self {
        Self(self.0.wrapping_abs())
    }

    #[inline(always)]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline(always)]
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / f64::from(ONE_RAW)
    }

    #[inline(always)]
    pub const fn mul_int(self, v: i32) -> Self {
        Self(self.0.wrapping_mul(v))
    }

    #[inline(always)]
    pub const fn div_int(self, v: i32) -> Self {
        Self(self.0 / v)
    }

    #[inline(always)]
    pub const fn const_mul(self, rhs: Self) -> Self {
        Self(((self.0 as i64 * rhs.0 as i64) >> FRAC_BITS) as i32)
    }
}

impl Add for Fixed {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Fixed {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl Mul for Fixed {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        self.const_mul(rhs)
    }
}

impl Div for Fixed {
    type Output = Self;
    #[inline(always)]
    fn div(self, rhs: Self) -> Self {
        Self((((self.0 as i64) << FRAC_BITS) / rhs.0 as i64) as i32)
    }
}

impl Mul<i32> for Fixed {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: i32) -> Self {
        self.mul_int(rhs)
    }
}

impl Div<i32> for Fixed {
    type Output = Self;
    #[inline(always)]
    fn div(self, rhs: i32) -> Self {
        self.div_int(rhs)
    }
}

impl AddAssign for Fixed {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fixed {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Fixed {
    #[inline(always)]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign<i32> for Fixed {
    #[inline(always)]
    fn div_assign(&mut self, rhs: i32) {
        *self = *self / rhs;
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}
