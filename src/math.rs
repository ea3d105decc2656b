// 1.0: fixed point money math. every balance, price, rate and index in the
// engine is an unsigned 18-decimal scaled integer. products are carried
// through a 256-bit intermediate so mul/div never lose range, and the
// floor/ceil variants are explicit at each call site so rounding direction
// is always a visible choice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scale factor: 1.0 == 10^18.
pub const BASE: u128 = 1_000_000_000_000_000_000;

/// Reciprocal of the error tolerated by [`Fixed::partial_floor`]: the
/// truncated remainder may reach at most 1/1000 (0.1%) of the
/// denominator-target product.
pub const ROUNDING_TOLERANCE_RECIP: u128 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("rounding error exceeds tolerance")]
    RoundingError,

    #[error("value not representable in 18-decimal fixed point")]
    NotRepresentable,
}

/// Unsigned 18-decimal fixed point scalar.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Fixed(u128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(BASE);

    /// Wrap an already-scaled raw value.
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Whole units, e.g. `from_int(20)` == 20.0.
    pub const fn from_int(units: u64) -> Self {
        Self(units as u128 * BASE)
    }

    /// Percent helper: `percent(110)` == 1.10.
    pub const fn percent(pct: u64) -> Self {
        Self(pct as u128 * (BASE / 100))
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn min(self, other: Fixed) -> Fixed {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Fixed) -> Fixed {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn add(self, other: Fixed) -> Result<Fixed, MathError> {
        self.0
            .checked_add(other.0)
            .map(Fixed)
            .ok_or(MathError::Overflow)
    }

    pub fn sub(self, other: Fixed) -> Result<Fixed, MathError> {
        self.0
            .checked_sub(other.0)
            .map(Fixed)
            .ok_or(MathError::Underflow)
    }

    /// `self - other`, clamped at zero instead of failing.
    pub fn saturating_sub(self, other: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(other.0))
    }

    /// floor(a * b / BASE)
    pub fn mul_floor(self, other: Fixed) -> Result<Fixed, MathError> {
        let (quotient, _) = mul_div_wide(self.0, other.0, BASE)?;
        Ok(Fixed(quotient))
    }

    /// ceil(a * b / BASE)
    pub fn mul_ceil(self, other: Fixed) -> Result<Fixed, MathError> {
        let (quotient, remainder) = mul_div_wide(self.0, other.0, BASE)?;
        if remainder == 0 {
            Ok(Fixed(quotient))
        } else {
            quotient
                .checked_add(1)
                .map(Fixed)
                .ok_or(MathError::Overflow)
        }
    }

    /// floor(a * BASE / b)
    pub fn div_floor(self, other: Fixed) -> Result<Fixed, MathError> {
        let (quotient, _) = mul_div_wide(self.0, BASE, other.0)?;
        Ok(Fixed(quotient))
    }

    /// ceil(a * BASE / b)
    pub fn div_ceil(self, other: Fixed) -> Result<Fixed, MathError> {
        let (quotient, remainder) = mul_div_wide(self.0, BASE, other.0)?;
        if remainder == 0 {
            Ok(Fixed(quotient))
        } else {
            quotient
                .checked_add(1)
                .map(Fixed)
                .ok_or(MathError::Overflow)
        }
    }

    /// floor(numerator * target / denominator), failing with `RoundingError`
    /// when the truncated remainder reaches 1/[`ROUNDING_TOLERANCE_RECIP`]
    /// of `denominator * target`. Used wherever a partial amount is derived
    /// pro-rata from declared totals, so truncation stays a bounded share of
    /// the scaled target.
    pub fn partial_floor(
        numerator: Fixed,
        denominator: Fixed,
        target: Fixed,
    ) -> Result<Fixed, MathError> {
        if numerator.0 == 0 || target.0 == 0 {
            if denominator.0 == 0 {
                return Err(MathError::DivisionByZero);
            }
            return Ok(Fixed::ZERO);
        }
        let (partial, remainder) = mul_div_wide(numerator.0, target.0, denominator.0)?;
        if remainder != 0 {
            // remainder * 1000 >= denominator * target  =>  error of 0.1% or more
            let loss = mul_wide(remainder, ROUNDING_TOLERANCE_RECIP);
            let bound = mul_wide(denominator.0, target.0);
            if loss >= bound {
                return Err(MathError::RoundingError);
            }
        }
        Ok(Fixed(partial))
    }

    /// Compares `a_num/a_den` against `b_num/b_den` exactly, by
    /// cross-multiplying into 256-bit products. No rounding, so prices that
    /// differ in the last raw digit still order correctly.
    pub fn ratio_cmp(
        a_num: Fixed,
        a_den: Fixed,
        b_num: Fixed,
        b_den: Fixed,
    ) -> Result<Ordering, MathError> {
        if a_den.0 == 0 || b_den.0 == 0 {
            return Err(MathError::DivisionByZero);
        }
        let lhs = mul_wide(a_num.0, b_den.0);
        let rhs = mul_wide(b_num.0, a_den.0);
        Ok(lhs.cmp(&rhs))
    }

    /// Exact conversion from a decimal literal; truncates fractional digits
    /// beyond 18 places, rejects negatives.
    pub fn from_decimal(value: Decimal) -> Result<Fixed, MathError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::NotRepresentable);
        }
        let mantissa = value.mantissa().unsigned_abs();
        let scale = value.scale();
        let raw = if scale <= 18 {
            let pow = 10u128.checked_pow(18 - scale).ok_or(MathError::Overflow)?;
            mantissa.checked_mul(pow).ok_or(MathError::Overflow)?
        } else {
            let pow = 10u128.checked_pow(scale - 18).ok_or(MathError::Overflow)?;
            mantissa / pow
        };
        Ok(Fixed(raw))
    }

    /// Decimal view for reporting; fails only for values beyond Decimal's
    /// 96-bit mantissa range.
    pub fn to_decimal(&self) -> Result<Decimal, MathError> {
        let raw = i128::try_from(self.0).map_err(|_| MathError::NotRepresentable)?;
        Decimal::try_from_i128_with_scale(raw, 18).map_err(|_| MathError::NotRepresentable)
    }
}

/// Full 256-bit product of two u128 values as (hi, lo) limbs.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let (mid, mid_overflow) = lh.overflowing_add(hl);
    let (lo, lo_carry) = ll.overflowing_add(mid << 64);
    let hi = hh + ((mid_overflow as u128) << 64) + (mid >> 64) + lo_carry as u128;
    (hi, lo)
}

/// floor(a * b / divisor) with its remainder, exact over the full u128 range.
/// Fails when the divisor is zero or the quotient exceeds u128.
fn mul_div_wide(a: u128, b: u128, divisor: u128) -> Result<(u128, u128), MathError> {
    if divisor == 0 {
        return Err(MathError::DivisionByZero);
    }
    let (hi, lo) = mul_wide(a, b);
    if hi == 0 {
        return Ok((lo / divisor, lo % divisor));
    }
    if hi >= divisor {
        return Err(MathError::Overflow);
    }
    // bit-at-a-time long division of the 256-bit product
    let mut rem = hi;
    let mut quotient: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        if carry == 1 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quotient |= 1 << i;
        }
    }
    Ok((quotient, rem))
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / BASE;
        let frac = self.0 % BASE;
        if frac == 0 {
            return write!(f, "{int}");
        }
        let digits = format!("{frac:018}");
        write!(f, "{int}.{}", digits.trim_end_matches('0'))
    }
}
