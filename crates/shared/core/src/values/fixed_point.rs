//! Integer-backed fixed-point values.
//!
//! A [`FixedPoint`] is `numerator / 10^scale` with an `i64` numerator. Conversions from
//! decimal input truncate toward zero, never round. Products of two numerators are formed
//! in `i128`, which holds any `i64 × i64` exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("Invalid decimal input: {0}")]
    InvalidInput(String),

    #[error("{value} has more than {scale} fractional digits")]
    ExcessPrecision { value: String, scale: u32 },

    #[error("Fixed-point overflow: {0}")]
    Overflow(String),
}

pub type FixedPointResult<T> = std::result::Result<T, FixedPointError>;

/// `10^exp` as `i128`, `None` past `10^38`
pub fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint {
    numerator: i64,
    scale: u32,
}

impl FixedPoint {
    pub const fn new(numerator: i64, scale: u32) -> Self {
        Self { numerator, scale }
    }

    pub const fn numerator(&self) -> i64 {
        self.numerator
    }

    pub const fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_positive(&self) -> bool {
        self.numerator > 0
    }

    /// Parse a decimal string into a numerator at `scale`, truncating extra digits.
    ///
    /// `"0.1"` at scale 8 is `10_000_000`; `"0.123456789"` at scale 8 is `12_345_678`.
    pub fn parse(input: &str, scale: u32) -> FixedPointResult<Self> {
        Self::from_decimal(parse_decimal(input)?, scale)
    }

    /// Like [`FixedPoint::parse`] but rejects input carrying more than `scale`
    /// significant fractional digits.
    pub fn parse_exact(input: &str, scale: u32) -> FixedPointResult<Self> {
        let decimal = parse_decimal(input)?;
        if decimal.normalize().scale() > scale {
            return Err(FixedPointError::ExcessPrecision {
                value: input.trim().to_string(),
                scale,
            });
        }
        Self::from_decimal(decimal, scale)
    }

    /// Convert a decimal to a numerator at `scale`, truncating toward zero.
    pub fn from_decimal(value: Decimal, scale: u32) -> FixedPointResult<Self> {
        let mantissa = value.mantissa();
        let source_scale = value.scale();

        let scaled = if scale >= source_scale {
            pow10(scale - source_scale).and_then(|factor| mantissa.checked_mul(factor))
        } else {
            // i128 division truncates toward zero
            pow10(source_scale - scale).map(|divisor| mantissa / divisor)
        };

        let numerator = scaled
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(|| FixedPointError::Overflow(format!("{value} at scale {scale}")))?;

        Ok(Self { numerator, scale })
    }

    pub fn to_decimal(&self) -> FixedPointResult<Decimal> {
        Decimal::try_from_i128_with_scale(i128::from(self.numerator), self.scale)
            .map_err(|e| FixedPointError::Overflow(e.to_string()))
    }

    /// Render with exactly `display_scale` fractional digits.
    ///
    /// Extra digits are truncated and missing ones zero-padded; trailing zeros are kept.
    pub fn format(&self, display_scale: u32) -> String {
        format_units(self.numerator, self.scale, display_scale)
    }

    /// Compare by value, independent of scale.
    pub fn value_cmp(&self, other: &FixedPoint) -> Ordering {
        let (lhs, rhs) = match self.scale.cmp(&other.scale) {
            Ordering::Equal => {
                return self.numerator.cmp(&other.numerator);
            }
            Ordering::Less => (
                rescale_up(self.numerator, other.scale - self.scale),
                Some(i128::from(other.numerator)),
            ),
            Ordering::Greater => (
                Some(i128::from(self.numerator)),
                rescale_up(other.numerator, self.scale - other.scale),
            ),
        };

        match (lhs, rhs) {
            (Some(l), Some(r)) => l.cmp(&r),
            // An overflowing side is larger in magnitude than any i64, its sign decides
            (None, _) => self.numerator.signum().cmp(&0),
            (_, None) => 0.cmp(&other.numerator.signum()),
        }
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(self.scale))
    }
}

fn parse_decimal(input: &str) -> FixedPointResult<Decimal> {
    let trimmed = input.trim();
    trimmed
        .parse::<Decimal>()
        .map_err(|e| FixedPointError::InvalidInput(format!("{trimmed:?}: {e}")))
}

fn rescale_up(numerator: i64, exponent: u32) -> Option<i128> {
    pow10(exponent).and_then(|factor| i128::from(numerator).checked_mul(factor))
}

/// Render `units / 10^scale` with `display_scale` fractional digits.
pub(crate) fn format_units(units: i64, scale: u32, display_scale: u32) -> String {
    let digits = units.unsigned_abs().to_string();
    let scale = scale as usize;
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let display_scale = display_scale as usize;
    let mut fraction: String = frac_part.chars().take(display_scale).collect();
    while fraction.len() < display_scale {
        fraction.push('0');
    }

    let is_zero = int_part.bytes().all(|b| b == b'0') && fraction.bytes().all(|b| b == b'0');
    let sign = if units < 0 && !is_zero { "-" } else { "" };

    if fraction.is_empty() {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{fraction}")
    }
}

/// `price × amount_atomic_units / 10^(price_scale + asset_scale)`, truncated toward zero.
///
/// This is the fiat cost (in minor units) of `amount_atomic_units` of an asset whose
/// smallest division is `10^-asset_scale`.
pub fn notional_units(
    price: FixedPoint,
    amount_atomic_units: i64,
    asset_scale: u32,
) -> FixedPointResult<i64> {
    let product = i128::from(price.numerator) * i128::from(amount_atomic_units);
    let exponent = price
        .scale
        .checked_add(asset_scale)
        .ok_or_else(|| FixedPointError::Overflow("scale exponent".to_string()))?;

    // |product| < 10^38, so a larger divisor always truncates to zero
    let quotient = match pow10(exponent) {
        Some(divisor) => product / divisor,
        None => 0,
    };

    i64::try_from(quotient)
        .map_err(|_| FixedPointError::Overflow(format!("notional {quotient} exceeds i64")))
}
