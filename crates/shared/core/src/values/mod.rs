mod fixed_point;
mod symbol;

use chrono::{DateTime, Utc};

pub use fixed_point::{FixedPoint, FixedPointError, FixedPointResult, notional_units, pow10};
pub(crate) use fixed_point::format_units;
pub use symbol::Symbol;

/// Owner of fiat and asset accounts
pub type UserId = u64;

/// Orders are numbered in insertion order; a lower id was created earlier
pub type OrderId = u64;

/// Identifier of a settled trade
pub type TradeId = u64;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;
