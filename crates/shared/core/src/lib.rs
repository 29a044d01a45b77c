//! Bourse Core Domain
//!
//! Pure domain types for the Bourse spot exchange.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! Monetary quantities are integers:
//! - fiat balances in minor units (cents)
//! - asset balances in atomic units (`10^-atomic_scale` of one display unit)
//! - prices as a [`FixedPoint`] numerator over `10^price_scale`

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Ledger
    AssetAccount,
    AssetType,
    Balance,
    BalanceError,
    // Fees
    CommissionSchedule,
    Currency,
    DEFAULT_FEE_BPS,
    FeeError,
    FiatAccount,
    // Orders
    NewOrder,
    NewTrade,
    Order,
    OrderStatus,
    Settlement,
    Side,
    StatusTransitionError,
    Trade,
};
pub use values::{
    FixedPoint, FixedPointError, FixedPointResult, OrderId, Symbol, Timestamp, TradeId, UserId,
    notional_units,
};
