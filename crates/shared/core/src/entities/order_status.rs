use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status
///
/// `Open` is the only non-terminal state; an order leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Resting, holding its reservation
    Open,
    /// Settled against a counter-order
    Filled,
    /// Withdrawn by its owner or rejected during matching
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Open)
    }

    /// Stable numeric code (1 = open, 2 = filled, 3 = cancelled)
    pub fn code(&self) -> u8 {
        match self {
            OrderStatus::Open => 1,
            OrderStatus::Filled => 2,
            OrderStatus::Cancelled => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Open => "Open",
            OrderStatus::Filled => "Filled",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
