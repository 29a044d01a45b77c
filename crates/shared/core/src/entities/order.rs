use crate::entities::{Currency, OrderStatus, Side};
use crate::values::{FixedPoint, OrderId, Symbol, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Order cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Order data as accepted from a client, before it is assigned an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: FixedPoint,
    pub amount_atomic_units: i64,
    /// Fiat minor units (buy) or asset atomic units (sell) reserved at creation
    pub amount_locked_units: i64,
    pub currency: Currency,
    pub idempotency_key: Option<String>,
    pub created_at: Timestamp,
}

impl NewOrder {
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            symbol: self.symbol,
            side: self.side,
            price: self.price,
            amount_atomic_units: self.amount_atomic_units,
            amount_locked_units: self.amount_locked_units,
            currency: self.currency,
            status: OrderStatus::Open,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// A single limit order
///
/// The order owns its `amount_locked_units` reservation until it reaches a terminal
/// status. Orders are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: FixedPoint,
    pub amount_atomic_units: i64,
    pub amount_locked_units: i64,
    pub currency: Currency,
    pub status: OrderStatus,
    pub idempotency_key: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    pub fn price_numerator(&self) -> i64 {
        self.price.numerator()
    }

    pub fn price_scale(&self) -> u32 {
        self.price.scale()
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// True if `counter` is an acceptable opposite order for this one.
    ///
    /// Same symbol and currency, opposite side, still open, and the price crosses: a buy
    /// accepts sellers at or below its price, a sell accepts buyers at or above it.
    pub fn crosses(&self, counter: &Order) -> bool {
        if counter.symbol != self.symbol || counter.side != self.side.opposite() {
            return false;
        }
        if counter.currency != self.currency {
            return false;
        }
        if !counter.is_open() {
            return false;
        }
        let ordering = counter.price.value_cmp(&self.price);
        match self.side {
            Side::Buy => ordering != Ordering::Greater,
            Side::Sell => ordering != Ordering::Less,
        }
    }

    pub fn mark_filled(&mut self, now: Timestamp) -> Result<(), StatusTransitionError> {
        self.transition(OrderStatus::Filled, now)
    }

    pub fn mark_cancelled(&mut self, now: Timestamp) -> Result<(), StatusTransitionError> {
        self.transition(OrderStatus::Cancelled, now)
    }

    fn transition(&mut self, to: OrderStatus, now: Timestamp) -> Result<(), StatusTransitionError> {
        if !self.status.is_open() {
            return Err(StatusTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(id: OrderId, side: Side, price: i64) -> Order {
        NewOrder {
            user_id: 1,
            symbol: Symbol::new("BTC").unwrap(),
            side,
            price: FixedPoint::new(price, 8),
            amount_atomic_units: 10_000_000,
            amount_locked_units: 0,
            currency: Currency::Usd,
            idempotency_key: None,
            created_at: Utc::now(),
        }
        .into_order(id)
    }

    #[test]
    fn test_new_order_is_open() {
        let o = order(7, Side::Buy, 100);
        assert_eq!(o.id, 7);
        assert_eq!(o.status, OrderStatus::Open);
        assert_eq!(o.created_at, o.updated_at);
    }

    #[test]
    fn test_buy_crosses_cheaper_or_equal_sell() {
        let buy = order(1, Side::Buy, 100);
        assert!(buy.crosses(&order(2, Side::Sell, 100)));
        assert!(buy.crosses(&order(3, Side::Sell, 99)));
        assert!(!buy.crosses(&order(4, Side::Sell, 101)));
    }

    #[test]
    fn test_sell_crosses_richer_or_equal_buy() {
        let sell = order(1, Side::Sell, 100);
        assert!(sell.crosses(&order(2, Side::Buy, 100)));
        assert!(sell.crosses(&order(3, Side::Buy, 101)));
        assert!(!sell.crosses(&order(4, Side::Buy, 99)));
    }

    #[test]
    fn test_crossing_ignores_scale() {
        let buy = order(1, Side::Buy, 5_000_000_000_000);
        let mut sell = order(2, Side::Sell, 0);
        sell.price = FixedPoint::new(50_000, 0);
        assert!(buy.crosses(&sell));
    }

    #[test]
    fn test_same_side_or_closed_never_crosses() {
        let buy = order(1, Side::Buy, 100);
        assert!(!buy.crosses(&order(2, Side::Buy, 50)));

        let mut filled = order(3, Side::Sell, 50);
        filled.mark_filled(Utc::now()).unwrap();
        assert!(!buy.crosses(&filled));
    }

    #[test]
    fn test_other_currency_never_crosses() {
        let buy = order(1, Side::Buy, 100);
        let mut sell = order(2, Side::Sell, 100);
        sell.currency = Currency::Ngn;
        assert!(!buy.crosses(&sell));
        assert!(!sell.crosses(&buy));
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut o = order(1, Side::Sell, 100);
        o.mark_cancelled(Utc::now()).unwrap();
        let err = o.mark_filled(Utc::now()).unwrap_err();
        assert_eq!(err.from, OrderStatus::Cancelled);
        assert_eq!(err.to, OrderStatus::Filled);
        assert!(o.mark_cancelled(Utc::now()).is_err());
    }
}
