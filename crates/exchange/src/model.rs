//! Request and view types exchanged with callers of the exchange.

use bourse_core::{
    AssetAccount, AssetType, Currency, FiatAccount, FixedPoint, Order, OrderId, OrderStatus, Side,
    Symbol, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, Result};

/// An order as submitted by a client, quantities as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub symbol: String,
    pub side: Side,
    pub price: String,
    pub amount: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl PlaceOrderRequest {
    pub fn new(
        user_id: UserId,
        symbol: impl Into<String>,
        side: Side,
        price: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            symbol: symbol.into(),
            side,
            price: price.into(),
            amount: amount.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Normalised order parameters for a known asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub price: FixedPoint,
    pub amount_atomic_units: i64,
    pub idempotency_key: Option<String>,
}

impl CreateOrder {
    pub fn new(user_id: UserId, symbol: Symbol, price: FixedPoint, amount_atomic_units: i64) -> Self {
        Self {
            user_id,
            symbol,
            price,
            amount_atomic_units,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Convert a decimal-string request.
    ///
    /// Both values must be positive and carry no more fractional digits than their
    /// scale (price scale for the price, the asset's atomic scale for the amount).
    pub fn from_request(
        request: &PlaceOrderRequest,
        asset: &AssetType,
        price_scale: u32,
    ) -> Result<Self> {
        let price = FixedPoint::parse_exact(&request.price, price_scale)?;
        if !price.is_positive() {
            return Err(ExchangeError::InvalidArgument(format!(
                "price must be positive, got {}",
                request.price.trim()
            )));
        }

        let amount = FixedPoint::parse_exact(&request.amount, asset.atomic_scale)?;
        if !amount.is_positive() {
            return Err(ExchangeError::InvalidArgument(format!(
                "amount must be positive, got {}",
                request.amount.trim()
            )));
        }

        Ok(Self {
            user_id: request.user_id,
            symbol: asset.symbol.clone(),
            price,
            amount_atomic_units: amount.numerator(),
            idempotency_key: request
                .idempotency_key
                .as_ref()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        })
    }
}

/// Order rendered for display
///
/// `price` and `amount` carry exactly the asset's atomic scale in fractional digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: String,
    pub amount: String,
    pub status: OrderStatus,
    pub status_code: u8,
    pub currency: Currency,
    pub created_at: Timestamp,
}

impl OrderView {
    pub fn new(order: &Order, asset: &AssetType) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            symbol: order.symbol.clone(),
            side: order.side,
            price: order.price.format(asset.atomic_scale),
            amount: asset.format_amount(order.amount_atomic_units),
            status: order.status,
            status_code: order.status.code(),
            currency: order.currency,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalanceView {
    pub symbol: Symbol,
    pub available: i64,
    pub locked: i64,
}

impl From<&AssetAccount> for AssetBalanceView {
    fn from(account: &AssetAccount) -> Self {
        Self {
            symbol: account.symbol.clone(),
            available: account.balance.available(),
            locked: account.balance.locked(),
        }
    }
}

/// Snapshot of everything a user holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesView {
    pub user_id: UserId,
    pub currency: Currency,
    pub fiat_available: i64,
    pub fiat_locked: i64,
    pub assets: Vec<AssetBalanceView>,
}

impl BalancesView {
    pub fn new(user_id: UserId, fiat: &FiatAccount, assets: &[AssetAccount]) -> Self {
        Self {
            user_id,
            currency: fiat.currency,
            fiat_available: fiat.balance.available(),
            fiat_locked: fiat.balance.locked(),
            assets: assets.iter().map(AssetBalanceView::from).collect(),
        }
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetBalanceView> {
        self.assets.iter().find(|a| a.symbol.as_str() == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn btc() -> AssetType {
        AssetType::new(Symbol::new("BTC").unwrap(), 8).unwrap()
    }

    #[test]
    fn test_from_request_converts() {
        let request = PlaceOrderRequest::new(1, "btc", Side::Buy, "50000", "0.1");
        let order = CreateOrder::from_request(&request, &btc(), 8).unwrap();
        assert_eq!(order.price.numerator(), 5_000_000_000_000);
        assert_eq!(order.price.scale(), 8);
        assert_eq!(order.amount_atomic_units, 10_000_000);
    }

    #[test]
    fn test_from_request_rejects_excess_precision() {
        let request = PlaceOrderRequest::new(1, "BTC", Side::Sell, "1", "0.123456789");
        let err = CreateOrder::from_request(&request, &btc(), 8).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidArgument(_)));

        let request = PlaceOrderRequest::new(1, "BTC", Side::Sell, "1.000000001", "1");
        assert!(CreateOrder::from_request(&request, &btc(), 8).is_err());
    }

    #[test]
    fn test_from_request_rejects_non_positive() {
        for (price, amount) in [("0", "1"), ("-5", "1"), ("5", "0"), ("5", "-0.1")] {
            let request = PlaceOrderRequest::new(1, "BTC", Side::Buy, price, amount);
            let err = CreateOrder::from_request(&request, &btc(), 8).unwrap_err();
            assert!(
                matches!(err, ExchangeError::InvalidArgument(_)),
                "{price}/{amount}"
            );
        }
    }

    #[test]
    fn test_blank_idempotency_key_dropped() {
        let request = PlaceOrderRequest::new(1, "BTC", Side::Buy, "1", "1").with_idempotency_key("  ");
        let order = CreateOrder::from_request(&request, &btc(), 8).unwrap();
        assert_eq!(order.idempotency_key, None);
    }

    #[test]
    fn test_order_view_uses_asset_scale() {
        let asset = AssetType::new(Symbol::new("BTC").unwrap(), 8).unwrap();
        let order = bourse_core::NewOrder {
            user_id: 1,
            symbol: asset.symbol.clone(),
            side: Side::Sell,
            price: FixedPoint::new(9_500_000_000_000, 8),
            amount_atomic_units: 150_000_000,
            amount_locked_units: 150_000_000,
            currency: Currency::Usd,
            idempotency_key: None,
            created_at: Utc::now(),
        }
        .into_order(3);

        let view = OrderView::new(&order, &asset);
        assert_eq!(view.price, "95000.00000000");
        assert_eq!(view.amount, "1.50000000");
        assert_eq!(view.status_code, 1);
    }
}
