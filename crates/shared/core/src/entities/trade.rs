use crate::entities::Order;
use crate::values::{OrderId, Symbol, Timestamp, TradeId};
use serde::{Deserialize, Serialize};

/// Record of a settled match between one buy and one sell order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: Symbol,
    pub amount_atomic_units: i64,
    /// Fiat minor units paid by the buyer at the buy order's price
    pub volume_units: i64,
    /// Fiat minor units withheld from the seller
    pub commission_fee_units: i64,
    pub created_at: Timestamp,
}

/// Trade data computed during settlement, before it is assigned an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: Symbol,
    pub amount_atomic_units: i64,
    pub volume_units: i64,
    pub commission_fee_units: i64,
    pub created_at: Timestamp,
}

impl NewTrade {
    pub fn into_trade(self, id: TradeId) -> Trade {
        Trade {
            id,
            buy_order_id: self.buy_order_id,
            sell_order_id: self.sell_order_id,
            symbol: self.symbol,
            amount_atomic_units: self.amount_atomic_units,
            volume_units: self.volume_units,
            commission_fee_units: self.commission_fee_units,
            created_at: self.created_at,
        }
    }
}

/// Result of a successful match, both orders already `Filled`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub trade: Trade,
    pub buy_order: Order,
    pub sell_order: Order,
    pub volume: i64,
    pub fee: i64,
}

impl Settlement {
    pub fn buy_order_id(&self) -> OrderId {
        self.buy_order.id
    }

    pub fn sell_order_id(&self) -> OrderId {
        self.sell_order.id
    }
}
