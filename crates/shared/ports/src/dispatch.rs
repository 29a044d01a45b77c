use async_trait::async_trait;
use bourse_core::OrderId;

use crate::error::DispatchError;

/// Port for scheduling a matching attempt after an order is committed
///
/// Delivery is at-least-once; the handler ignores orders that are no longer open.
#[async_trait]
pub trait MatchDispatcher: Send + Sync {
    async fn dispatch(&self, order_id: OrderId) -> Result<(), DispatchError>;
}
