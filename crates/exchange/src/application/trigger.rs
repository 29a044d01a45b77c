use bourse_core::{OrderId, Symbol};
use bourse_ports::{LedgerStore, MatchLock};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::application::{MatchOutcome, MatchingEngine};
use crate::error::Result;

/// What happened to one queued matching job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    OrderMissing,
    NotOpen,
    /// Another attempt held the symbol lock for the whole wait; the job is dropped
    LockBusy,
    Attempted(MatchOutcome),
}

/// Runs one matching attempt per order id, serialized per symbol
pub struct MatchTrigger<S: LedgerStore> {
    store: Arc<S>,
    engine: Arc<MatchingEngine<S>>,
    lock: Arc<dyn MatchLock>,
    lease: Duration,
    wait: Duration,
}

impl<S: LedgerStore> MatchTrigger<S> {
    pub fn new(
        store: Arc<S>,
        engine: Arc<MatchingEngine<S>>,
        lock: Arc<dyn MatchLock>,
        lease: Duration,
        wait: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            lock,
            lease,
            wait,
        }
    }

    pub fn lock_name(symbol: &Symbol) -> String {
        format!("match:{symbol}")
    }

    /// Handle a queued job. Safe to run more than once for the same order.
    pub async fn handle(&self, order_id: OrderId) -> Result<TriggerOutcome> {
        let Some(order) = self.store.order(order_id).await? else {
            debug!("Order {} vanished before matching", order_id);
            return Ok(TriggerOutcome::OrderMissing);
        };
        if !order.is_open() {
            debug!("Order {} is {}, skipping match", order_id, order.status);
            return Ok(TriggerOutcome::NotOpen);
        }

        let name = Self::lock_name(&order.symbol);
        let Some(lease) = self.lock.acquire(&name, self.lease, self.wait).await? else {
            // No retry: the next order on this symbol triggers matching again
            info!(
                "Lock {} busy for {:?}, dropping match attempt for order {}",
                name, self.wait, order_id
            );
            return Ok(TriggerOutcome::LockBusy);
        };

        let result = self.engine.match_order(&order).await;

        match self.lock.release(&lease).await {
            Ok(true) => {}
            Ok(false) => warn!("Lease on {} expired before release (order {})", name, order_id),
            Err(e) => warn!("Failed to release {}: {}", name, e),
        }

        result.map(TriggerOutcome::Attempted)
    }
}
