use bourse_core::{Order, OrderId, Symbol, Trade, UserId};
use bourse_ports::{Clock, LedgerStore, MatchLock, OrderFilter, Page, PageRequest};
use log::info;
use std::sync::Arc;

use crate::application::{MatchOutcome, MatchTrigger, MatchingEngine, OrderService};
use crate::config::{ConfigError, ExchangeConfig};
use crate::error::Result;
use crate::infrastructure::{
    InMemoryLedger, InMemoryMatchLock, MatchWorkerPool, SystemClock,
};
use crate::model::{BalancesView, CreateOrder, OrderView, PlaceOrderRequest};

/// Running exchange: order service, matching engine and the match worker pool
pub struct Exchange<S: LedgerStore> {
    store: Arc<S>,
    orders: OrderService<S>,
    engine: Arc<MatchingEngine<S>>,
    workers: MatchWorkerPool,
}

impl<S: LedgerStore> Exchange<S> {
    /// Wire the components over `store` and spawn the match workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        store: Arc<S>,
        config: &ExchangeConfig,
        clock: Arc<dyn Clock>,
        lock: Arc<dyn MatchLock>,
    ) -> Self {
        let engine = Arc::new(
            MatchingEngine::new(
                store.clone(),
                clock.clone(),
                config.commission(),
                config.platform_user_id,
            )
            .with_fee_accounts(config.fee_accounts()),
        );

        let trigger = Arc::new(MatchTrigger::new(
            store.clone(),
            engine.clone(),
            lock,
            config.matching.lease(),
            config.matching.wait(),
        ));

        let (workers, queue) = MatchWorkerPool::start(
            trigger,
            config.matching.workers,
            config.matching.queue_capacity,
        );

        let orders = OrderService::new(
            store.clone(),
            Arc::new(queue.clone()),
            clock,
            config.price_scale,
        )
        .with_idempotency_dedupe(config.dedupe_idempotency_keys)
        .with_default_currency(config.platform_currency);

        info!(
            "Exchange started: fee {} bps, price scale {}, {} match workers",
            config.fee_bps, config.price_scale, config.matching.workers
        );

        Self {
            store,
            orders,
            engine,
            workers,
        }
    }

    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<Order> {
        self.orders.place_order(request).await
    }

    pub async fn create_buy_order(&self, command: CreateOrder) -> Result<Order> {
        self.orders.create_buy_order(command).await
    }

    pub async fn create_sell_order(&self, command: CreateOrder) -> Result<Order> {
        self.orders.create_sell_order(command).await
    }

    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders.cancel_order(order_id).await
    }

    pub async fn cancel_order_as(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        self.orders.cancel_order_as(user_id, order_id).await
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        self.orders.order(order_id).await
    }

    pub async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        self.orders.list_orders(filter, page).await
    }

    pub async fn list_order_views(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<OrderView>> {
        self.orders.list_order_views(filter, page).await
    }

    pub async fn balances(&self, user_id: UserId) -> Result<BalancesView> {
        self.orders.balances(user_id).await
    }

    pub async fn trades(&self, symbol: &Symbol) -> Result<Vec<Trade>> {
        Ok(self.store.trades(symbol).await?)
    }

    /// Run matching for an order directly, bypassing the queue and the symbol lock.
    ///
    /// Safe alongside queued attempts: row locks alone keep settlement consistent.
    pub async fn match_order(&self, order: &Order) -> Result<MatchOutcome> {
        self.engine.match_order(order).await
    }

    /// Wait until the match queue is empty and no job is running
    pub async fn drain(&self) {
        self.workers.drain().await;
    }

    pub async fn shutdown(self) {
        self.workers.shutdown().await;
    }
}

impl Exchange<InMemoryLedger> {
    /// Exchange over a fresh in-memory ledger seeded with the configured asset types
    pub fn in_memory(config: &ExchangeConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let ledger = InMemoryLedger::with_idempotency_index(
            config.row_lock_timeout(),
            config.dedupe_idempotency_keys,
        );
        for asset in config.asset_types()? {
            ledger.register_asset_type(asset);
        }

        Ok(Self::start(
            Arc::new(ledger),
            config,
            Arc::new(SystemClock),
            Arc::new(InMemoryMatchLock::new(config.matching.poll())),
        ))
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.store
    }
}
