//! Order lifecycle: creation with reservation, cancellation with release, queries.

use bourse_core::{
    AssetType, Currency, NewOrder, Order, OrderId, Side, Symbol, UserId, notional_units,
};
use bourse_ports::{
    Clock, LedgerStore, LedgerTransaction, MatchDispatcher, OrderFilter, Page, PageRequest,
    StoreError,
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ExchangeError, Result};
use crate::model::{BalancesView, CreateOrder, OrderView, PlaceOrderRequest};

pub struct OrderService<S: LedgerStore> {
    store: Arc<S>,
    dispatcher: Arc<dyn MatchDispatcher>,
    clock: Arc<dyn Clock>,
    price_scale: u32,
    dedupe_idempotency_keys: bool,
    default_currency: Currency,
}

impl<S: LedgerStore> OrderService<S> {
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<dyn MatchDispatcher>,
        clock: Arc<dyn Clock>,
        price_scale: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            price_scale,
            dedupe_idempotency_keys: true,
            default_currency: Currency::default(),
        }
    }

    pub fn with_idempotency_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_idempotency_keys = enabled;
        self
    }

    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    // ========== Commands ==========

    /// Normalise a decimal-string request and create the order on its side
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<Order> {
        let symbol = Symbol::new(request.symbol.as_str())
            .map_err(|e| ExchangeError::InvalidArgument(format!("symbol: {e}")))?;
        let asset = self.asset_type(&symbol).await?;
        let command = CreateOrder::from_request(&request, &asset, self.price_scale)?;

        match request.side {
            Side::Buy => self.create_buy_order(command).await,
            Side::Sell => self.create_sell_order(command).await,
        }
    }

    /// Reserve the fiat cost of the order and persist it as open
    pub async fn create_buy_order(&self, command: CreateOrder) -> Result<Order> {
        validate(&command)?;
        let asset = self.asset_type(&command.symbol).await?;
        if let Some(existing) = self.existing_order(&command).await? {
            return Ok(existing);
        }

        let mut tx = self.store.begin().await?;
        let mut fiat = tx
            .lock_fiat(command.user_id)
            .await?
            .ok_or(ExchangeError::UserNotFound(command.user_id))?;

        let cost = notional_units(
            command.price,
            command.amount_atomic_units,
            asset.atomic_scale,
        )?;
        if cost <= 0 {
            return Err(ExchangeError::InvalidComputation(format!(
                "order cost must be positive, got {cost} for {} units at {}",
                command.amount_atomic_units, command.price
            )));
        }

        fiat.balance
            .reserve(cost)
            .map_err(|e| ExchangeError::insufficient(fiat.currency.code(), e))?;
        let currency = fiat.currency;
        tx.put_fiat(fiat)?;

        let order = tx.insert_order(self.new_order(command, Side::Buy, cost, currency))?;
        self.commit_and_dispatch(tx, order).await
    }

    /// Reserve the asset units of the order and persist it as open
    pub async fn create_sell_order(&self, command: CreateOrder) -> Result<Order> {
        validate(&command)?;
        self.asset_type(&command.symbol).await?;
        if let Some(existing) = self.existing_order(&command).await? {
            return Ok(existing);
        }

        let mut tx = self.store.begin().await?;

        // Proceeds settle into the seller's fiat account, so the order takes its currency
        let currency = tx
            .lock_fiat(command.user_id)
            .await?
            .map_or(self.default_currency, |a| a.currency);

        let amount = command.amount_atomic_units;
        let mut holding = tx
            .lock_asset(command.user_id, &command.symbol)
            .await?
            .ok_or_else(|| ExchangeError::InsufficientBalance {
                asset: command.symbol.to_string(),
                requested: amount,
                available: 0,
            })?;

        holding
            .balance
            .reserve(amount)
            .map_err(|e| ExchangeError::insufficient(command.symbol.as_str(), e))?;
        tx.put_asset(holding)?;

        let order = tx.insert_order(self.new_order(command, Side::Sell, amount, currency))?;
        self.commit_and_dispatch(tx, order).await
    }

    /// Cancel an open order and hand its reservation back to the owner.
    ///
    /// The status check happens under the order's row lock, so a concurrent match and
    /// cancel cannot both succeed.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or(ExchangeError::OrderNotFound(order_id))?;

        if !order.is_open() {
            return Err(ExchangeError::InvalidOrderStatus {
                order_id,
                status: order.status,
            });
        }
        order.mark_cancelled(self.clock.now())?;

        match order.side {
            Side::Buy => {
                let mut fiat = tx
                    .lock_fiat(order.user_id)
                    .await?
                    .ok_or(ExchangeError::UserNotFound(order.user_id))?;
                fiat.balance.release(order.amount_locked_units)?;
                tx.put_fiat(fiat)?;
            }
            Side::Sell => {
                let mut holding = tx
                    .lock_asset(order.user_id, &order.symbol)
                    .await?
                    .ok_or_else(|| {
                        ExchangeError::InvalidComputation(format!(
                            "order {} holds {} {} but the holding is missing",
                            order.id, order.amount_locked_units, order.symbol
                        ))
                    })?;
                holding.balance.release(order.amount_locked_units)?;
                tx.put_asset(holding)?;
            }
        }

        tx.put_order(order.clone())?;
        tx.commit().await?;

        info!(
            "Cancelled {} order {} for user {} on {}, released {}",
            order.side, order.id, order.user_id, order.symbol, order.amount_locked_units
        );
        Ok(order)
    }

    /// Cancel on behalf of `user_id`, who must own the order
    pub async fn cancel_order_as(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = self.order(order_id).await?;
        if order.user_id != user_id {
            return Err(ExchangeError::NotOrderOwner { order_id, user_id });
        }
        self.cancel_order(order_id).await
    }

    // ========== Queries ==========

    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or(ExchangeError::OrderNotFound(order_id))
    }

    pub async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        Ok(self.store.list_orders(filter, page).await?)
    }

    /// Like [`list_orders`](Self::list_orders), rendered for display
    pub async fn list_order_views(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<Page<OrderView>> {
        let orders = self.store.list_orders(filter, page).await?;
        let assets: HashMap<Symbol, AssetType> = self
            .store
            .asset_types()
            .await?
            .into_iter()
            .map(|a| (a.symbol.clone(), a))
            .collect();

        orders.try_map(|order| {
            assets
                .get(&order.symbol)
                .map(|asset| OrderView::new(&order, asset))
                .ok_or_else(|| ExchangeError::UnknownAsset(order.symbol.to_string()))
        })
    }

    pub async fn balances(&self, user_id: UserId) -> Result<BalancesView> {
        let fiat = self
            .store
            .fiat_account(user_id)
            .await?
            .ok_or(ExchangeError::UserNotFound(user_id))?;
        let assets = self.store.asset_accounts(user_id).await?;
        Ok(BalancesView::new(user_id, &fiat, &assets))
    }

    // ========== Internals ==========

    async fn asset_type(&self, symbol: &Symbol) -> Result<AssetType> {
        self.store
            .asset_type(symbol)
            .await?
            .ok_or_else(|| ExchangeError::UnknownAsset(symbol.to_string()))
    }

    async fn existing_order(&self, command: &CreateOrder) -> Result<Option<Order>> {
        if !self.dedupe_idempotency_keys {
            return Ok(None);
        }
        let Some(key) = &command.idempotency_key else {
            return Ok(None);
        };
        let existing = self
            .store
            .order_by_idempotency_key(command.user_id, key)
            .await?;
        if let Some(order) = &existing {
            info!(
                "Idempotency key {:?} already used by user {}, returning order {}",
                key, command.user_id, order.id
            );
        }
        Ok(existing)
    }

    fn new_order(&self, command: CreateOrder, side: Side, locked: i64, currency: Currency) -> NewOrder {
        NewOrder {
            user_id: command.user_id,
            symbol: command.symbol,
            side,
            price: command.price,
            amount_atomic_units: command.amount_atomic_units,
            amount_locked_units: locked,
            currency,
            idempotency_key: command.idempotency_key,
            created_at: self.clock.now(),
        }
    }

    async fn commit_and_dispatch(&self, tx: S::Tx, order: Order) -> Result<Order> {
        match tx.commit().await {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey { user_id, key }) => {
                // Lost a race with an identical submission; its reservation stands, ours rolled back
                return match self.store.order_by_idempotency_key(user_id, &key).await? {
                    Some(existing) => {
                        info!(
                            "Idempotency key {:?} raced for user {}, returning order {}",
                            key, user_id, existing.id
                        );
                        Ok(existing)
                    }
                    None => Err(StoreError::DuplicateIdempotencyKey { user_id, key }.into()),
                };
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Created {} order {} for user {} on {}: {} units at {}, locked {}",
            order.side,
            order.id,
            order.user_id,
            order.symbol,
            order.amount_atomic_units,
            order.price,
            order.amount_locked_units
        );

        // The order stays open if this fails; the next order on the symbol retries matching
        if let Err(e) = self.dispatcher.dispatch(order.id).await {
            warn!("Could not queue match for order {}: {}", order.id, e);
        } else {
            debug!("Match queued for order {}", order.id);
        }
        Ok(order)
    }
}

fn validate(command: &CreateOrder) -> Result<()> {
    if command.amount_atomic_units <= 0 {
        return Err(ExchangeError::InvalidArgument(format!(
            "amount must be positive, got {}",
            command.amount_atomic_units
        )));
    }
    if !command.price.is_positive() {
        return Err(ExchangeError::InvalidArgument(format!(
            "price must be positive, got {}",
            command.price
        )));
    }
    Ok(())
}
