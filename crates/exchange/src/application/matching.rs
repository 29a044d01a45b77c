//! Single-counterparty matching and settlement.
//!
//! An incoming order is paired with at most one resting order: the earliest open
//! opposite-side order on the same symbol whose price crosses and whose amount is exactly
//! equal, settling in the same fiat currency. Everything happens in one ledger
//! transaction. Row locks are taken order rows first (ascending id), then fiat rows by
//! ascending user id, then asset rows by ascending user id.

use bourse_core::{
    AssetAccount, CommissionSchedule, Currency, FiatAccount, NewTrade, Order, OrderId,
    Settlement, Side, UserId, notional_units,
};
use bourse_ports::{Clock, LedgerStore, LedgerTransaction};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{ExchangeError, Result};

/// Why a matched pair was abandoned during re-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Buyer's locked fiat no longer covers the trade
    BuyerFundsShort { required: i64, locked: i64 },
    /// Seller's locked asset no longer covers the amount
    SellerAssetsShort { required: i64, locked: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Both orders filled and balances moved
    Settled(Box<Settlement>),
    /// A counter-order was found but one side failed re-validation and was cancelled
    Rejected {
        order_id: OrderId,
        reason: RejectReason,
    },
    /// No open crossing order on the other side in the same currency
    NoCounterparty,
    /// The earliest crossing order has a different amount; partial fills are not supported
    QuantityMismatch {
        order_id: OrderId,
        counter_order_id: OrderId,
    },
    /// The order is missing or already terminal
    Inactive,
}

impl MatchOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchOutcome::Settled(_) => "settled",
            MatchOutcome::Rejected { .. } => "rejected",
            MatchOutcome::NoCounterparty => "no-counterparty",
            MatchOutcome::QuantityMismatch { .. } => "quantity-mismatch",
            MatchOutcome::Inactive => "inactive",
        }
    }
}

/// Counter-orders that closed between lookup and locking before we give up
const MAX_STALE_COUNTERS: usize = 8;

pub struct MatchingEngine<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    commission: CommissionSchedule,
    fee_accounts: BTreeMap<Currency, UserId>,
}

impl<S: LedgerStore> MatchingEngine<S> {
    /// Engine crediting commissions on default-currency trades to `platform_user_id`
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        commission: CommissionSchedule,
        platform_user_id: UserId,
    ) -> Self {
        Self {
            store,
            clock,
            commission,
            fee_accounts: BTreeMap::from([(Currency::default(), platform_user_id)]),
        }
    }

    /// Replace the fee account table; one platform user per settlement currency
    pub fn with_fee_accounts(mut self, fee_accounts: BTreeMap<Currency, UserId>) -> Self {
        self.fee_accounts = fee_accounts;
        self
    }

    pub fn commission(&self) -> CommissionSchedule {
        self.commission
    }

    pub fn fee_account(&self, currency: Currency) -> Option<UserId> {
        self.fee_accounts.get(&currency).copied()
    }

    /// Try to settle `order` against one resting counter-order.
    ///
    /// The counter-order is looked up without locks, then both order rows are locked in
    /// ascending id order and re-checked. A counter that closed in between is skipped.
    ///
    /// "Nothing to do" outcomes are values, not errors. Errors are infrastructure
    /// failures or ledger inconsistencies; the transaction is rolled back in that case.
    pub async fn match_order(&self, order: &Order) -> Result<MatchOutcome> {
        for _ in 0..MAX_STALE_COUNTERS {
            let Some(current) = self.store.order(order.id).await? else {
                return Ok(MatchOutcome::Inactive);
            };
            if !current.is_open() {
                debug!("Order {} is {}, nothing to match", current.id, current.status);
                return Ok(MatchOutcome::Inactive);
            }

            let Some(candidate) = self.store.find_counter_order(&current).await? else {
                debug!("No counterparty for order {} on {}", current.id, current.symbol);
                return Ok(MatchOutcome::NoCounterparty);
            };

            let mut tx = self.store.begin().await?;
            let low = current.id.min(candidate.id);
            let high = current.id.max(candidate.id);
            let low_row = tx.lock_order(low).await?;
            let high_row = tx.lock_order(high).await?;
            let (order_row, counter_row) = if low == current.id {
                (low_row, high_row)
            } else {
                (high_row, low_row)
            };

            let Some(order) = order_row.filter(Order::is_open) else {
                return Ok(MatchOutcome::Inactive);
            };
            let Some(counter) = counter_row.filter(|c| order.crosses(c)) else {
                debug!(
                    "Counter {} for order {} closed before it was locked",
                    candidate.id, order.id
                );
                continue;
            };

            return self.settle(tx, order, counter).await;
        }

        warn!(
            "Order {}: {} counter-orders closed under us, leaving it open",
            order.id, MAX_STALE_COUNTERS
        );
        Ok(MatchOutcome::NoCounterparty)
    }

    /// Settle a locked, crossing pair inside `tx`
    async fn settle(&self, mut tx: S::Tx, order: Order, counter: Order) -> Result<MatchOutcome> {
        if counter.amount_atomic_units != order.amount_atomic_units {
            debug!(
                "Order {} ({} units) and counter {} ({} units) differ in amount",
                order.id, order.amount_atomic_units, counter.id, counter.amount_atomic_units
            );
            return Ok(MatchOutcome::QuantityMismatch {
                order_id: order.id,
                counter_order_id: counter.id,
            });
        }

        let (mut buy, mut sell) = match order.side {
            Side::Buy => (order, counter),
            Side::Sell => (counter, order),
        };

        let asset = self
            .store
            .asset_type(&buy.symbol)
            .await?
            .ok_or_else(|| ExchangeError::UnknownAsset(buy.symbol.to_string()))?;
        let amount = buy.amount_atomic_units;
        let volume = notional_units(buy.price, amount, asset.atomic_scale)?;
        if volume <= 0 {
            return Err(ExchangeError::InvalidComputation(format!(
                "trade volume must be positive, got {volume} for orders {} and {}",
                buy.id, sell.id
            )));
        }

        let currency = buy.currency;
        let fee_user = self
            .fee_account(currency)
            .ok_or(ExchangeError::NoFeeAccount(currency))?;

        let mut fiat: BTreeMap<UserId, Option<FiatAccount>> = BTreeMap::new();
        for user_id in BTreeSet::from([buy.user_id, sell.user_id, fee_user]) {
            let account = tx.lock_fiat(user_id).await?;
            if let Some(existing) = &account
                && existing.currency != currency
            {
                return Err(ExchangeError::CurrencyMismatch {
                    user_id,
                    expected: currency,
                    found: existing.currency,
                });
            }
            fiat.insert(user_id, account);
        }
        let mut holdings: BTreeMap<UserId, Option<AssetAccount>> = BTreeMap::new();
        for user_id in BTreeSet::from([buy.user_id, sell.user_id]) {
            let account = tx.lock_asset(user_id, &buy.symbol).await?;
            holdings.insert(user_id, account);
        }

        let now = self.clock.now();

        // Re-validate reservations against the locked rows
        let buyer_locked = locked_fiat(&fiat, buy.user_id);
        let required = volume.max(buy.amount_locked_units);
        if buyer_locked < required {
            if let Some(account) = fiat.get_mut(&buy.user_id).and_then(Option::as_mut) {
                let release = buy.amount_locked_units.min(account.balance.locked());
                account.balance.release(release)?;
                tx.put_fiat(account.clone())?;
            }
            buy.mark_cancelled(now)?;
            tx.put_order(buy.clone())?;
            tx.commit().await?;

            warn!(
                "Cancelled buy order {}: locked {} < required {}",
                buy.id, buyer_locked, required
            );
            return Ok(MatchOutcome::Rejected {
                order_id: buy.id,
                reason: RejectReason::BuyerFundsShort {
                    required,
                    locked: buyer_locked,
                },
            });
        }

        let seller_locked = holdings
            .get(&sell.user_id)
            .and_then(Option::as_ref)
            .map_or(0, |a| a.balance.locked());
        if seller_locked < amount {
            if let Some(account) = holdings.get_mut(&sell.user_id).and_then(Option::as_mut) {
                let release = sell.amount_locked_units.min(account.balance.locked());
                account.balance.release(release)?;
                tx.put_asset(account.clone())?;
            }
            sell.mark_cancelled(now)?;
            tx.put_order(sell.clone())?;
            tx.commit().await?;

            warn!(
                "Cancelled sell order {}: locked {} < required {}",
                sell.id, seller_locked, amount
            );
            return Ok(MatchOutcome::Rejected {
                order_id: sell.id,
                reason: RejectReason::SellerAssetsShort {
                    required: amount,
                    locked: seller_locked,
                },
            });
        }

        let fee = self.commission.fee(volume)?;
        let proceeds = volume.checked_sub(fee).ok_or_else(|| {
            ExchangeError::InvalidComputation(format!("fee {fee} exceeds volume {volume}"))
        })?;
        let consumed = buy.amount_locked_units.max(volume);
        let refund = consumed - volume;

        // Buyer pays exactly `volume`; any excess reservation goes back to available
        let buyer = fiat_entry(&mut fiat, buy.user_id, currency);
        buyer.balance.consume_locked(consumed)?;
        buyer.balance.credit(refund)?;

        let seller = fiat_entry(&mut fiat, sell.user_id, currency);
        seller.balance.credit(proceeds)?;

        let platform = fiat_entry(&mut fiat, fee_user, currency);
        platform.balance.credit(fee)?;

        let seller_asset = asset_entry(&mut holdings, sell.user_id, &sell);
        seller_asset.balance.consume_locked(amount)?;

        let buyer_asset = asset_entry(&mut holdings, buy.user_id, &buy);
        buyer_asset.balance.credit(amount)?;

        for account in fiat.into_values().flatten() {
            tx.put_fiat(account)?;
        }
        for account in holdings.into_values().flatten() {
            tx.put_asset(account)?;
        }

        buy.mark_filled(now)?;
        sell.mark_filled(now)?;
        tx.put_order(buy.clone())?;
        tx.put_order(sell.clone())?;

        let trade = tx.insert_trade(NewTrade {
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            symbol: buy.symbol.clone(),
            amount_atomic_units: amount,
            volume_units: volume,
            commission_fee_units: fee,
            created_at: now,
        })?;
        tx.commit().await?;

        info!(
            "Settled trade {} on {}: buy {} / sell {}, {} units, volume {} {}, fee {} to user {}",
            trade.id, trade.symbol, buy.id, sell.id, amount, volume, currency, fee, fee_user
        );

        Ok(MatchOutcome::Settled(Box::new(Settlement {
            trade,
            buy_order: buy,
            sell_order: sell,
            volume,
            fee,
        })))
    }
}

fn locked_fiat(fiat: &BTreeMap<UserId, Option<FiatAccount>>, user_id: UserId) -> i64 {
    fiat.get(&user_id)
        .and_then(Option::as_ref)
        .map_or(0, |a| a.balance.locked())
}

/// The locked fiat row for `user_id`, created empty if the user had none
fn fiat_entry(
    fiat: &mut BTreeMap<UserId, Option<FiatAccount>>,
    user_id: UserId,
    currency: Currency,
) -> &mut FiatAccount {
    fiat.entry(user_id)
        .or_default()
        .get_or_insert_with(|| FiatAccount::new(user_id, currency))
}

fn asset_entry<'a>(
    holdings: &'a mut BTreeMap<UserId, Option<AssetAccount>>,
    user_id: UserId,
    order: &Order,
) -> &'a mut AssetAccount {
    holdings
        .entry(user_id)
        .or_default()
        .get_or_insert_with(|| AssetAccount::new(user_id, order.symbol.clone()))
}
