//! In-memory ledger store with pessimistic row locks.
//!
//! Committed rows live behind one `RwLock` so a commit becomes visible all at once.
//! Row locks are per-row async mutexes kept in a `DashMap`, taken with a bounded wait
//! and held by the transaction until it commits or is dropped.

use async_trait::async_trait;
use bourse_core::{
    AssetAccount, AssetType, Balance, Currency, FiatAccount, NewOrder, NewTrade, Order, OrderId,
    Symbol, Trade, UserId,
};
use bourse_ports::{
    LedgerStore, LedgerTransaction, OrderFilter, Page, PageRequest, StoreError, StoreResult,
};
use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identity of a lockable ledger row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Order(OrderId),
    Fiat(UserId),
    Asset(UserId, Symbol),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Order(id) => write!(f, "order:{id}"),
            RowKey::Fiat(user) => write!(f, "fiat:{user}"),
            RowKey::Asset(user, symbol) => write!(f, "asset:{user}:{symbol}"),
        }
    }
}

#[derive(Default)]
struct Tables {
    orders: BTreeMap<OrderId, Order>,
    fiat: HashMap<UserId, FiatAccount>,
    assets: HashMap<(UserId, Symbol), AssetAccount>,
    trades: Vec<Trade>,
}

struct LedgerInner {
    tables: RwLock<Tables>,
    asset_types: DashMap<Symbol, AssetType>,
    idempotency: DashMap<(UserId, String), OrderId>,
    row_locks: DashMap<RowKey, Arc<Mutex<()>>>,
    next_order_id: AtomicU64,
    next_trade_id: AtomicU64,
    lock_timeout: Duration,
    enforce_idempotency: bool,
}

/// In-memory ledger
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<LedgerInner>,
}

impl InMemoryLedger {
    pub fn new(lock_timeout: Duration) -> Self {
        Self::with_idempotency_index(lock_timeout, true)
    }

    /// With `enforce = false` idempotency keys are plain data and never conflict
    pub fn with_idempotency_index(lock_timeout: Duration, enforce: bool) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                tables: RwLock::new(Tables::default()),
                asset_types: DashMap::new(),
                idempotency: DashMap::new(),
                row_locks: DashMap::new(),
                next_order_id: AtomicU64::new(1),
                next_trade_id: AtomicU64::new(1),
                lock_timeout,
                enforce_idempotency: enforce,
            }),
        }
    }

    // ========== Seeding ==========

    pub fn register_asset_type(&self, asset: AssetType) {
        debug!(
            "Registered asset type {} (scale {})",
            asset.symbol, asset.atomic_scale
        );
        self.inner.asset_types.insert(asset.symbol.clone(), asset);
    }

    /// Create or replace a user's fiat account with `available` minor units
    pub fn open_fiat_account(
        &self,
        user_id: UserId,
        currency: Currency,
        available: i64,
    ) -> StoreResult<()> {
        let balance = Balance::available_only(available)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let account = FiatAccount::new(user_id, currency).with_balance(balance);
        self.inner.tables.write().fiat.insert(user_id, account);
        Ok(())
    }

    /// Create or replace a user's holding of `symbol` with `available` atomic units
    pub fn set_asset_balance(
        &self,
        user_id: UserId,
        symbol: Symbol,
        available: i64,
    ) -> StoreResult<()> {
        let balance = Balance::available_only(available)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let account = AssetAccount::new(user_id, symbol.clone()).with_balance(balance);
        self.inner
            .tables
            .write()
            .assets
            .insert((user_id, symbol), account);
        Ok(())
    }

    // ========== Audit ==========

    /// Sum of `available + locked` over every fiat account
    pub fn total_fiat(&self) -> i128 {
        self.inner
            .tables
            .read()
            .fiat
            .values()
            .map(|a| a.balance.total())
            .sum()
    }

    /// Sum of `available + locked` over every holding of `symbol`
    pub fn total_asset(&self, symbol: &Symbol) -> i128 {
        self.inner
            .tables
            .read()
            .assets
            .values()
            .filter(|a| &a.symbol == symbol)
            .map(|a| a.balance.total())
            .sum()
    }

    pub fn order_count(&self) -> usize {
        self.inner.tables.read().orders.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        Ok(InMemoryTransaction {
            ledger: self.inner.clone(),
            guards: HashMap::new(),
            orders: BTreeMap::new(),
            inserted: HashSet::new(),
            fiat: HashMap::new(),
            assets: HashMap::new(),
            trades: Vec::new(),
        })
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.inner.tables.read().orders.get(&id).cloned())
    }

    async fn order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> StoreResult<Option<Order>> {
        let tables = self.inner.tables.read();
        if self.inner.enforce_idempotency {
            let id = self
                .inner
                .idempotency
                .get(&(user_id, key.to_string()))
                .map(|e| *e.value());
            return Ok(id.and_then(|id| tables.orders.get(&id).cloned()));
        }
        Ok(tables
            .orders
            .values()
            .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn asset_type(&self, symbol: &Symbol) -> StoreResult<Option<AssetType>> {
        Ok(self.inner.asset_types.get(symbol).map(|e| e.value().clone()))
    }

    async fn asset_types(&self) -> StoreResult<Vec<AssetType>> {
        let mut types: Vec<AssetType> = self
            .inner
            .asset_types
            .iter()
            .map(|e| e.value().clone())
            .collect();
        types.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(types)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Order>> {
        let tables = self.inner.tables.read();
        let matching = tables.orders.values().filter(|o| filter.matches(o));
        let total = matching.clone().count() as u64;
        let items = matching
            .skip(page.offset())
            .take(page.limit())
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn fiat_account(&self, user_id: UserId) -> StoreResult<Option<FiatAccount>> {
        Ok(self.inner.tables.read().fiat.get(&user_id).cloned())
    }

    async fn asset_accounts(&self, user_id: UserId) -> StoreResult<Vec<AssetAccount>> {
        let mut accounts: Vec<AssetAccount> = self
            .inner
            .tables
            .read()
            .assets
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(accounts)
    }

    async fn find_counter_order(&self, order: &Order) -> StoreResult<Option<Order>> {
        Ok(self
            .inner
            .tables
            .read()
            .orders
            .values()
            .find(|c| c.id != order.id && order.crosses(c))
            .cloned())
    }

    async fn trades(&self, symbol: &Symbol) -> StoreResult<Vec<Trade>> {
        Ok(self
            .inner
            .tables
            .read()
            .trades
            .iter()
            .filter(|t| &t.symbol == symbol)
            .cloned()
            .collect())
    }
}

/// Transaction over [`InMemoryLedger`]
pub struct InMemoryTransaction {
    ledger: Arc<LedgerInner>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    orders: BTreeMap<OrderId, Order>,
    inserted: HashSet<OrderId>,
    fiat: HashMap<UserId, FiatAccount>,
    assets: HashMap<(UserId, Symbol), AssetAccount>,
    trades: Vec<Trade>,
}

impl InMemoryTransaction {
    async fn lock(&mut self, key: RowKey) -> StoreResult<()> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }
        let mutex = self
            .ledger
            .row_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = tokio::time::timeout(self.ledger.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(key.to_string()))?;
        trace!("Locked row {}", key);
        self.guards.insert(key, guard);
        Ok(())
    }

    fn require_lock(&self, key: &RowKey) -> StoreResult<()> {
        if self.guards.contains_key(key) {
            Ok(())
        } else {
            Err(StoreError::Internal(format!(
                "write to {key} without holding its row lock"
            )))
        }
    }

    fn current_order(&self, id: OrderId) -> Option<Order> {
        self.orders
            .get(&id)
            .cloned()
            .or_else(|| self.ledger.tables.read().orders.get(&id).cloned())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        self.lock(RowKey::Order(id)).await?;
        Ok(self.current_order(id))
    }

    async fn lock_fiat(&mut self, user_id: UserId) -> StoreResult<Option<FiatAccount>> {
        self.lock(RowKey::Fiat(user_id)).await?;
        if let Some(staged) = self.fiat.get(&user_id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.ledger.tables.read().fiat.get(&user_id).cloned())
    }

    async fn lock_asset(
        &mut self,
        user_id: UserId,
        symbol: &Symbol,
    ) -> StoreResult<Option<AssetAccount>> {
        self.lock(RowKey::Asset(user_id, symbol.clone())).await?;
        let key = (user_id, symbol.clone());
        if let Some(staged) = self.assets.get(&key) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.ledger.tables.read().assets.get(&key).cloned())
    }

    fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let id = self.ledger.next_order_id.fetch_add(1, Ordering::SeqCst);
        let order = order.into_order(id);
        self.inserted.insert(id);
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    fn put_order(&mut self, order: Order) -> StoreResult<()> {
        if !self.inserted.contains(&order.id) {
            self.require_lock(&RowKey::Order(order.id))?;
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    fn put_fiat(&mut self, account: FiatAccount) -> StoreResult<()> {
        self.require_lock(&RowKey::Fiat(account.user_id))?;
        self.fiat.insert(account.user_id, account);
        Ok(())
    }

    fn put_asset(&mut self, account: AssetAccount) -> StoreResult<()> {
        self.require_lock(&RowKey::Asset(account.user_id, account.symbol.clone()))?;
        self.assets
            .insert((account.user_id, account.symbol.clone()), account);
        Ok(())
    }

    fn insert_trade(&mut self, trade: NewTrade) -> StoreResult<Trade> {
        let id = self.ledger.next_trade_id.fetch_add(1, Ordering::SeqCst);
        let trade = trade.into_trade(id);
        self.trades.push(trade.clone());
        Ok(trade)
    }

    async fn commit(self) -> StoreResult<()> {
        let InMemoryTransaction {
            ledger,
            guards,
            orders,
            inserted,
            fiat,
            assets,
            trades,
        } = self;

        {
            let mut tables = ledger.tables.write();

            if ledger.enforce_idempotency {
                let mut seen = HashSet::new();
                for id in &inserted {
                    let Some(order) = orders.get(id) else {
                        continue;
                    };
                    if let Some(key) = &order.idempotency_key {
                        let index_key = (order.user_id, key.clone());
                        if ledger.idempotency.contains_key(&index_key) || !seen.insert(index_key)
                        {
                            return Err(StoreError::DuplicateIdempotencyKey {
                                user_id: order.user_id,
                                key: key.clone(),
                            });
                        }
                    }
                }
                for id in &inserted {
                    if let Some(order) = orders.get(id)
                        && let Some(key) = &order.idempotency_key
                    {
                        ledger
                            .idempotency
                            .insert((order.user_id, key.clone()), *id);
                    }
                }
            }

            tables.orders.extend(orders);
            tables.fiat.extend(fiat);
            tables.assets.extend(assets);
            tables.trades.extend(trades);
        }

        trace!("Committed transaction holding {} row locks", guards.len());
        drop(guards);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{FixedPoint, OrderStatus, Side};
    use chrono::Utc;

    fn btc() -> Symbol {
        Symbol::new("BTC").unwrap()
    }

    fn new_order(user_id: UserId, side: Side, key: Option<&str>) -> NewOrder {
        NewOrder {
            user_id,
            symbol: btc(),
            side,
            price: FixedPoint::new(5_000_000_000_000, 8),
            amount_atomic_units: 10_000_000,
            amount_locked_units: 5_000,
            currency: Currency::Usd,
            idempotency_key: key.map(String::from),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let ledger = InMemoryLedger::default();
        ledger.open_fiat_account(1, Currency::Usd, 10_000).unwrap();

        let mut tx = ledger.begin().await.unwrap();
        let mut account = tx.lock_fiat(1).await.unwrap().unwrap();
        account.balance.reserve(5_000).unwrap();
        tx.put_fiat(account).unwrap();
        let order = tx.insert_order(new_order(1, Side::Buy, None)).unwrap();

        // Not visible before commit
        assert!(ledger.order(order.id).await.unwrap().is_none());
        assert_eq!(
            ledger.fiat_account(1).await.unwrap().unwrap().balance.locked(),
            0
        );

        tx.commit().await.unwrap();

        let stored = ledger.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Open);
        assert_eq!(
            ledger.fiat_account(1).await.unwrap().unwrap().balance.locked(),
            5_000
        );
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let ledger = InMemoryLedger::default();
        ledger.open_fiat_account(1, Currency::Usd, 10_000).unwrap();

        {
            let mut tx = ledger.begin().await.unwrap();
            let mut account = tx.lock_fiat(1).await.unwrap().unwrap();
            account.balance.reserve(10_000).unwrap();
            tx.put_fiat(account).unwrap();
        }

        let account = ledger.fiat_account(1).await.unwrap().unwrap();
        assert_eq!(account.balance.available(), 10_000);
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn test_row_lock_wait_is_bounded() {
        let ledger = InMemoryLedger::new(Duration::from_millis(20));
        ledger.open_fiat_account(1, Currency::Usd, 100).unwrap();

        let mut holder = ledger.begin().await.unwrap();
        holder.lock_fiat(1).await.unwrap();

        let mut waiter = ledger.begin().await.unwrap();
        let err = waiter.lock_fiat(1).await.unwrap_err();
        assert_eq!(err, StoreError::LockTimeout("fiat:1".to_string()));

        drop(holder);
        assert!(waiter.lock_fiat(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_without_lock_is_refused() {
        let ledger = InMemoryLedger::default();
        let mut tx = ledger.begin().await.unwrap();
        let err = tx.put_fiat(FiatAccount::new(9, Currency::Usd)).unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_rejected_at_commit() {
        let ledger = InMemoryLedger::default();

        let mut first = ledger.begin().await.unwrap();
        let order = first
            .insert_order(new_order(1, Side::Buy, Some("abc")))
            .unwrap();
        first.commit().await.unwrap();

        let mut second = ledger.begin().await.unwrap();
        second
            .insert_order(new_order(1, Side::Buy, Some("abc")))
            .unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIdempotencyKey { user_id: 1, .. }));

        // Another user may reuse the key
        let mut third = ledger.begin().await.unwrap();
        third
            .insert_order(new_order(2, Side::Buy, Some("abc")))
            .unwrap();
        third.commit().await.unwrap();

        let found = ledger.order_by_idempotency_key(1, "abc").await.unwrap();
        assert_eq!(found.map(|o| o.id), Some(order.id));
    }

    #[tokio::test]
    async fn test_find_counter_prefers_earliest() {
        let ledger = InMemoryLedger::default();
        let mut tx = ledger.begin().await.unwrap();
        let first = tx.insert_order(new_order(1, Side::Sell, None)).unwrap();
        let _second = tx.insert_order(new_order(2, Side::Sell, None)).unwrap();
        let buy = tx.insert_order(new_order(3, Side::Buy, None)).unwrap();
        tx.commit().await.unwrap();

        let counter = ledger.find_counter_order(&buy).await.unwrap().unwrap();
        assert_eq!(counter.id, first.id);
    }

    #[tokio::test]
    async fn test_list_orders_filters_and_pages() {
        let ledger = InMemoryLedger::default();
        let mut tx = ledger.begin().await.unwrap();
        for i in 0..25 {
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            tx.insert_order(new_order(1, side, None)).unwrap();
        }
        tx.commit().await.unwrap();

        let page = ledger
            .list_orders(&OrderFilter::default(), PageRequest::new(2, 20))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.last_page, 2);
        assert!(page.items.windows(2).all(|w| w[0].id < w[1].id));

        let buys = ledger
            .list_orders(
                &OrderFilter::default().with_side(Side::Buy),
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(buys.total, 13);
        assert!(buys.items.iter().all(|o| o.side == Side::Buy));
    }
}
