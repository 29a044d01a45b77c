use async_trait::async_trait;
use bourse_core::{
    AssetAccount, AssetType, FiatAccount, NewOrder, NewTrade, Order, OrderId, Symbol, Trade,
    UserId,
};

use crate::error::StoreResult;
use crate::query::{OrderFilter, Page, PageRequest};

/// Port for the transactional ledger store
///
/// Plain reads on the store are snapshot reads and take no locks. Every mutation goes
/// through a [`LedgerTransaction`] obtained from [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Tx: LedgerTransaction;

    /// Start a transaction
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Get an order by ID
    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Find a user's order created with `key`
    async fn order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> StoreResult<Option<Order>>;

    /// Look up reference data for an asset
    async fn asset_type(&self, symbol: &Symbol) -> StoreResult<Option<AssetType>>;

    /// All known asset types, ordered by symbol
    async fn asset_types(&self) -> StoreResult<Vec<AssetType>>;

    /// Filtered orders in insertion order, one page at a time
    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest)
    -> StoreResult<Page<Order>>;

    async fn fiat_account(&self, user_id: UserId) -> StoreResult<Option<FiatAccount>>;

    /// A user's asset holdings, ordered by symbol
    async fn asset_accounts(&self, user_id: UserId) -> StoreResult<Vec<AssetAccount>>;

    /// The earliest open order that `order` crosses, as last committed.
    ///
    /// Takes no lock: the caller locks the pair and re-checks both rows.
    async fn find_counter_order(&self, order: &Order) -> StoreResult<Option<Order>>;

    /// Trades on `symbol` in settlement order
    async fn trades(&self, symbol: &Symbol) -> StoreResult<Vec<Trade>>;
}

/// A unit of work over the ledger with pessimistic row locks
///
/// `lock_*` methods take an exclusive lock on the row (held until the transaction ends)
/// and return the row as this transaction sees it, including its own staged writes.
/// A lock is taken even when the row does not exist yet, so a caller may create it.
/// Waiting for a lock is bounded; exceeding the bound fails with
/// [`StoreError::LockTimeout`](crate::StoreError::LockTimeout).
///
/// Writes are staged and become visible only on [`commit`](LedgerTransaction::commit).
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait LedgerTransaction: Send + Sized {
    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn lock_fiat(&mut self, user_id: UserId) -> StoreResult<Option<FiatAccount>>;

    async fn lock_asset(
        &mut self,
        user_id: UserId,
        symbol: &Symbol,
    ) -> StoreResult<Option<AssetAccount>>;

    /// Stage a new order; the id is assigned immediately
    fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order>;

    /// Stage an update of an order previously locked by this transaction
    fn put_order(&mut self, order: Order) -> StoreResult<()>;

    fn put_fiat(&mut self, account: FiatAccount) -> StoreResult<()>;

    fn put_asset(&mut self, account: AssetAccount) -> StoreResult<()>;

    fn insert_trade(&mut self, trade: NewTrade) -> StoreResult<Trade>;

    /// Apply every staged write atomically and release all row locks
    async fn commit(self) -> StoreResult<()>;
}
