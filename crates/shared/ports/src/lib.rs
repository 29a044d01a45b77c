//! Bourse Ports
//!
//! Port definitions (traits) for the Bourse spot exchange.
//! These define the boundaries between the order/matching logic and infrastructure:
//! the transactional ledger store, the per-symbol match lock, the match job queue,
//! and the clock.

mod clock;
mod dispatch;
mod error;
mod ledger;
mod lock;
mod query;

pub use clock::Clock;
pub use dispatch::MatchDispatcher;
pub use error::{DispatchError, LockError, StoreError, StoreResult};
pub use ledger::{LedgerStore, LedgerTransaction};
pub use lock::{LockLease, MatchLock};
pub use query::{DEFAULT_PER_PAGE, MAX_PER_PAGE, OrderFilter, Page, PageRequest};
