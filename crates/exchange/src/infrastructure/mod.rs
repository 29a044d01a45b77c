mod clock;
mod ledger;
mod match_lock;
mod worker_pool;

pub use clock::{ManualClock, SystemClock};
pub use ledger::{InMemoryLedger, InMemoryTransaction};
pub use match_lock::InMemoryMatchLock;
pub use worker_pool::{MatchQueue, MatchWorkerPool};
