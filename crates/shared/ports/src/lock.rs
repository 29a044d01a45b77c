use async_trait::async_trait;
use bourse_core::Timestamp;
use std::time::Duration;
use uuid::Uuid;

use crate::error::LockError;

/// Proof of holding a named lock until `expires_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub name: String,
    pub token: Uuid,
    pub expires_at: Timestamp,
}

/// Named advisory mutex with a TTL
///
/// Serializes matching attempts per symbol. It is independent of the ledger store:
/// holding it grants no row locks, and a lease that outlives `lease` is considered
/// abandoned and may be taken by someone else.
#[async_trait]
pub trait MatchLock: Send + Sync {
    /// Try to take `name` for `lease`, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` if the lock stayed busy for the whole wait.
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<Option<LockLease>, LockError>;

    /// Give the lock back. Returns false if the lease had already expired or been taken.
    async fn release(&self, lease: &LockLease) -> Result<bool, LockError>;
}
