use bourse_core::UserId;
use thiserror::Error;

/// Failures raised by a ledger store
///
/// All of these are infrastructure conditions rather than domain rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Timed out waiting for row lock on {0}")]
    LockTimeout(String),

    #[error("Idempotency key {key:?} already used by user {user_id}")]
    DuplicateIdempotencyKey { user_id: UserId, key: String },

    #[error("Store failure: {0}")]
    Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Lock requests the backend refuses outright (contention is not an error)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Lease on {0} must be longer than zero")]
    ZeroLease(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Match queue is closed")]
    Closed,
}
