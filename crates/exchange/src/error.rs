use bourse_core::{
    BalanceError, Currency, FeeError, FixedPointError, OrderId, OrderStatus,
    StatusTransitionError, UserId,
};
use bourse_ports::{LockError, StoreError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Insufficient available {asset} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: String,
        requested: i64,
        available: i64,
    },

    #[error("Order {order_id} is {status}, expected Open")]
    InvalidOrderStatus {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("Invalid computation: {0}")]
    InvalidComputation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("User {user_id} does not own order {order_id}")]
    NotOrderOwner { order_id: OrderId, user_id: UserId },

    #[error("No fee account configured for {0}")]
    NoFeeAccount(Currency),

    #[error("Fiat account of user {user_id} is in {found}, trade settles in {expected}")]
    CurrencyMismatch {
        user_id: UserId,
        expected: Currency,
        found: Currency,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

impl ExchangeError {
    /// Infrastructure failures worth retrying later, as opposed to domain rule violations
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Store(StoreError::LockTimeout(_) | StoreError::Internal(_))
                | ExchangeError::Lock(_)
        )
    }

    pub(crate) fn insufficient(asset: impl Into<String>, err: BalanceError) -> Self {
        match err {
            BalanceError::Insufficient {
                requested,
                available,
            } => ExchangeError::InsufficientBalance {
                asset: asset.into(),
                requested,
                available,
            },
            other => other.into(),
        }
    }
}

impl From<FeeError> for ExchangeError {
    fn from(err: FeeError) -> Self {
        ExchangeError::InvalidArgument(err.to_string())
    }
}

impl From<FixedPointError> for ExchangeError {
    fn from(err: FixedPointError) -> Self {
        match err {
            FixedPointError::Overflow(_) => ExchangeError::InvalidComputation(err.to_string()),
            FixedPointError::InvalidInput(_) | FixedPointError::ExcessPrecision { .. } => {
                ExchangeError::InvalidArgument(err.to_string())
            }
        }
    }
}

impl From<BalanceError> for ExchangeError {
    fn from(err: BalanceError) -> Self {
        ExchangeError::InvalidComputation(err.to_string())
    }
}

impl From<StatusTransitionError> for ExchangeError {
    fn from(err: StatusTransitionError) -> Self {
        ExchangeError::InvalidComputation(err.to_string())
    }
}
