//! Two-bucket ledger accounts.
//!
//! Every balance is split into `available` (spendable) and `locked` (reserved by open
//! orders). Both buckets stay non-negative; each operation either applies fully or
//! leaves the balance untouched.

use crate::entities::Currency;
use crate::values::{Symbol, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Insufficient available balance: requested {requested}, available {available}")]
    Insufficient { requested: i64, available: i64 },

    #[error("Locked balance underflow: requested {requested}, locked {locked}")]
    Underflow { requested: i64, locked: i64 },

    #[error("Balance overflow")]
    Overflow,

    #[error("Negative amount: {0}")]
    NegativeAmount(i64),
}

/// Available/locked pair in integer units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    available: i64,
    locked: i64,
}

impl Balance {
    pub fn new(available: i64, locked: i64) -> Result<Self, BalanceError> {
        check_non_negative(available)?;
        check_non_negative(locked)?;
        Ok(Self { available, locked })
    }

    /// Balance with everything spendable
    pub fn available_only(available: i64) -> Result<Self, BalanceError> {
        Self::new(available, 0)
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn locked(&self) -> i64 {
        self.locked
    }

    /// `available + locked`, widened so it never overflows
    pub fn total(&self) -> i128 {
        i128::from(self.available) + i128::from(self.locked)
    }

    /// Move `amount` from available to locked
    pub fn reserve(&mut self, amount: i64) -> Result<(), BalanceError> {
        check_non_negative(amount)?;
        if self.available < amount {
            return Err(BalanceError::Insufficient {
                requested: amount,
                available: self.available,
            });
        }
        let locked = self
            .locked
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        self.available -= amount;
        self.locked = locked;
        Ok(())
    }

    /// Move `amount` from locked back to available
    pub fn release(&mut self, amount: i64) -> Result<(), BalanceError> {
        check_non_negative(amount)?;
        if self.locked < amount {
            return Err(BalanceError::Underflow {
                requested: amount,
                locked: self.locked,
            });
        }
        let available = self
            .available
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        self.locked -= amount;
        self.available = available;
        Ok(())
    }

    /// Remove `amount` from locked; the units leave this account
    pub fn consume_locked(&mut self, amount: i64) -> Result<(), BalanceError> {
        check_non_negative(amount)?;
        if self.locked < amount {
            return Err(BalanceError::Underflow {
                requested: amount,
                locked: self.locked,
            });
        }
        self.locked -= amount;
        Ok(())
    }

    /// Add `amount` to available
    pub fn credit(&mut self, amount: i64) -> Result<(), BalanceError> {
        check_non_negative(amount)?;
        self.available = self
            .available
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        Ok(())
    }
}

fn check_non_negative(amount: i64) -> Result<(), BalanceError> {
    if amount < 0 {
        return Err(BalanceError::NegativeAmount(amount));
    }
    Ok(())
}

/// A user's fiat cash account, balances in minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatAccount {
    pub user_id: UserId,
    pub currency: Currency,
    pub balance: Balance,
}

impl FiatAccount {
    pub fn new(user_id: UserId, currency: Currency) -> Self {
        Self {
            user_id,
            currency,
            balance: Balance::default(),
        }
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }
}

/// A user's holding of one asset, balances in atomic units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAccount {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub balance: Balance,
}

impl AssetAccount {
    pub fn new(user_id: UserId, symbol: Symbol) -> Self {
        Self {
            user_id,
            symbol,
            balance: Balance::default(),
        }
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_moves_to_locked() {
        let mut balance = Balance::available_only(10_000).unwrap();
        balance.reserve(5_000).unwrap();
        assert_eq!(balance.available(), 5_000);
        assert_eq!(balance.locked(), 5_000);
        assert_eq!(balance.total(), 10_000);
    }

    #[test]
    fn test_reserve_insufficient_leaves_balance() {
        let mut balance = Balance::available_only(100).unwrap();
        let err = balance.reserve(101).unwrap_err();
        assert_eq!(
            err,
            BalanceError::Insufficient {
                requested: 101,
                available: 100
            }
        );
        assert_eq!(balance, Balance::available_only(100).unwrap());
    }

    #[test]
    fn test_release_round_trip() {
        let mut balance = Balance::new(40, 60).unwrap();
        balance.reserve(40).unwrap();
        balance.release(100).unwrap();
        assert_eq!(balance, Balance::new(100, 0).unwrap());
    }

    #[test]
    fn test_release_underflow() {
        let mut balance = Balance::new(0, 10).unwrap();
        assert!(matches!(
            balance.release(11),
            Err(BalanceError::Underflow { .. })
        ));
        assert_eq!(balance.locked(), 10);
    }

    #[test]
    fn test_consume_and_credit() {
        let mut balance = Balance::new(0, 500).unwrap();
        balance.consume_locked(500).unwrap();
        balance.credit(25).unwrap();
        assert_eq!(balance, Balance::new(25, 0).unwrap());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut balance = Balance::default();
        assert_eq!(balance.credit(-1), Err(BalanceError::NegativeAmount(-1)));
        assert!(Balance::new(-5, 0).is_err());
    }

    #[test]
    fn test_credit_overflow() {
        let mut balance = Balance::available_only(i64::MAX).unwrap();
        assert_eq!(balance.credit(1), Err(BalanceError::Overflow));
    }
}
