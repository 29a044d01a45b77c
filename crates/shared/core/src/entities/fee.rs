use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform commission in basis points (1.5%)
pub const DEFAULT_FEE_BPS: u32 = 150;

const BPS_DENOMINATOR: i128 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Volume must be non-negative, got {0}")]
    NegativeVolume(i64),
}

/// Flat commission charged to the seller on every settled trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSchedule {
    pub fee_bps: u32,
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
        }
    }
}

impl CommissionSchedule {
    pub fn new(fee_bps: u32) -> Self {
        Self { fee_bps }
    }

    /// `floor(volume × fee_bps / 10000)` in the volume's minor units
    pub fn fee(&self, volume: i64) -> Result<i64, FeeError> {
        if volume < 0 {
            return Err(FeeError::NegativeVolume(volume));
        }
        let fee = i128::from(volume) * i128::from(self.fee_bps) / BPS_DENOMINATOR;
        // fee_bps above 10000 would charge more than the volume
        Ok(i64::try_from(fee).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate() {
        let schedule = CommissionSchedule::default();
        assert_eq!(schedule.fee(95_000), Ok(1_425));
        assert_eq!(schedule.fee(0), Ok(0));
        assert_eq!(schedule.fee(1), Ok(0));
        assert_eq!(schedule.fee(66), Ok(0));
        assert_eq!(schedule.fee(67), Ok(1));
    }

    #[test]
    fn test_negative_volume() {
        let schedule = CommissionSchedule::default();
        assert_eq!(schedule.fee(-1), Err(FeeError::NegativeVolume(-1)));
    }

    #[test]
    fn test_large_volume_does_not_overflow() {
        let schedule = CommissionSchedule::new(150);
        let fee = schedule.fee(i64::MAX).unwrap();
        assert_eq!(i128::from(fee), i128::from(i64::MAX) * 150 / 10_000);
    }

    #[test]
    fn test_configurable_rate() {
        assert_eq!(CommissionSchedule::new(0).fee(1_000_000), Ok(0));
        assert_eq!(CommissionSchedule::new(25).fee(1_000_000), Ok(2_500));
    }
}
