//! Fixed-point fee arithmetic constants and configuration
//!
//! All fee percentages in the protocol are fixed-point integers over a
//! shared denominator of one million. A value of 10_000 therefore means 1%.
//! The same denominator is used for rebate multipliers and for the rate
//! limiter's percent-of-deposits floor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared fixed-point denominator for fee percentages (1_000_000 = 100%).
pub const FEE_PERCENT_UNIT: u64 = 1_000_000;

/// Hard ceiling on any fee percentage: 100_000 / 1_000_000 = 10%.
pub const FEE_PERCENT_LIMIT: u64 = 100_000;

/// Fixed-point denominator for rebate multipliers (1_000_000 = 1.0x).
pub const MULTIPLIER_UNIT: u64 = 1_000_000;

/// Sentinel for a per-market fee override meaning "fees disabled".
///
/// Distinct from 0, which means "unset, fall back to the beacon default".
pub const FEE_OVERRIDE_DISABLED: u64 = u64::MAX;

/// Fee configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeeConfigError {
    #[error("Fee percent {percent} exceeds limit {limit}")]
    PercentTooHigh { percent: u64, limit: u64 },
}

/// Deposit/withdraw fee percentages for a collateral vault.
///
/// Both values are fixed-point over [`FEE_PERCENT_UNIT`] and capped at
/// [`FEE_PERCENT_LIMIT`]. Changes apply prospectively only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub deposit_fee_percent: u64,
    pub withdraw_fee_percent: u64,
}

impl FeeConfig {
    /// Zero-fee configuration.
    pub fn zero() -> Self {
        Self {
            deposit_fee_percent: 0,
            withdraw_fee_percent: 0,
        }
    }

    /// Validate both percentages against the hard ceiling.
    pub fn validate(&self) -> Result<(), FeeConfigError> {
        for percent in [self.deposit_fee_percent, self.withdraw_fee_percent] {
            if percent > FEE_PERCENT_LIMIT {
                return Err(FeeConfigError::PercentTooHigh {
                    percent,
                    limit: FEE_PERCENT_LIMIT,
                });
            }
        }
        Ok(())
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::zero()
    }
}

/// Convert a fixed-point percentage into its decimal fraction.
///
/// `fraction(10_000)` is `0.01`.
pub fn fraction(percent: u64) -> Decimal {
    Decimal::from(percent) / Decimal::from(FEE_PERCENT_UNIT)
}
