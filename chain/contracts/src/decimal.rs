//! Cross-precision decimal normalization and fee arithmetic
//!
//! The base asset and the ledger unit may carry different decimal
//! precision (e.g. a 6-decimal stable asset against the 18-decimal
//! ledger). All rescaling truncates toward zero, matching integer-division
//! semantics: a nonzero amount can normalize to zero, and a nonzero fee
//! percent can produce a zero fee — callers must reject both cases rather
//! than round in anyone's favor.

use rust_decimal::Decimal;
use types::fee::FEE_PERCENT_UNIT;

/// Default ledger-unit precision.
pub const LEDGER_DECIMALS: u32 = 18;

/// Compute `amount * fee_percent / FEE_PERCENT_UNIT`, truncated to `scale`
/// fractional digits. Returns `None` on arithmetic overflow.
pub fn fee_amount(amount: Decimal, fee_percent: u64, scale: u32) -> Option<Decimal> {
    let raw = amount.checked_mul(Decimal::from(fee_percent))?;
    let fee = raw.checked_div(Decimal::from(FEE_PERCENT_UNIT))?;
    Some(fee.trunc_with_scale(scale))
}

/// Check that `amount` carries no fractional digits beyond `scale`.
pub fn fits_scale(amount: Decimal, scale: u32) -> bool {
    amount.trunc_with_scale(scale) == amount
}

/// Converts amounts between base-asset precision and ledger precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalAdapter {
    base_decimals: u32,
    ledger_decimals: u32,
}

impl DecimalAdapter {
    /// Adapter between a `base_decimals`-precision asset and the default
    /// 18-decimal ledger.
    pub fn new(base_decimals: u32) -> Self {
        Self {
            base_decimals,
            ledger_decimals: LEDGER_DECIMALS,
        }
    }

    /// Adapter with an explicit ledger precision.
    pub fn with_precision(base_decimals: u32, ledger_decimals: u32) -> Self {
        Self {
            base_decimals,
            ledger_decimals,
        }
    }

    /// Base-asset precision.
    pub fn base_decimals(&self) -> u32 {
        self.base_decimals
    }

    /// Ledger-unit precision.
    pub fn ledger_decimals(&self) -> u32 {
        self.ledger_decimals
    }

    /// Normalize a base-asset amount to ledger precision, truncating.
    pub fn to_ledger(&self, base_amount: Decimal) -> Decimal {
        base_amount.trunc_with_scale(self.ledger_decimals)
    }

    /// Denormalize a ledger amount to base-asset precision, truncating.
    ///
    /// Dust below one base-asset unit is lost to truncation; callers
    /// reject a result of zero for a nonzero input.
    pub fn to_base(&self, ledger_amount: Decimal) -> Decimal {
        ledger_amount.trunc_with_scale(self.base_decimals)
    }

    /// Fee on a base-precision amount.
    pub fn base_fee(&self, amount: Decimal, fee_percent: u64) -> Option<Decimal> {
        fee_amount(amount, fee_percent, self.base_decimals)
    }

    /// Fee on a ledger-precision amount.
    pub fn ledger_fee(&self, amount: Decimal, fee_percent: u64) -> Option<Decimal> {
        fee_amount(amount, fee_percent, self.ledger_decimals)
    }
}
