//! Rebate dispatch — converting captured fees into reward tokens
//!
//! A dispatcher turns a fee amount (denominated in the fee token) into
//! rebate tokens via a price reference and pays them out of a dedicated
//! reserve account. Configuring a dispatcher is always explicit: a hook
//! without one simply skips rebates, it never holds a null.

use rust_decimal::Decimal;
use tracing::debug;
use types::ids::AccountId;

use crate::errors::RebateError;
use crate::token::TokenBank;

/// Source of the rebate-token price, expressed as rebate tokens per unit
/// of fee value.
pub trait PriceReference: std::fmt::Debug {
    fn get(&self) -> Decimal;

    fn box_clone(&self) -> Box<dyn PriceReference>;
}

impl Clone for Box<dyn PriceReference> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Constant price reference.
#[derive(Debug, Clone)]
pub struct FixedPriceReference {
    price: Decimal,
}

impl FixedPriceReference {
    pub fn new(price: Decimal) -> Self {
        Self { price }
    }
}

impl PriceReference for FixedPriceReference {
    fn get(&self) -> Decimal {
        self.price
    }

    fn box_clone(&self) -> Box<dyn PriceReference> {
        Box::new(self.clone())
    }
}

/// Pays rebates from a reserve account at the referenced price.
#[derive(Debug, Clone)]
pub struct RebateDispatcher {
    reserve: AccountId,
    rebate_token: String,
    price: Box<dyn PriceReference>,
}

impl RebateDispatcher {
    pub fn new(
        reserve: AccountId,
        rebate_token: impl Into<String>,
        price: Box<dyn PriceReference>,
    ) -> Self {
        Self {
            reserve,
            rebate_token: rebate_token.into(),
            price,
        }
    }

    /// Rebate token symbol.
    pub fn rebate_token(&self) -> &str {
        &self.rebate_token
    }

    /// Reserve account the rebates are paid from.
    pub fn reserve(&self) -> &AccountId {
        &self.reserve
    }

    /// Convert `fee_value` into rebate tokens and transfer them to `to`.
    ///
    /// Returns the rebate-token amount actually sent. A conversion that
    /// truncates to zero sends nothing and returns zero.
    pub fn send(
        &self,
        bank: &mut TokenBank,
        to: AccountId,
        fee_value: Decimal,
    ) -> Result<Decimal, RebateError> {
        let decimals = bank.token(&self.rebate_token)?.decimals();
        let amount = fee_value
            .checked_mul(self.price.get())
            .ok_or(RebateError::Overflow)?
            .trunc_with_scale(decimals);
        if amount.is_zero() {
            return Ok(Decimal::ZERO);
        }
        bank.transfer(&self.rebate_token, &self.reserve, to, amount)?;
        debug!(%to, %amount, token = %self.rebate_token, "rebate dispatched");
        Ok(amount)
    }
}
