//! Fungible token ledgers — balances, allowances, supply, permit
//!
//! Every asset the protocol moves (base asset, ledger unit, claim token
//! pair, rebate token, raw wrapped asset) is a `TokenLedger` registered in
//! one `TokenBank`. All mutation is overflow/underflow checked; the supply
//! of each token always equals the sum of its balances by construction.

use rust_decimal::Decimal;
use std::collections::HashMap;
use types::ids::AccountId;

use crate::errors::TokenError;
use crate::security::NonceTracker;

/// Allowance sentinel meaning "unlimited spend, never decremented".
pub const UNLIMITED_ALLOWANCE: Decimal = Decimal::MAX;

/// Signature-based allowance grant.
///
/// A `deadline` of zero means "no permit supplied, rely on the existing
/// allowance" — callers must check for it before attempting to apply the
/// grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitGrant {
    pub amount: Decimal,
    pub deadline: i64,
    pub nonce: u64,
    pub signature: Vec<u8>,
}

impl PermitGrant {
    /// The explicit "no permit" value.
    pub fn none() -> Self {
        Self {
            amount: Decimal::ZERO,
            deadline: 0,
            nonce: 0,
            signature: Vec::new(),
        }
    }

    /// Whether this grant carries an actual permit.
    pub fn is_present(&self) -> bool {
        self.deadline != 0
    }
}

/// A single fungible token: balances, allowances, total supply.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    symbol: String,
    decimals: u32,
    balances: HashMap<AccountId, Decimal>,
    allowances: HashMap<(AccountId, AccountId), Decimal>,
    total_supply: Decimal,
    permit_nonces: NonceTracker,
}

impl TokenLedger {
    /// Create an empty ledger for `symbol` with the given decimal precision.
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: Decimal::ZERO,
            permit_nonces: NonceTracker::new(),
        }
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Decimal precision.
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Balance of an account (zero when unknown).
    pub fn balance_of(&self, account: &AccountId) -> Decimal {
        self.balances.get(account).copied().unwrap_or(Decimal::ZERO)
    }

    /// Total minted supply.
    pub fn total_supply(&self) -> Decimal {
        self.total_supply
    }

    /// Remaining allowance from `owner` to `spender`.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Decimal {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Create `amount` new units for `account`.
    pub fn mint(&mut self, account: AccountId, amount: Decimal) -> Result<(), TokenError> {
        let balance = self.balances.entry(account).or_insert(Decimal::ZERO);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Destroy `amount` units held by `account`.
    pub fn burn(&mut self, account: &AccountId, amount: Decimal) -> Result<(), TokenError> {
        self.debit(account, amount)?;
        self.total_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        let balance = self.balances.entry(to).or_insert(Decimal::ZERO);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Set the allowance from `owner` to `spender` to exactly `amount`.
    pub fn approve(&mut self, owner: AccountId, spender: AccountId, amount: Decimal) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Spend `owner`'s allowance: move `amount` from `from` to `to` on
    /// behalf of `spender`, decrementing the allowance unless it is the
    /// unlimited sentinel.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                token: self.symbol.clone(),
                required: amount,
                available: allowed,
            });
        }
        self.transfer(from, to, amount)?;
        if allowed != UNLIMITED_ALLOWANCE {
            self.approve(*from, *spender, allowed - amount);
        }
        Ok(())
    }

    /// Apply a signature-based allowance grant.
    ///
    /// Signature validity is structural at this layer (non-empty); the
    /// cryptographic check belongs to the wallet boundary. The nonce is
    /// single-use per owner and the deadline is inclusive.
    pub fn permit(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        grant: &PermitGrant,
        now: i64,
    ) -> Result<(), TokenError> {
        if now > grant.deadline {
            return Err(TokenError::PermitExpired {
                deadline: grant.deadline,
            });
        }
        if grant.signature.is_empty() {
            return Err(TokenError::InvalidSignature);
        }
        if !self.permit_nonces.use_nonce(owner, grant.nonce) {
            return Err(TokenError::NonceReused {
                account: owner,
                nonce: grant.nonce,
            });
        }
        self.approve(owner, spender, grant.amount);
        Ok(())
    }

    fn debit(&mut self, account: &AccountId, amount: Decimal) -> Result<(), TokenError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                token: self.symbol.clone(),
                required: amount,
                available,
            });
        }
        let balance = self.balances.entry(*account).or_insert(Decimal::ZERO);
        *balance = balance.checked_sub(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }
}

/// Registry of all token ledgers, passed `&mut` through every operation.
///
/// Cloning the bank snapshots the entire fungible state; multi-step
/// operations use that for all-or-nothing rollback.
#[derive(Debug, Clone, Default)]
pub struct TokenBank {
    tokens: HashMap<String, TokenLedger>,
}

impl TokenBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Register a new token. Fails if the symbol is taken.
    pub fn create_token(
        &mut self,
        symbol: impl Into<String>,
        decimals: u32,
    ) -> Result<(), TokenError> {
        let symbol = symbol.into();
        if self.tokens.contains_key(&symbol) {
            return Err(TokenError::TokenExists { symbol });
        }
        self.tokens
            .insert(symbol.clone(), TokenLedger::new(symbol, decimals));
        Ok(())
    }

    /// Immutable access to a ledger.
    pub fn token(&self, symbol: &str) -> Result<&TokenLedger, TokenError> {
        self.tokens.get(symbol).ok_or_else(|| TokenError::UnknownToken {
            symbol: symbol.to_string(),
        })
    }

    /// Mutable access to a ledger.
    pub fn token_mut(&mut self, symbol: &str) -> Result<&mut TokenLedger, TokenError> {
        self.tokens
            .get_mut(symbol)
            .ok_or_else(|| TokenError::UnknownToken {
                symbol: symbol.to_string(),
            })
    }

    // ───────────────────────── Convenience passthroughs ─────────────────────────

    pub fn balance_of(&self, symbol: &str, account: &AccountId) -> Result<Decimal, TokenError> {
        Ok(self.token(symbol)?.balance_of(account))
    }

    pub fn total_supply(&self, symbol: &str) -> Result<Decimal, TokenError> {
        Ok(self.token(symbol)?.total_supply())
    }

    pub fn allowance(
        &self,
        symbol: &str,
        owner: &AccountId,
        spender: &AccountId,
    ) -> Result<Decimal, TokenError> {
        Ok(self.token(symbol)?.allowance(owner, spender))
    }

    pub fn mint(
        &mut self,
        symbol: &str,
        account: AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        self.token_mut(symbol)?.mint(account, amount)
    }

    pub fn burn(
        &mut self,
        symbol: &str,
        account: &AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        self.token_mut(symbol)?.burn(account, amount)
    }

    pub fn transfer(
        &mut self,
        symbol: &str,
        from: &AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        self.token_mut(symbol)?.transfer(from, to, amount)
    }

    pub fn approve(
        &mut self,
        symbol: &str,
        owner: AccountId,
        spender: AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        self.token_mut(symbol)?.approve(owner, spender, amount);
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        symbol: &str,
        spender: &AccountId,
        from: &AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        self.token_mut(symbol)?.transfer_from(spender, from, to, amount)
    }

    pub fn permit(
        &mut self,
        symbol: &str,
        owner: AccountId,
        spender: AccountId,
        grant: &PermitGrant,
        now: i64,
    ) -> Result<(), TokenError> {
        self.token_mut(symbol)?.permit(owner, spender, grant, now)
    }
}
