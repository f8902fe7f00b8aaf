//! Collateral vault — base asset in, ledger units out
//!
//! The vault custodies the base asset and mints/burns the 18-decimal
//! ledger unit against it. Fees are computed by the vault's own
//! arithmetic; a registered hook only moves the already-computed fee, it
//! never decides amounts. Every entry point is pause- and
//! reentrancy-guarded and rolls back completely on any failure: the
//! token bank, the cap ledger, the rate limiter, and the hook are
//! restored from a pre-operation snapshot.

use rust_decimal::Decimal;
use tracing::{debug, warn};
use types::fee::FeeConfig;
use types::ids::AccountId;

use crate::caps::FlowCapLedger;
use crate::decimal::{fits_scale, DecimalAdapter};
use crate::errors::VaultError;
use crate::events::{ContractEvent, Deposited, FeeConfigUpdated, Withdrawn};
use crate::hooks::{FlowDirection, FlowHook, HookContext};
use crate::rate_limit::PeriodicRateLimiter;
use crate::security::{AccessControl, PauseGuard, ReentrancyGuard};
use crate::token::TokenBank;

/// Custody and issuance for one base-asset/ledger-unit pair.
#[derive(Debug, Clone)]
pub struct CollateralVault {
    address: AccountId,
    base_token: String,
    ledger_token: String,
    adapter: DecimalAdapter,
    fees: FeeConfig,
    deposit_hook: Option<Box<dyn FlowHook>>,
    withdraw_hook: Option<Box<dyn FlowHook>>,
    caps: FlowCapLedger,
    limiter: PeriodicRateLimiter,
    pause: PauseGuard,
    reentrancy: ReentrancyGuard,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl CollateralVault {
    /// Create a vault custodying `base_token` against `ledger_token`.
    ///
    /// The vault registers itself as the sole recorder on its cap ledger.
    pub fn new(
        admin: impl Into<String>,
        base_token: impl Into<String>,
        ledger_token: impl Into<String>,
        adapter: DecimalAdapter,
        caps: FlowCapLedger,
        limiter: PeriodicRateLimiter,
    ) -> Self {
        let address = AccountId::new();
        let mut caps = caps;
        caps.allow_recorder(address);
        Self {
            address,
            base_token: base_token.into(),
            ledger_token: ledger_token.into(),
            adapter,
            fees: FeeConfig::zero(),
            deposit_hook: None,
            withdraw_hook: None,
            caps,
            limiter,
            pause: PauseGuard::new(),
            reentrancy: ReentrancyGuard::new(),
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    // ───────────────────────── Deposits ─────────────────────────

    /// Pull `base_amount` from `funder`, capture the deposit fee, and mint
    /// ledger units to `recipient`. Returns the minted amount.
    ///
    /// The funder must have approved the vault for `base_amount`
    /// beforehand. A zero amount is accepted only while the deposit fee
    /// percent is zero.
    pub fn deposit(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        base_amount: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, VaultError> {
        if self.pause.is_paused() {
            return Err(VaultError::Paused);
        }
        if !self.reentrancy.acquire() {
            return Err(VaultError::Reentrancy);
        }
        let result = self.deposit_guarded(bank, funder, recipient, base_amount, now, payload);
        self.reentrancy.release();
        result
    }

    fn deposit_guarded(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        base_amount: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, VaultError> {
        if base_amount.is_sign_negative() {
            return Err(VaultError::InvalidParameter {
                reason: "amount must be non-negative".to_string(),
            });
        }
        if !fits_scale(base_amount, self.adapter.base_decimals()) {
            return Err(VaultError::PrecisionExceeded {
                scale: self.adapter.base_decimals(),
            });
        }

        // Fee exemption is keyed on the flow's recipient, not the payer.
        let exempt = self
            .deposit_hook
            .as_ref()
            .map_or(false, |hook| hook.fee_exempt(&recipient));
        let percent = if exempt { 0 } else { self.fees.deposit_fee_percent };
        if base_amount.is_zero() && percent != 0 {
            return Err(VaultError::ZeroAmount);
        }

        let fee = self
            .adapter
            .base_fee(base_amount, percent)
            .ok_or(VaultError::Overflow)?;
        if percent != 0 && fee.is_zero() {
            return Err(VaultError::FeeRoundsToZero);
        }
        let minted = self.adapter.to_ledger(base_amount - fee);
        if minted.is_zero() && !base_amount.is_zero() {
            return Err(VaultError::ZeroAmount);
        }

        let bank_snapshot = bank.clone();
        let caps_snapshot = self.caps.clone();
        let hook_snapshot = self.deposit_hook.clone();
        let result = self.deposit_execute(bank, funder, recipient, base_amount, fee, minted, now, payload);
        if result.is_err() {
            *bank = bank_snapshot;
            self.caps = caps_snapshot;
            self.deposit_hook = hook_snapshot;
            warn!(%funder, %base_amount, "deposit rolled back");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn deposit_execute(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        base_amount: Decimal,
        fee: Decimal,
        minted: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, VaultError> {
        // Cap accounting uses the pre-fee amount and runs even when the
        // recipient is fee-exempt.
        self.caps
            .record_deposit(&self.address, recipient, base_amount)?;
        bank.transfer_from(
            &self.base_token,
            &self.address,
            &funder,
            self.address,
            base_amount,
        )?;

        if let Some(hook) = self.deposit_hook.as_mut() {
            let spender = hook.address();
            bank.approve(&self.base_token, self.address, spender, fee)?;
            let ctx = HookContext {
                caller: self.address,
                direction: FlowDirection::Deposit,
                from: funder,
                to: recipient,
                token: self.base_token.clone(),
                amount_before_fee: base_amount,
                amount_after_fee: base_amount - fee,
                now,
                payload,
            };
            hook.on_flow(bank, &ctx)?;
            // The grant is revoked whether or not the hook consumed it.
            bank.approve(&self.base_token, self.address, spender, Decimal::ZERO)?;
            self.events.extend(hook.drain_events());
        }

        bank.mint(&self.ledger_token, recipient, minted)?;
        self.events.push(ContractEvent::Deposited(Deposited {
            funder,
            recipient,
            base_amount,
            fee,
            minted,
        }));
        debug!(%funder, %recipient, %base_amount, %fee, %minted, "deposit");
        Ok(minted)
    }

    // ───────────────────────── Withdrawals ─────────────────────────

    /// Burn `ledger_amount` from `funder`, capture the withdrawal fee, and
    /// release base asset to `recipient`. Returns the released amount.
    ///
    /// Burning needs no self-allowance. Recipients on the cap-bypass list
    /// skip the rate limiter entirely.
    pub fn withdraw(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        ledger_amount: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, VaultError> {
        if self.pause.is_paused() {
            return Err(VaultError::Paused);
        }
        if !self.reentrancy.acquire() {
            return Err(VaultError::Reentrancy);
        }
        let result = self.withdraw_guarded(bank, funder, recipient, ledger_amount, now, payload);
        self.reentrancy.release();
        result
    }

    fn withdraw_guarded(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        ledger_amount: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, VaultError> {
        if ledger_amount.is_sign_negative() {
            return Err(VaultError::InvalidParameter {
                reason: "amount must be non-negative".to_string(),
            });
        }
        if !fits_scale(ledger_amount, self.adapter.ledger_decimals()) {
            return Err(VaultError::PrecisionExceeded {
                scale: self.adapter.ledger_decimals(),
            });
        }

        let exempt = self
            .withdraw_hook
            .as_ref()
            .map_or(false, |hook| hook.fee_exempt(&recipient));
        let percent = if exempt { 0 } else { self.fees.withdraw_fee_percent };
        if ledger_amount.is_zero() && percent != 0 {
            return Err(VaultError::ZeroAmount);
        }

        let base_before_fee = self.adapter.to_base(ledger_amount);
        if base_before_fee.is_zero() && !ledger_amount.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        let fee = self
            .adapter
            .base_fee(base_before_fee, percent)
            .ok_or(VaultError::Overflow)?;
        if percent != 0 && fee.is_zero() {
            return Err(VaultError::FeeRoundsToZero);
        }
        let released = base_before_fee - fee;

        let bank_snapshot = bank.clone();
        let caps_snapshot = self.caps.clone();
        let limiter_snapshot = self.limiter.clone();
        let hook_snapshot = self.withdraw_hook.clone();
        let result = self.withdraw_execute(
            bank,
            funder,
            recipient,
            ledger_amount,
            base_before_fee,
            fee,
            released,
            now,
            payload,
        );
        if result.is_err() {
            *bank = bank_snapshot;
            self.caps = caps_snapshot;
            self.limiter = limiter_snapshot;
            self.withdraw_hook = hook_snapshot;
            warn!(%funder, %ledger_amount, "withdrawal rolled back");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn withdraw_execute(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        ledger_amount: Decimal,
        base_before_fee: Decimal,
        fee: Decimal,
        released: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, VaultError> {
        if !self.caps.is_bypassed(&recipient) {
            self.limiter
                .check_and_record(base_before_fee, now, self.caps.global_net())?;
        }
        self.caps.record_withdrawal(&self.address, base_before_fee)?;
        bank.burn(&self.ledger_token, &funder, ledger_amount)?;

        if let Some(hook) = self.withdraw_hook.as_mut() {
            let spender = hook.address();
            bank.approve(&self.base_token, self.address, spender, fee)?;
            let ctx = HookContext {
                caller: self.address,
                direction: FlowDirection::Withdraw,
                from: funder,
                to: recipient,
                token: self.base_token.clone(),
                amount_before_fee: base_before_fee,
                amount_after_fee: released,
                now,
                payload,
            };
            hook.on_flow(bank, &ctx)?;
            bank.approve(&self.base_token, self.address, spender, Decimal::ZERO)?;
            self.events.extend(hook.drain_events());
        }

        bank.transfer(&self.base_token, &self.address, recipient, released)?;
        self.events.push(ContractEvent::Withdrawn(Withdrawn {
            funder,
            recipient,
            ledger_amount,
            fee,
            released,
        }));
        debug!(%funder, %recipient, %ledger_amount, %fee, %released, "withdrawal");
        Ok(released)
    }

    // ───────────────────────── Configuration ─────────────────────────

    /// Replace the fee configuration. Admin-only, prospective only;
    /// re-emits on identical values.
    pub fn set_fee_config(&mut self, caller: &str, fees: FeeConfig) -> Result<(), VaultError> {
        if !self.access.is_admin(caller) {
            return Err(VaultError::Unauthorized);
        }
        fees.validate()?;
        self.fees = fees;
        self.events
            .push(ContractEvent::FeeConfigUpdated(FeeConfigUpdated {
                deposit_fee_percent: fees.deposit_fee_percent,
                withdraw_fee_percent: fees.withdraw_fee_percent,
            }));
        Ok(())
    }

    /// Install or remove the deposit hook. Admin-only.
    pub fn set_deposit_hook(
        &mut self,
        caller: &str,
        hook: Option<Box<dyn FlowHook>>,
    ) -> Result<(), VaultError> {
        if !self.access.is_admin(caller) {
            return Err(VaultError::Unauthorized);
        }
        self.deposit_hook = hook;
        Ok(())
    }

    /// Install or remove the withdrawal hook. Admin-only.
    pub fn set_withdraw_hook(
        &mut self,
        caller: &str,
        hook: Option<Box<dyn FlowHook>>,
    ) -> Result<(), VaultError> {
        if !self.access.is_admin(caller) {
            return Err(VaultError::Unauthorized);
        }
        self.withdraw_hook = hook;
        Ok(())
    }

    /// Pause both entry points. Admin-only.
    pub fn pause(&mut self, caller: &str) -> Result<(), VaultError> {
        if !self.access.is_admin(caller) {
            return Err(VaultError::Unauthorized);
        }
        self.pause.pause();
        Ok(())
    }

    /// Unpause. Admin-only.
    pub fn unpause(&mut self, caller: &str) -> Result<(), VaultError> {
        if !self.access.is_admin(caller) {
            return Err(VaultError::Unauthorized);
        }
        self.pause.unpause();
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// The vault's own custody account.
    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn base_token(&self) -> &str {
        &self.base_token
    }

    pub fn ledger_token(&self) -> &str {
        &self.ledger_token
    }

    pub fn adapter(&self) -> &DecimalAdapter {
        &self.adapter
    }

    pub fn fee_config(&self) -> FeeConfig {
        self.fees
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn caps(&self) -> &FlowCapLedger {
        &self.caps
    }

    pub fn caps_mut(&mut self) -> &mut FlowCapLedger {
        &mut self.caps
    }

    pub fn limiter(&self) -> &PeriodicRateLimiter {
        &self.limiter
    }

    pub fn limiter_mut(&mut self) -> &mut PeriodicRateLimiter {
        &mut self.limiter
    }

    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}
