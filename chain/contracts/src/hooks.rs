//! Flow hooks — pluggable fee capture and rebate on value movement
//!
//! The vault and market invoke a hook (when one is registered for the
//! direction) after pulling funds and before minting or releasing. The
//! invoking component grants the hook an allowance of exactly the fee it
//! computed and resets that allowance afterwards whether or not the hook
//! consumed it; a hook must never assume the full grant is its to keep.
//! Flow-cap and rate-limit accounting is the invoking component's job,
//! not the hook's, so it happens even when fees are bypassed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use types::fee::MULTIPLIER_UNIT;
use types::ids::AccountId;

use crate::errors::HookError;
use crate::events::{ContractEvent, FeeCaptured, MultiplierUpdated, RebateDispatched};
use crate::rebate::RebateDispatcher;
use crate::security::{AccessControl, AllowList};
use crate::token::TokenBank;

/// Which movement the hook is observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowDirection {
    Deposit,
    Withdraw,
    MarketMint,
    MarketRedeem,
    HelperTrade,
}

/// Everything a hook may consult about the flow it is invoked for.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Component account invoking the hook (holds the fee and granted the
    /// allowance).
    pub caller: AccountId,
    pub direction: FlowDirection,
    pub from: AccountId,
    pub to: AccountId,
    /// Symbol of the token the fee is denominated in.
    pub token: String,
    pub amount_before_fee: Decimal,
    pub amount_after_fee: Decimal,
    pub now: i64,
    /// Opaque caller-supplied bytes, forwarded untouched.
    pub payload: Vec<u8>,
}

/// Synchronous observer of a value movement.
pub trait FlowHook: std::fmt::Debug {
    /// Account identity of the hook (the spender the fee allowance is
    /// granted to).
    fn address(&self) -> AccountId;

    /// Whether `account` is exempt from fees on this hook. Components
    /// pass the flow's recipient (the `to` side) and check this before
    /// computing the fee, so an exempt flow reaches `on_flow` with
    /// `amount_before_fee == amount_after_fee`.
    fn fee_exempt(&self, account: &AccountId) -> bool;

    /// Observe the flow. Any error aborts the whole operation.
    fn on_flow(&mut self, bank: &mut TokenBank, ctx: &HookContext) -> Result<(), HookError>;

    fn box_clone(&self) -> Box<dyn FlowHook>;

    fn drain_events(&mut self) -> Vec<ContractEvent>;
}

impl Clone for Box<dyn FlowHook> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// The production hook: moves the fee to the treasury, then dispatches a
/// multiplier-scaled rebate to the flow recipient.
#[derive(Debug, Clone)]
pub struct FeeCaptureHook {
    address: AccountId,
    treasury: AccountId,
    /// Components allowed to invoke this hook; multiplier keys must come
    /// from this set.
    registered_callers: AllowList,
    multipliers: HashMap<AccountId, u64>,
    fee_bypass: AllowList,
    dispatcher: Option<RebateDispatcher>,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl FeeCaptureHook {
    pub fn new(admin: impl Into<String>, treasury: AccountId) -> Self {
        Self {
            address: AccountId::new(),
            treasury,
            registered_callers: AllowList::new(),
            multipliers: HashMap::new(),
            fee_bypass: AllowList::new(),
            dispatcher: None,
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    /// Treasury account fees accumulate in.
    pub fn treasury(&self) -> &AccountId {
        &self.treasury
    }

    /// Rebate multiplier for a caller (zero when unset).
    pub fn multiplier(&self, caller: &AccountId) -> u64 {
        self.multipliers.get(caller).copied().unwrap_or(0)
    }

    /// Whether a component may invoke this hook.
    pub fn is_registered(&self, caller: &AccountId) -> bool {
        self.registered_callers.is_included(caller)
    }

    // ───────────────────────── Configuration ─────────────────────────

    /// Batch-update the registered-caller list. Admin-only. Unregistering
    /// a caller also drops its multiplier.
    pub fn set_registered_callers(
        &mut self,
        caller: &str,
        accounts: &[AccountId],
        flags: &[bool],
    ) -> Result<(), HookError> {
        if !self.access.is_admin(caller) {
            return Err(HookError::Unauthorized);
        }
        if !self.registered_callers.set(accounts, flags) {
            return Err(HookError::InvalidParameter {
                reason: "accounts/flags length mismatch".to_string(),
            });
        }
        for (account, flag) in accounts.iter().zip(flags) {
            if !flag {
                self.multipliers.remove(account);
            }
        }
        Ok(())
    }

    /// Set the rebate multiplier for a registered caller. Admin-only;
    /// re-emits on identical values.
    pub fn set_multiplier(
        &mut self,
        caller: &str,
        key: AccountId,
        multiplier: u64,
    ) -> Result<(), HookError> {
        if !self.access.is_admin(caller) {
            return Err(HookError::Unauthorized);
        }
        if !self.registered_callers.is_included(&key) {
            return Err(HookError::UnknownMultiplierKey { caller: key });
        }
        self.multipliers.insert(key, multiplier);
        self.events
            .push(ContractEvent::MultiplierUpdated(MultiplierUpdated {
                caller: key,
                multiplier,
            }));
        Ok(())
    }

    /// Batch-update the fee-bypass list. Admin-only. Exempts accounts from
    /// fees only; cap accounting is unaffected.
    pub fn set_fee_bypass(
        &mut self,
        caller: &str,
        accounts: &[AccountId],
        flags: &[bool],
    ) -> Result<(), HookError> {
        if !self.access.is_admin(caller) {
            return Err(HookError::Unauthorized);
        }
        if !self.fee_bypass.set(accounts, flags) {
            return Err(HookError::InvalidParameter {
                reason: "accounts/flags length mismatch".to_string(),
            });
        }
        Ok(())
    }

    /// Install or remove the rebate dispatcher. Admin-only.
    pub fn set_dispatcher(
        &mut self,
        caller: &str,
        dispatcher: Option<RebateDispatcher>,
    ) -> Result<(), HookError> {
        if !self.access.is_admin(caller) {
            return Err(HookError::Unauthorized);
        }
        self.dispatcher = dispatcher;
        Ok(())
    }

    /// Access control handle.
    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }
}

impl FlowHook for FeeCaptureHook {
    fn address(&self) -> AccountId {
        self.address
    }

    fn fee_exempt(&self, account: &AccountId) -> bool {
        self.fee_bypass.is_included(account)
    }

    fn on_flow(&mut self, bank: &mut TokenBank, ctx: &HookContext) -> Result<(), HookError> {
        if !self.registered_callers.is_included(&ctx.caller) {
            warn!(caller = %ctx.caller, "unregistered component invoked fee hook");
            return Err(HookError::UnauthorizedCaller);
        }

        let fee = ctx.amount_before_fee - ctx.amount_after_fee;
        if fee.is_zero() {
            return Ok(());
        }

        // Pull the fee from the invoking component into the treasury,
        // spending the allowance it granted for exactly this amount.
        bank.transfer_from(&ctx.token, &self.address, &ctx.caller, self.treasury, fee)?;
        self.events.push(ContractEvent::FeeCaptured(FeeCaptured {
            caller: ctx.caller,
            token: ctx.token.clone(),
            amount: fee,
        }));
        debug!(caller = %ctx.caller, %fee, token = %ctx.token, "fee captured");

        let multiplier = self.multiplier(&ctx.caller);
        if multiplier == 0 {
            return Ok(());
        }
        let Some(dispatcher) = &self.dispatcher else {
            return Ok(());
        };
        let scale = bank.token(&ctx.token)?.decimals();
        let rebate_value = fee
            .checked_mul(Decimal::from(multiplier))
            .ok_or(HookError::Dispatch(crate::errors::RebateError::Overflow))?
            .checked_div(Decimal::from(MULTIPLIER_UNIT))
            .ok_or(HookError::Dispatch(crate::errors::RebateError::Overflow))?
            .trunc_with_scale(scale);
        if rebate_value.is_zero() {
            return Ok(());
        }
        let sent = dispatcher.send(bank, ctx.to, rebate_value)?;
        if !sent.is_zero() {
            self.events
                .push(ContractEvent::RebateDispatched(RebateDispatched {
                    to: ctx.to,
                    token: dispatcher.rebate_token().to_string(),
                    amount: sent,
                }));
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn FlowHook> {
        Box::new(self.clone())
    }

    fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebate::FixedPriceReference;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    struct Fixture {
        bank: TokenBank,
        hook: FeeCaptureHook,
        component: AccountId,
        treasury: AccountId,
        recipient: AccountId,
    }

    fn setup() -> Fixture {
        let mut bank = TokenBank::new();
        bank.create_token("USDm", 6).unwrap();
        let component = AccountId::new();
        let treasury = AccountId::new();
        let mut hook = FeeCaptureHook::new("admin", treasury);
        hook.set_registered_callers("admin", &[component], &[true])
            .unwrap();
        Fixture {
            bank,
            hook,
            component,
            treasury,
            recipient: AccountId::new(),
        }
    }

    fn ctx(f: &Fixture, before: Decimal, after: Decimal) -> HookContext {
        HookContext {
            caller: f.component,
            direction: FlowDirection::Deposit,
            from: f.recipient,
            to: f.recipient,
            token: "USDm".to_string(),
            amount_before_fee: before,
            amount_after_fee: after,
            now: 1_000,
            payload: Vec::new(),
        }
    }

    fn fund_and_approve(f: &mut Fixture, fee: Decimal) {
        f.bank.mint("USDm", f.component, fee).unwrap();
        f.bank
            .approve("USDm", f.component, f.hook.address(), fee)
            .unwrap();
    }

    #[test]
    fn test_fee_moves_to_treasury() {
        let mut f = setup();
        fund_and_approve(&mut f, d("0.012345"));
        let ctx = ctx(&f, d("1.2345"), d("1.222155"));
        f.hook.on_flow(&mut f.bank, &ctx).unwrap();
        assert_eq!(
            f.bank.balance_of("USDm", &f.treasury).unwrap(),
            d("0.012345")
        );
        assert_eq!(f.hook.drain_events().len(), 1);
    }

    #[test]
    fn test_unregistered_caller_rejected() {
        let mut f = setup();
        let mut ctx = ctx(&f, Decimal::ONE, Decimal::ONE);
        ctx.caller = AccountId::new();
        let err = f.hook.on_flow(&mut f.bank, &ctx).unwrap_err();
        assert_eq!(err, HookError::UnauthorizedCaller);
    }

    #[test]
    fn test_zero_fee_is_noop() {
        let mut f = setup();
        let ctx = ctx(&f, Decimal::ONE, Decimal::ONE);
        f.hook.on_flow(&mut f.bank, &ctx).unwrap();
        assert_eq!(
            f.bank.balance_of("USDm", &f.treasury).unwrap(),
            Decimal::ZERO
        );
        assert!(f.hook.drain_events().is_empty());
    }

    #[test]
    fn test_fee_without_allowance_fails() {
        let mut f = setup();
        f.bank.mint("USDm", f.component, Decimal::ONE).unwrap();
        let ctx = ctx(&f, Decimal::ONE, d("0.99"));
        let err = f.hook.on_flow(&mut f.bank, &ctx).unwrap_err();
        assert!(matches!(err, HookError::Token(_)));
    }

    #[test]
    fn test_rebate_scaled_by_multiplier() {
        let mut f = setup();
        f.bank.create_token("RBT", 6).unwrap();
        let reserve = AccountId::new();
        f.bank.mint("RBT", reserve, Decimal::from(100)).unwrap();
        f.hook
            .set_dispatcher(
                "admin",
                Some(RebateDispatcher::new(
                    reserve,
                    "RBT",
                    Box::new(FixedPriceReference::new(Decimal::from(2))),
                )),
            )
            .unwrap();
        // half the fee, at price 2: rebate tokens = fee * 0.5 * 2 = fee
        f.hook
            .set_multiplier("admin", f.component, 500_000)
            .unwrap();

        fund_and_approve(&mut f, d("0.5"));
        let ctx = ctx(&f, Decimal::ONE, d("0.5"));
        f.hook.on_flow(&mut f.bank, &ctx).unwrap();

        assert_eq!(f.bank.balance_of("USDm", &f.treasury).unwrap(), d("0.5"));
        assert_eq!(f.bank.balance_of("RBT", &f.recipient).unwrap(), d("0.5"));
        // FeeCaptured + RebateDispatched
        assert_eq!(f.hook.drain_events().len(), 2);
    }

    #[test]
    fn test_no_dispatcher_skips_rebate() {
        let mut f = setup();
        f.hook
            .set_multiplier("admin", f.component, 500_000)
            .unwrap();
        fund_and_approve(&mut f, d("0.5"));
        let ctx = ctx(&f, Decimal::ONE, d("0.5"));
        f.hook.on_flow(&mut f.bank, &ctx).unwrap();
        assert_eq!(f.hook.drain_events().len(), 1);
    }

    #[test]
    fn test_multiplier_for_unregistered_key_rejected() {
        let mut f = setup();
        let stranger = AccountId::new();
        let err = f
            .hook
            .set_multiplier("admin", stranger, 500_000)
            .unwrap_err();
        assert_eq!(err, HookError::UnknownMultiplierKey { caller: stranger });
    }

    #[test]
    fn test_unregistering_caller_drops_multiplier() {
        let mut f = setup();
        f.hook
            .set_multiplier("admin", f.component, 250_000)
            .unwrap();
        f.hook
            .set_registered_callers("admin", &[f.component], &[false])
            .unwrap();
        assert_eq!(f.hook.multiplier(&f.component), 0);
        let err = f
            .hook
            .set_multiplier("admin", f.component, 250_000)
            .unwrap_err();
        assert!(matches!(err, HookError::UnknownMultiplierKey { .. }));
    }

    #[test]
    fn test_fee_bypass_flag() {
        let mut f = setup();
        let account = AccountId::new();
        assert!(!f.hook.fee_exempt(&account));
        f.hook
            .set_fee_bypass("admin", &[account], &[true])
            .unwrap();
        assert!(f.hook.fee_exempt(&account));
    }

    #[test]
    fn test_non_admin_configuration_rejected() {
        let mut f = setup();
        let account = AccountId::new();
        assert_eq!(
            f.hook
                .set_fee_bypass("eve", &[account], &[true])
                .unwrap_err(),
            HookError::Unauthorized
        );
        assert_eq!(
            f.hook.set_multiplier("eve", f.component, 1).unwrap_err(),
            HookError::Unauthorized
        );
        assert_eq!(
            f.hook.set_dispatcher("eve", None).unwrap_err(),
            HookError::Unauthorized
        );
    }
}
