//! Composite trade helper — multi-step user pipelines in one call
//!
//! The helper owns the 1:1 wrapper between the raw asset and the base
//! asset and chains wrap/deposit/withdraw/trade steps into atomic
//! pipelines. Funds always move through the helper's own account, the
//! helper fee is charged on the pipeline's final output, and any stage
//! failure rolls the whole pipeline back. A permit with a zero deadline
//! means "rely on the existing allowance", not a zero-deadline
//! signature.

use rust_decimal::Decimal;
use tracing::{debug, warn};
use types::fee::FEE_PERCENT_LIMIT;
use types::ids::AccountId;

use crate::arbitrage::{SwapKind, SwapVenue};
use crate::decimal::fee_amount;
use crate::errors::HelperError;
use crate::events::{ContractEvent, PipelineExecuted};
use crate::hooks::{FlowDirection, FlowHook, HookContext};
use crate::security::AccessControl;
use crate::token::{PermitGrant, TokenBank};
use crate::vault::CollateralVault;

/// Venue leg parameters for the trading pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSpec {
    pub target_token: String,
    pub min_out: Decimal,
    pub deadline: i64,
}

/// Chains wrap, vault, and venue steps into single atomic operations.
#[derive(Debug, Clone)]
pub struct CompositeTradeHelper {
    address: AccountId,
    raw_token: String,
    trade_fee_percent: u64,
    hook: Option<Box<dyn FlowHook>>,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl CompositeTradeHelper {
    pub fn new(admin: impl Into<String>, raw_token: impl Into<String>) -> Self {
        Self {
            address: AccountId::new(),
            raw_token: raw_token.into(),
            trade_fee_percent: 0,
            hook: None,
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    /// The helper's custody account (also the wrapper reserve).
    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn raw_token(&self) -> &str {
        &self.raw_token
    }

    pub fn trade_fee_percent(&self) -> u64 {
        self.trade_fee_percent
    }

    // ───────────────────────── Wrapper ─────────────────────────

    /// Wrap `amount` of the raw asset 1:1 into the base asset.
    ///
    /// Pulls the raw asset from `funder` (allowance required) and mints
    /// the base asset back to them.
    pub fn wrap(
        &mut self,
        bank: &mut TokenBank,
        base_token: &str,
        funder: AccountId,
        amount: Decimal,
    ) -> Result<(), HelperError> {
        if amount <= Decimal::ZERO {
            return Err(HelperError::InvalidParameter {
                reason: "amount must be positive".to_string(),
            });
        }
        let bank_snapshot = bank.clone();
        let result = self.wrap_into(bank, base_token, funder, funder, amount);
        if result.is_err() {
            *bank = bank_snapshot;
        }
        result
    }

    /// Unwrap `amount` of the base asset back into the raw asset 1:1.
    pub fn unwrap(
        &mut self,
        bank: &mut TokenBank,
        base_token: &str,
        funder: AccountId,
        amount: Decimal,
    ) -> Result<(), HelperError> {
        if amount <= Decimal::ZERO {
            return Err(HelperError::InvalidParameter {
                reason: "amount must be positive".to_string(),
            });
        }
        let bank_snapshot = bank.clone();
        let result = (|| -> Result<(), HelperError> {
            bank.burn(base_token, &funder, amount)?;
            bank.transfer(&self.raw_token, &self.address, funder, amount)?;
            Ok(())
        })();
        if result.is_err() {
            *bank = bank_snapshot;
        }
        result
    }

    /// Pull raw asset from `funder` into the reserve and mint base asset
    /// to `recipient`.
    fn wrap_into(
        &mut self,
        bank: &mut TokenBank,
        base_token: &str,
        funder: AccountId,
        recipient: AccountId,
        amount: Decimal,
    ) -> Result<(), HelperError> {
        bank.transfer_from(&self.raw_token, &self.address, &funder, self.address, amount)?;
        bank.mint(base_token, recipient, amount)?;
        Ok(())
    }

    // ───────────────────────── Pipelines ─────────────────────────

    /// Wrap the raw asset and deposit the result into the vault. Returns
    /// the ledger units forwarded to `recipient` after the helper fee.
    pub fn wrap_and_deposit(
        &mut self,
        bank: &mut TokenBank,
        vault: &mut CollateralVault,
        funder: AccountId,
        recipient: AccountId,
        amount: Decimal,
        permit: &PermitGrant,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, HelperError> {
        self.run_pipeline("wrap_and_deposit", bank, vault, funder, recipient, amount, |helper, bank, vault| {
            helper.apply_permit(bank, &helper.raw_token.clone(), funder, permit, now)?;
            helper.wrap_into(bank, &vault.base_token().to_string(), funder, helper.address, amount)?;

            let base_token = vault.base_token().to_string();
            bank.approve(&base_token, helper.address, vault.address(), amount)?;
            let minted = vault.deposit(bank, helper.address, helper.address, amount, now, payload.clone())?;

            let ledger_token = vault.ledger_token().to_string();
            let (out, fee) = helper.charge_fee(bank, &ledger_token, minted, funder, recipient, now, &payload)?;
            bank.transfer(&ledger_token, &helper.address, recipient, out)?;
            Ok((out, fee))
        })
    }

    /// Deposit the base asset and sell the minted ledger units on the
    /// venue. Returns the target tokens forwarded after the helper fee.
    #[allow(clippy::too_many_arguments)]
    pub fn deposit_and_trade(
        &mut self,
        bank: &mut TokenBank,
        vault: &mut CollateralVault,
        venue: &mut dyn SwapVenue,
        funder: AccountId,
        recipient: AccountId,
        amount: Decimal,
        trade: &TradeSpec,
        permit: &PermitGrant,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, HelperError> {
        self.run_pipeline("deposit_and_trade", bank, vault, funder, recipient, amount, |helper, bank, vault| {
            let base_token = vault.base_token().to_string();
            helper.apply_permit(bank, &base_token, funder, permit, now)?;
            bank.transfer_from(&base_token, &helper.address, &funder, helper.address, amount)?;

            bank.approve(&base_token, helper.address, vault.address(), amount)?;
            let minted = vault.deposit(bank, helper.address, helper.address, amount, now, payload.clone())?;

            let ledger_token = vault.ledger_token().to_string();
            let received = helper.swap_exact_in(bank, venue, &ledger_token, trade, minted, now)?;
            let (out, fee) = helper.charge_fee(bank, &trade.target_token, received, funder, recipient, now, &payload)?;
            bank.transfer(&trade.target_token, &helper.address, recipient, out)?;
            Ok((out, fee))
        })
    }

    /// Withdraw from the vault and unwrap the released base asset back
    /// into the raw asset. Returns the raw amount forwarded after the
    /// helper fee.
    pub fn withdraw_and_unwrap(
        &mut self,
        bank: &mut TokenBank,
        vault: &mut CollateralVault,
        funder: AccountId,
        recipient: AccountId,
        ledger_amount: Decimal,
        permit: &PermitGrant,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, HelperError> {
        self.run_pipeline("withdraw_and_unwrap", bank, vault, funder, recipient, ledger_amount, |helper, bank, vault| {
            let ledger_token = vault.ledger_token().to_string();
            helper.apply_permit(bank, &ledger_token, funder, permit, now)?;
            bank.transfer_from(&ledger_token, &helper.address, &funder, helper.address, ledger_amount)?;

            let released = vault.withdraw(bank, helper.address, helper.address, ledger_amount, now, payload.clone())?;

            let base_token = vault.base_token().to_string();
            let (out, fee) = helper.charge_fee(bank, &base_token, released, funder, recipient, now, &payload)?;
            // Burn the wrapped form and release raw 1:1
            bank.burn(&base_token, &helper.address, out)?;
            bank.transfer(&helper.raw_token.clone(), &helper.address, recipient, out)?;
            Ok((out, fee))
        })
    }

    /// Withdraw from the vault and sell the released base asset on the
    /// venue. Returns the target tokens forwarded after the helper fee.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw_and_trade(
        &mut self,
        bank: &mut TokenBank,
        vault: &mut CollateralVault,
        venue: &mut dyn SwapVenue,
        funder: AccountId,
        recipient: AccountId,
        ledger_amount: Decimal,
        trade: &TradeSpec,
        permit: &PermitGrant,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, HelperError> {
        self.run_pipeline("withdraw_and_trade", bank, vault, funder, recipient, ledger_amount, |helper, bank, vault| {
            let ledger_token = vault.ledger_token().to_string();
            helper.apply_permit(bank, &ledger_token, funder, permit, now)?;
            bank.transfer_from(&ledger_token, &helper.address, &funder, helper.address, ledger_amount)?;

            let released = vault.withdraw(bank, helper.address, helper.address, ledger_amount, now, payload.clone())?;

            let base_token = vault.base_token().to_string();
            let received = helper.swap_exact_in(bank, venue, &base_token, trade, released, now)?;
            let (out, fee) = helper.charge_fee(bank, &trade.target_token, received, funder, recipient, now, &payload)?;
            bank.transfer(&trade.target_token, &helper.address, recipient, out)?;
            Ok((out, fee))
        })
    }

    /// Wrap, deposit, and sell the minted ledger units in one shot.
    #[allow(clippy::too_many_arguments)]
    pub fn wrap_deposit_and_trade(
        &mut self,
        bank: &mut TokenBank,
        vault: &mut CollateralVault,
        venue: &mut dyn SwapVenue,
        funder: AccountId,
        recipient: AccountId,
        amount: Decimal,
        trade: &TradeSpec,
        permit: &PermitGrant,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, HelperError> {
        self.run_pipeline("wrap_deposit_and_trade", bank, vault, funder, recipient, amount, |helper, bank, vault| {
            helper.apply_permit(bank, &helper.raw_token.clone(), funder, permit, now)?;
            let base_token = vault.base_token().to_string();
            helper.wrap_into(bank, &base_token, funder, helper.address, amount)?;

            bank.approve(&base_token, helper.address, vault.address(), amount)?;
            let minted = vault.deposit(bank, helper.address, helper.address, amount, now, payload.clone())?;

            let ledger_token = vault.ledger_token().to_string();
            let received = helper.swap_exact_in(bank, venue, &ledger_token, trade, minted, now)?;
            let (out, fee) = helper.charge_fee(bank, &trade.target_token, received, funder, recipient, now, &payload)?;
            bank.transfer(&trade.target_token, &helper.address, recipient, out)?;
            Ok((out, fee))
        })
    }

    // ───────────────────────── Internals ─────────────────────────

    /// Snapshot, run, roll back on failure, emit the pipeline event on
    /// success.
    #[allow(clippy::too_many_arguments)]
    fn run_pipeline<F>(
        &mut self,
        pipeline: &str,
        bank: &mut TokenBank,
        vault: &mut CollateralVault,
        funder: AccountId,
        recipient: AccountId,
        amount_in: Decimal,
        body: F,
    ) -> Result<Decimal, HelperError>
    where
        F: FnOnce(
            &mut Self,
            &mut TokenBank,
            &mut CollateralVault,
        ) -> Result<(Decimal, Decimal), HelperError>,
    {
        if amount_in <= Decimal::ZERO {
            return Err(HelperError::InvalidParameter {
                reason: "amount must be positive".to_string(),
            });
        }
        let bank_snapshot = bank.clone();
        let vault_snapshot = vault.clone();
        let hook_snapshot = self.hook.clone();
        match body(self, bank, vault) {
            Ok((amount_out, fee)) => {
                self.events
                    .push(ContractEvent::PipelineExecuted(PipelineExecuted {
                        pipeline: pipeline.to_string(),
                        funder,
                        recipient,
                        amount_in,
                        amount_out,
                        fee,
                    }));
                debug!(pipeline, %funder, %amount_in, %amount_out, %fee, "pipeline executed");
                Ok(amount_out)
            }
            Err(err) => {
                *bank = bank_snapshot;
                *vault = vault_snapshot;
                self.hook = hook_snapshot;
                warn!(pipeline, %funder, "pipeline rolled back");
                Err(err)
            }
        }
    }

    /// Apply a permit when one is supplied; a zero deadline skips the
    /// application and relies on the existing allowance.
    fn apply_permit(
        &self,
        bank: &mut TokenBank,
        token: &str,
        funder: AccountId,
        permit: &PermitGrant,
        now: i64,
    ) -> Result<(), HelperError> {
        if permit.is_present() {
            bank.permit(token, funder, self.address, permit, now)?;
        }
        Ok(())
    }

    /// Sell `amount` of `token_in` for the trade's target token.
    fn swap_exact_in(
        &self,
        bank: &mut TokenBank,
        venue: &mut dyn SwapVenue,
        token_in: &str,
        trade: &TradeSpec,
        amount: Decimal,
        now: i64,
    ) -> Result<Decimal, HelperError> {
        bank.approve(token_in, self.address, venue.address(), amount)?;
        let received = venue.execute(
            bank,
            self.address,
            SwapKind::ExactIn,
            token_in,
            &trade.target_token,
            amount,
            trade.min_out,
            trade.deadline,
            now,
        )?;
        bank.approve(token_in, self.address, venue.address(), Decimal::ZERO)?;
        Ok(received)
    }

    /// Charge the helper fee on the pipeline's final output and run the
    /// trade hook over it. Returns `(output after fee, fee)`.
    #[allow(clippy::too_many_arguments)]
    fn charge_fee(
        &mut self,
        bank: &mut TokenBank,
        token: &str,
        amount: Decimal,
        funder: AccountId,
        recipient: AccountId,
        now: i64,
        payload: &[u8],
    ) -> Result<(Decimal, Decimal), HelperError> {
        let exempt = self
            .hook
            .as_ref()
            .map_or(false, |hook| hook.fee_exempt(&recipient));
        let percent = if exempt { 0 } else { self.trade_fee_percent };
        if amount.is_zero() && percent != 0 {
            return Err(HelperError::ZeroAmount);
        }
        let scale = bank.token(token)?.decimals();
        let fee = fee_amount(amount, percent, scale).ok_or(HelperError::Overflow)?;
        if percent != 0 && fee.is_zero() {
            return Err(HelperError::FeeRoundsToZero);
        }
        let out = amount - fee;

        if let Some(hook) = self.hook.as_mut() {
            let spender = hook.address();
            bank.approve(token, self.address, spender, fee)?;
            let ctx = HookContext {
                caller: self.address,
                direction: FlowDirection::HelperTrade,
                from: funder,
                to: recipient,
                token: token.to_string(),
                amount_before_fee: amount,
                amount_after_fee: out,
                now,
                payload: payload.to_vec(),
            };
            hook.on_flow(bank, &ctx)?;
            bank.approve(token, self.address, spender, Decimal::ZERO)?;
            self.events.extend(hook.drain_events());
        }
        Ok((out, fee))
    }

    // ───────────────────────── Configuration ─────────────────────────

    /// Set the helper trade fee percent. Admin-only, bounded by the hard
    /// ceiling.
    pub fn set_trade_fee(&mut self, caller: &str, percent: u64) -> Result<(), HelperError> {
        if !self.access.is_admin(caller) {
            return Err(HelperError::Unauthorized);
        }
        if percent > FEE_PERCENT_LIMIT {
            return Err(HelperError::InvalidParameter {
                reason: "trade fee percent exceeds the fee ceiling".to_string(),
            });
        }
        self.trade_fee_percent = percent;
        Ok(())
    }

    /// Install or remove the trade hook. Admin-only.
    pub fn set_hook(
        &mut self,
        caller: &str,
        hook: Option<Box<dyn FlowHook>>,
    ) -> Result<(), HelperError> {
        if !self.access.is_admin(caller) {
            return Err(HelperError::Unauthorized);
        }
        self.hook = hook;
        Ok(())
    }

    /// Access control handle.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::FlowCapLedger;
    use crate::decimal::DecimalAdapter;
    use crate::errors::VenueError;
    use crate::hooks::FeeCaptureHook;
    use crate::rate_limit::PeriodicRateLimiter;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    /// Venue paying a constant rate of target per unit sold.
    #[derive(Debug)]
    struct TestVenue {
        address: AccountId,
        inventory: AccountId,
        rate: Decimal,
    }

    impl TestVenue {
        fn new(bank: &mut TokenBank, rate: Decimal) -> Self {
            let inventory = AccountId::new();
            bank.mint("TGT", inventory, Decimal::from(1_000_000)).unwrap();
            Self {
                address: AccountId::new(),
                inventory,
                rate,
            }
        }
    }

    impl SwapVenue for TestVenue {
        fn address(&self) -> AccountId {
            self.address
        }

        fn execute(
            &mut self,
            bank: &mut TokenBank,
            trader: AccountId,
            kind: SwapKind,
            token_in: &str,
            token_out: &str,
            amount: Decimal,
            limit: Decimal,
            deadline: i64,
            now: i64,
        ) -> Result<Decimal, VenueError> {
            assert_eq!(kind, SwapKind::ExactIn);
            if now > deadline {
                return Err(VenueError::DeadlineExceeded { deadline });
            }
            let receive = amount * self.rate;
            if receive < limit {
                return Err(VenueError::SlippageLimit {
                    limit,
                    actual: receive,
                });
            }
            bank.transfer_from(token_in, &self.address, &trader, self.inventory, amount)?;
            bank.transfer(token_out, &self.inventory, trader, receive)?;
            Ok(receive)
        }
    }

    struct Fixture {
        bank: TokenBank,
        vault: CollateralVault,
        helper: CompositeTradeHelper,
        alice: AccountId,
    }

    fn setup() -> Fixture {
        let mut bank = TokenBank::new();
        for (token, decimals) in [("RAW", 6), ("USDm", 6), ("sUSD", 18), ("TGT", 6)] {
            bank.create_token(token, decimals).unwrap();
        }
        let vault = CollateralVault::new(
            "admin",
            "USDm",
            "sUSD",
            DecimalAdapter::new(6),
            FlowCapLedger::new("admin", Decimal::from(1_000_000), Decimal::from(1_000_000)),
            PeriodicRateLimiter::new("admin", 20, Decimal::from(1_000_000), Decimal::ZERO, 0),
        );
        Fixture {
            bank,
            vault,
            helper: CompositeTradeHelper::new("admin", "RAW"),
            alice: AccountId::new(),
        }
    }

    fn fund_raw(f: &mut Fixture, amount: Decimal) {
        f.bank.mint("RAW", f.alice, amount).unwrap();
        f.bank
            .approve("RAW", f.alice, f.helper.address(), amount)
            .unwrap();
    }

    fn permit_for(amount: Decimal, nonce: u64) -> PermitGrant {
        PermitGrant {
            amount,
            deadline: 10_000,
            nonce,
            signature: b"sig".to_vec(),
        }
    }

    // ─── Wrap / unwrap ───

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let mut f = setup();
        fund_raw(&mut f, d("100"));
        f.helper.wrap(&mut f.bank, "USDm", f.alice, d("100")).unwrap();
        assert_eq!(f.bank.balance_of("USDm", &f.alice).unwrap(), d("100"));
        assert_eq!(f.bank.balance_of("RAW", &f.alice).unwrap(), Decimal::ZERO);

        f.helper
            .unwrap(&mut f.bank, "USDm", f.alice, d("100"))
            .unwrap();
        assert_eq!(f.bank.balance_of("RAW", &f.alice).unwrap(), d("100"));
        assert_eq!(f.bank.total_supply("USDm").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_unwrap_more_than_wrapped_fails() {
        let mut f = setup();
        fund_raw(&mut f, d("10"));
        f.helper.wrap(&mut f.bank, "USDm", f.alice, d("10")).unwrap();
        let err = f
            .helper
            .unwrap(&mut f.bank, "USDm", f.alice, d("11"))
            .unwrap_err();
        assert!(matches!(err, HelperError::Token(_)));
    }

    // ─── Pipelines ───

    #[test]
    fn test_wrap_and_deposit() {
        let mut f = setup();
        fund_raw(&mut f, d("100"));
        let out = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("100"));
        assert_eq!(f.bank.balance_of("sUSD", &f.alice).unwrap(), d("100"));
        assert_eq!(f.bank.balance_of("RAW", &f.alice).unwrap(), Decimal::ZERO);
        assert_eq!(f.helper.events().len(), 1);
    }

    #[test]
    fn test_wrap_and_deposit_with_permit() {
        let mut f = setup();
        f.bank.mint("RAW", f.alice, d("50")).unwrap();
        // No prior allowance; the permit supplies it
        let out = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("50"),
                &permit_for(d("50"), 1),
                1_000,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("50"));
    }

    #[test]
    fn test_wrap_and_deposit_helper_fee() {
        let mut f = setup();
        f.helper.set_trade_fee("admin", 10_000).unwrap();
        fund_raw(&mut f, d("100"));
        let out = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        // 1% helper fee on the minted output
        assert_eq!(out, d("99"));
        assert_eq!(f.bank.balance_of("sUSD", &f.alice).unwrap(), d("99"));
        // Without a hook the fee stays with the helper
        assert_eq!(
            f.bank.balance_of("sUSD", &f.helper.address()).unwrap(),
            d("1")
        );
    }

    #[test]
    fn test_helper_fee_captured_by_hook() {
        let mut f = setup();
        let treasury = AccountId::new();
        let mut hook = FeeCaptureHook::new("admin", treasury);
        hook.set_registered_callers("admin", &[f.helper.address()], &[true])
            .unwrap();
        f.helper.set_hook("admin", Some(Box::new(hook))).unwrap();
        f.helper.set_trade_fee("admin", 10_000).unwrap();

        fund_raw(&mut f, d("100"));
        let out = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("99"));
        assert_eq!(f.bank.balance_of("sUSD", &treasury).unwrap(), d("1"));
    }

    #[test]
    fn test_helper_fee_exemption_follows_recipient() {
        let mut f = setup();
        let bob = AccountId::new();
        let treasury = AccountId::new();
        let mut hook = FeeCaptureHook::new("admin", treasury);
        hook.set_registered_callers("admin", &[f.helper.address()], &[true])
            .unwrap();
        hook.set_fee_bypass("admin", &[bob], &[true]).unwrap();
        f.helper.set_hook("admin", Some(Box::new(hook))).unwrap();
        f.helper.set_trade_fee("admin", 10_000).unwrap();

        // Alice funds the pipeline; exempt bob receives the full output
        fund_raw(&mut f, d("100"));
        let out = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                bob,
                d("100"),
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("100"));
        assert_eq!(f.bank.balance_of("sUSD", &bob).unwrap(), d("100"));
        assert_eq!(f.bank.balance_of("sUSD", &treasury).unwrap(), Decimal::ZERO);

        // Paying to herself, alice is charged as usual
        fund_raw(&mut f, d("100"));
        let out = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_001,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("99"));
        assert_eq!(f.bank.balance_of("sUSD", &treasury).unwrap(), d("1"));
    }

    #[test]
    fn test_deposit_and_trade() {
        let mut f = setup();
        let mut venue = TestVenue::new(&mut f.bank, d("0.9"));
        f.bank.mint("USDm", f.alice, d("100")).unwrap();
        f.bank
            .approve("USDm", f.alice, f.helper.address(), d("100"))
            .unwrap();

        let out = f
            .helper
            .deposit_and_trade(
                &mut f.bank,
                &mut f.vault,
                &mut venue,
                f.alice,
                f.alice,
                d("100"),
                &TradeSpec {
                    target_token: "TGT".to_string(),
                    min_out: d("80"),
                    deadline: 5_000,
                },
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("90"));
        assert_eq!(f.bank.balance_of("TGT", &f.alice).unwrap(), d("90"));
        // The ledger units were sold, not kept
        assert_eq!(f.bank.balance_of("sUSD", &f.alice).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_withdraw_and_unwrap() {
        let mut f = setup();
        fund_raw(&mut f, d("100"));
        f.helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        f.bank
            .approve("sUSD", f.alice, f.helper.address(), d("100"))
            .unwrap();
        let out = f
            .helper
            .withdraw_and_unwrap(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_100,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("100"));
        assert_eq!(f.bank.balance_of("RAW", &f.alice).unwrap(), d("100"));
        assert_eq!(f.bank.total_supply("sUSD").unwrap(), Decimal::ZERO);
        assert_eq!(f.bank.total_supply("USDm").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_withdraw_and_trade() {
        let mut f = setup();
        let mut venue = TestVenue::new(&mut f.bank, d("1.1"));
        fund_raw(&mut f, d("100"));
        f.helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("100"),
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        f.bank
            .approve("sUSD", f.alice, f.helper.address(), d("100"))
            .unwrap();

        let out = f
            .helper
            .withdraw_and_trade(
                &mut f.bank,
                &mut f.vault,
                &mut venue,
                f.alice,
                f.alice,
                d("100"),
                &TradeSpec {
                    target_token: "TGT".to_string(),
                    min_out: d("100"),
                    deadline: 5_000,
                },
                &PermitGrant::none(),
                1_100,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("110"));
        assert_eq!(f.bank.balance_of("TGT", &f.alice).unwrap(), d("110"));
    }

    #[test]
    fn test_wrap_deposit_and_trade() {
        let mut f = setup();
        let mut venue = TestVenue::new(&mut f.bank, d("0.95"));
        fund_raw(&mut f, d("200"));
        let out = f
            .helper
            .wrap_deposit_and_trade(
                &mut f.bank,
                &mut f.vault,
                &mut venue,
                f.alice,
                f.alice,
                d("200"),
                &TradeSpec {
                    target_token: "TGT".to_string(),
                    min_out: d("150"),
                    deadline: 5_000,
                },
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap();
        assert_eq!(out, d("190"));
    }

    // ─── Atomicity ───

    #[test]
    fn test_slippage_rolls_back_whole_pipeline() {
        let mut f = setup();
        let mut venue = TestVenue::new(&mut f.bank, d("0.5"));
        fund_raw(&mut f, d("100"));
        let err = f
            .helper
            .wrap_deposit_and_trade(
                &mut f.bank,
                &mut f.vault,
                &mut venue,
                f.alice,
                f.alice,
                d("100"),
                &TradeSpec {
                    target_token: "TGT".to_string(),
                    min_out: d("90"),
                    deadline: 5_000,
                },
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HelperError::Venue(_)));
        // Everything restored: raw back with alice, no wrapped or ledger
        // supply, vault caps untouched
        assert_eq!(f.bank.balance_of("RAW", &f.alice).unwrap(), d("100"));
        assert_eq!(f.bank.total_supply("USDm").unwrap(), Decimal::ZERO);
        assert_eq!(f.bank.total_supply("sUSD").unwrap(), Decimal::ZERO);
        assert_eq!(f.vault.caps().global_net(), Decimal::ZERO);
        assert!(f.helper.events().is_empty());
    }

    #[test]
    fn test_expired_permit_fails_pipeline() {
        let mut f = setup();
        f.bank.mint("RAW", f.alice, d("50")).unwrap();
        let mut permit = permit_for(d("50"), 1);
        permit.deadline = 500;
        let err = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("50"),
                &permit,
                1_000,
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HelperError::Token(_)));
        assert_eq!(f.bank.balance_of("RAW", &f.alice).unwrap(), d("50"));
    }

    #[test]
    fn test_permit_replay_across_pipelines_rejected() {
        let mut f = setup();
        f.bank.mint("RAW", f.alice, d("100")).unwrap();
        f.helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("50"),
                &permit_for(d("50"), 7),
                1_000,
                Vec::new(),
            )
            .unwrap();
        let err = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                d("50"),
                &permit_for(d("50"), 7),
                1_001,
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HelperError::Token(_)));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut f = setup();
        let err = f
            .helper
            .wrap_and_deposit(
                &mut f.bank,
                &mut f.vault,
                f.alice,
                f.alice,
                Decimal::ZERO,
                &PermitGrant::none(),
                1_000,
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HelperError::InvalidParameter { .. }));
    }

    #[test]
    fn test_set_trade_fee_bounds_and_authorization() {
        let mut f = setup();
        assert_eq!(
            f.helper.set_trade_fee("eve", 1).unwrap_err(),
            HelperError::Unauthorized
        );
        assert!(matches!(
            f.helper.set_trade_fee("admin", 100_001).unwrap_err(),
            HelperError::InvalidParameter { .. }
        ));
        f.helper.set_trade_fee("admin", 100_000).unwrap();
        assert_eq!(f.helper.trade_fee_percent(), 100_000);
    }
}
