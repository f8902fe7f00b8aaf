//! Settlement markets — paired claim tokens over a bounded payout
//!
//! A market issues a long/short claim token pair against collateral. One
//! unit of collateral always backs one long plus one short claim, so the
//! pair redeems to exactly one unit at any payout `p` in `[floor,
//! ceiling]`: the long side is worth `p`, the short side `1 - p`. The
//! final payout is pinned exactly once, either by a privileged setter or
//! by anyone after expiry (at the terms' expiry payout), and is immutable
//! from then on.

use rust_decimal::Decimal;
use tracing::{debug, warn};
use types::fee::{FEE_OVERRIDE_DISABLED, FEE_PERCENT_LIMIT};
use types::ids::{AccountId, MarketId};

use crate::decimal::{fee_amount, fits_scale};
use crate::errors::MarketError;
use crate::events::{
    BeaconDefaultsUpdated, ClaimsMinted, ClaimsRedeemed, ContractEvent, MarketCreated,
    MarketFeeOverrideUpdated, PayoutFinalized,
};
use crate::hooks::{FlowDirection, FlowHook, HookContext};
use crate::security::{AccessControl, PauseGuard};
use crate::token::TokenBank;

/// Resolve a per-market override against a beacon default.
///
/// The max sentinel disables fees outright; zero means "unset, use the
/// default"; anything else is taken as-is. Both the default and a live
/// override are clamped to the hard ceiling.
fn resolve_percent(override_percent: u64, default_percent: u64) -> u64 {
    if override_percent == FEE_OVERRIDE_DISABLED {
        0
    } else if override_percent == 0 {
        default_percent.min(FEE_PERCENT_LIMIT)
    } else {
        override_percent.min(FEE_PERCENT_LIMIT)
    }
}

/// Protocol-wide default mint/redeem fee percentages for markets.
#[derive(Debug, Clone)]
pub struct FeeBeacon {
    mint_fee_percent: u64,
    redeem_fee_percent: u64,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl FeeBeacon {
    pub fn new(admin: impl Into<String>, mint_fee_percent: u64, redeem_fee_percent: u64) -> Self {
        Self {
            mint_fee_percent,
            redeem_fee_percent,
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    /// Mint fee percent after applying a market's override.
    pub fn resolved_mint_percent(&self, override_percent: u64) -> u64 {
        resolve_percent(override_percent, self.mint_fee_percent)
    }

    /// Redeem fee percent after applying a market's override.
    pub fn resolved_redeem_percent(&self, override_percent: u64) -> u64 {
        resolve_percent(override_percent, self.redeem_fee_percent)
    }

    /// Replace the defaults. Admin-only; re-emits on identical values.
    pub fn set_defaults(
        &mut self,
        caller: &str,
        mint_fee_percent: u64,
        redeem_fee_percent: u64,
    ) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            return Err(MarketError::Unauthorized);
        }
        self.mint_fee_percent = mint_fee_percent;
        self.redeem_fee_percent = redeem_fee_percent;
        self.events
            .push(ContractEvent::BeaconDefaultsUpdated(BeaconDefaultsUpdated {
                mint_fee_percent,
                redeem_fee_percent,
            }));
        Ok(())
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Immutable market parameters, fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTerms {
    pub market_id: MarketId,
    pub collateral_token: String,
    pub long_token: String,
    pub short_token: String,
    /// Lowest admissible final payout.
    pub floor_payout: Decimal,
    /// Highest admissible final payout, at most 1.
    pub ceiling_payout: Decimal,
    /// Payout pinned when settlement happens by expiry.
    pub expiry_payout: Decimal,
    pub expiry_ts: i64,
    pub created_at: i64,
    /// Informational valuations backing the payout bounds; not used in
    /// settlement arithmetic.
    pub floor_valuation: Decimal,
    pub ceiling_valuation: Decimal,
}

impl MarketTerms {
    fn validate(&self) -> Result<(), MarketError> {
        if self.floor_payout.is_sign_negative() {
            return Err(MarketError::InvalidTerms {
                reason: "floor payout must be non-negative".to_string(),
            });
        }
        if self.floor_payout >= self.ceiling_payout {
            return Err(MarketError::InvalidTerms {
                reason: "floor payout must be below ceiling payout".to_string(),
            });
        }
        if self.ceiling_payout > Decimal::ONE {
            return Err(MarketError::InvalidTerms {
                reason: "ceiling payout must not exceed 1".to_string(),
            });
        }
        if self.expiry_payout < self.floor_payout || self.expiry_payout > self.ceiling_payout {
            return Err(MarketError::InvalidTerms {
                reason: "expiry payout must lie within [floor, ceiling]".to_string(),
            });
        }
        if self.expiry_ts <= self.created_at {
            return Err(MarketError::InvalidTerms {
                reason: "expiry must be after creation".to_string(),
            });
        }
        Ok(())
    }
}

/// Settlement lifecycle. Terminal states carry the pinned payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketState {
    Open,
    SettledByAdmin { payout: Decimal },
    SettledByExpiry { payout: Decimal },
}

impl MarketState {
    pub fn is_open(&self) -> bool {
        matches!(self, MarketState::Open)
    }

    /// The pinned payout, if settled.
    pub fn final_payout(&self) -> Option<Decimal> {
        match self {
            MarketState::Open => None,
            MarketState::SettledByAdmin { payout } | MarketState::SettledByExpiry { payout } => {
                Some(*payout)
            }
        }
    }
}

/// One settlement market: collateral custody, claim issuance, payout.
#[derive(Debug, Clone)]
pub struct SettlementMarket {
    address: AccountId,
    terms: MarketTerms,
    state: MarketState,
    mint_fee_override: u64,
    redeem_fee_override: u64,
    mint_hook: Option<Box<dyn FlowHook>>,
    redeem_hook: Option<Box<dyn FlowHook>>,
    pause: PauseGuard,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl SettlementMarket {
    /// Create an open market after validating its terms.
    pub fn new(admin: impl Into<String>, terms: MarketTerms) -> Result<Self, MarketError> {
        terms.validate()?;
        let mut market = Self {
            address: AccountId::new(),
            state: MarketState::Open,
            mint_fee_override: 0,
            redeem_fee_override: 0,
            mint_hook: None,
            redeem_hook: None,
            pause: PauseGuard::new(),
            access: AccessControl::new(admin),
            events: Vec::new(),
            terms,
        };
        market
            .events
            .push(ContractEvent::MarketCreated(MarketCreated {
                market_id: market.terms.market_id.clone(),
                long_token: market.terms.long_token.clone(),
                short_token: market.terms.short_token.clone(),
                expiry_ts: market.terms.expiry_ts,
            }));
        Ok(market)
    }

    // ───────────────────────── Minting ─────────────────────────

    /// Pull `amount` collateral from `funder` and mint `amount - fee` of
    /// BOTH claim tokens to `recipient`. Open markets only.
    pub fn mint(
        &mut self,
        bank: &mut TokenBank,
        beacon: &FeeBeacon,
        funder: AccountId,
        recipient: AccountId,
        amount: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, MarketError> {
        if self.pause.is_paused() {
            return Err(MarketError::Paused);
        }
        if !self.state.is_open() {
            return Err(MarketError::MarketSettled);
        }
        if amount.is_sign_negative() {
            return Err(MarketError::InvalidParameter {
                reason: "amount must be non-negative".to_string(),
            });
        }
        let scale = bank.token(&self.terms.collateral_token)?.decimals();
        if !fits_scale(amount, scale) {
            return Err(MarketError::PrecisionExceeded { scale });
        }

        let exempt = self
            .mint_hook
            .as_ref()
            .map_or(false, |hook| hook.fee_exempt(&recipient));
        let percent = if exempt {
            0
        } else {
            beacon.resolved_mint_percent(self.mint_fee_override)
        };
        if amount.is_zero() && percent != 0 {
            return Err(MarketError::ZeroAmount);
        }
        let fee = fee_amount(amount, percent, scale).ok_or(MarketError::Overflow)?;
        if percent != 0 && fee.is_zero() {
            return Err(MarketError::FeeRoundsToZero);
        }
        let minted = amount - fee;

        let bank_snapshot = bank.clone();
        let hook_snapshot = self.mint_hook.clone();
        let result =
            self.mint_execute(bank, funder, recipient, amount, fee, minted, now, payload);
        if result.is_err() {
            *bank = bank_snapshot;
            self.mint_hook = hook_snapshot;
            warn!(market = %self.terms.market_id, %funder, %amount, "mint rolled back");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn mint_execute(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        amount: Decimal,
        fee: Decimal,
        minted: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, MarketError> {
        bank.transfer_from(
            &self.terms.collateral_token,
            &self.address,
            &funder,
            self.address,
            amount,
        )?;

        if let Some(hook) = self.mint_hook.as_mut() {
            let spender = hook.address();
            bank.approve(&self.terms.collateral_token, self.address, spender, fee)?;
            let ctx = HookContext {
                caller: self.address,
                direction: FlowDirection::MarketMint,
                from: funder,
                to: recipient,
                token: self.terms.collateral_token.clone(),
                amount_before_fee: amount,
                amount_after_fee: minted,
                now,
                payload,
            };
            hook.on_flow(bank, &ctx)?;
            bank.approve(
                &self.terms.collateral_token,
                self.address,
                spender,
                Decimal::ZERO,
            )?;
            self.events.extend(hook.drain_events());
        }

        bank.mint(&self.terms.long_token, recipient, minted)?;
        bank.mint(&self.terms.short_token, recipient, minted)?;
        self.events.push(ContractEvent::ClaimsMinted(ClaimsMinted {
            market_id: self.terms.market_id.clone(),
            funder,
            recipient,
            collateral_amount: amount,
            fee,
            minted,
        }));
        debug!(market = %self.terms.market_id, %funder, %amount, %fee, %minted, "claims minted");
        Ok(minted)
    }

    // ───────────────────────── Redemption ─────────────────────────

    /// Burn claim tokens and pay collateral.
    ///
    /// Before settlement only matched pairs redeem (`long == short`, one
    /// unit of collateral per pair). After settlement any combination
    /// redeems at `long * p + short * (1 - p)`. Returns the collateral
    /// paid out after the fee.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem(
        &mut self,
        bank: &mut TokenBank,
        beacon: &FeeBeacon,
        funder: AccountId,
        recipient: AccountId,
        long_amount: Decimal,
        short_amount: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, MarketError> {
        if self.pause.is_paused() {
            return Err(MarketError::Paused);
        }
        if long_amount.is_sign_negative() || short_amount.is_sign_negative() {
            return Err(MarketError::InvalidParameter {
                reason: "amounts must be non-negative".to_string(),
            });
        }
        let scale = bank.token(&self.terms.collateral_token)?.decimals();
        if !fits_scale(long_amount, scale) || !fits_scale(short_amount, scale) {
            return Err(MarketError::PrecisionExceeded { scale });
        }

        let payout = match self.state.final_payout() {
            None => {
                if long_amount != short_amount {
                    return Err(MarketError::ClaimAmountMismatch {
                        long: long_amount,
                        short: short_amount,
                    });
                }
                long_amount
            }
            Some(p) => {
                let long_value = long_amount.checked_mul(p).ok_or(MarketError::Overflow)?;
                let short_value = short_amount
                    .checked_mul(Decimal::ONE - p)
                    .ok_or(MarketError::Overflow)?;
                (long_value + short_value).trunc_with_scale(scale)
            }
        };

        let exempt = self
            .redeem_hook
            .as_ref()
            .map_or(false, |hook| hook.fee_exempt(&recipient));
        let percent = if exempt {
            0
        } else {
            beacon.resolved_redeem_percent(self.redeem_fee_override)
        };
        if payout.is_zero() && percent != 0 && (long_amount + short_amount) > Decimal::ZERO {
            return Err(MarketError::ZeroAmount);
        }
        let fee = fee_amount(payout, percent, scale).ok_or(MarketError::Overflow)?;
        if percent != 0 && fee.is_zero() && !payout.is_zero() {
            return Err(MarketError::FeeRoundsToZero);
        }
        let paid = payout - fee;

        let bank_snapshot = bank.clone();
        let hook_snapshot = self.redeem_hook.clone();
        let result = self.redeem_execute(
            bank,
            funder,
            recipient,
            long_amount,
            short_amount,
            payout,
            fee,
            paid,
            now,
            payload,
        );
        if result.is_err() {
            *bank = bank_snapshot;
            self.redeem_hook = hook_snapshot;
            warn!(market = %self.terms.market_id, %funder, "redeem rolled back");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn redeem_execute(
        &mut self,
        bank: &mut TokenBank,
        funder: AccountId,
        recipient: AccountId,
        long_amount: Decimal,
        short_amount: Decimal,
        payout: Decimal,
        fee: Decimal,
        paid: Decimal,
        now: i64,
        payload: Vec<u8>,
    ) -> Result<Decimal, MarketError> {
        bank.burn(&self.terms.long_token, &funder, long_amount)?;
        bank.burn(&self.terms.short_token, &funder, short_amount)?;

        if let Some(hook) = self.redeem_hook.as_mut() {
            let spender = hook.address();
            bank.approve(&self.terms.collateral_token, self.address, spender, fee)?;
            let ctx = HookContext {
                caller: self.address,
                direction: FlowDirection::MarketRedeem,
                from: funder,
                to: recipient,
                token: self.terms.collateral_token.clone(),
                amount_before_fee: payout,
                amount_after_fee: paid,
                now,
                payload,
            };
            hook.on_flow(bank, &ctx)?;
            bank.approve(
                &self.terms.collateral_token,
                self.address,
                spender,
                Decimal::ZERO,
            )?;
            self.events.extend(hook.drain_events());
        }

        bank.transfer(
            &self.terms.collateral_token,
            &self.address,
            recipient,
            paid,
        )?;
        self.events
            .push(ContractEvent::ClaimsRedeemed(ClaimsRedeemed {
                market_id: self.terms.market_id.clone(),
                funder,
                recipient,
                long_amount,
                short_amount,
                payout,
                fee,
            }));
        debug!(market = %self.terms.market_id, %funder, %payout, %fee, "claims redeemed");
        Ok(paid)
    }

    // ───────────────────────── Settlement ─────────────────────────

    /// Pin the final payout. Operator-privileged, exactly once, bounded by
    /// the terms.
    pub fn set_final_payout(&mut self, caller: &str, value: Decimal) -> Result<(), MarketError> {
        if !self.access.is_operator(caller) {
            return Err(MarketError::Unauthorized);
        }
        if !self.state.is_open() {
            return Err(MarketError::PayoutAlreadySet);
        }
        if value < self.terms.floor_payout || value > self.terms.ceiling_payout {
            return Err(MarketError::PayoutOutOfRange {
                value,
                floor: self.terms.floor_payout,
                ceiling: self.terms.ceiling_payout,
            });
        }
        self.state = MarketState::SettledByAdmin { payout: value };
        self.events
            .push(ContractEvent::PayoutFinalized(PayoutFinalized {
                market_id: self.terms.market_id.clone(),
                payout: value,
                by_expiry: false,
            }));
        Ok(())
    }

    /// Pin the terms' expiry payout. Anyone may call once the expiry
    /// timestamp has been reached and the payout is still unset.
    pub fn set_final_payout_after_expiry(&mut self, now: i64) -> Result<(), MarketError> {
        if !self.state.is_open() {
            return Err(MarketError::PayoutAlreadySet);
        }
        if now < self.terms.expiry_ts {
            return Err(MarketError::ExpiryNotReached {
                expiry_ts: self.terms.expiry_ts,
            });
        }
        self.state = MarketState::SettledByExpiry {
            payout: self.terms.expiry_payout,
        };
        self.events
            .push(ContractEvent::PayoutFinalized(PayoutFinalized {
                market_id: self.terms.market_id.clone(),
                payout: self.terms.expiry_payout,
                by_expiry: true,
            }));
        Ok(())
    }

    // ───────────────────────── Configuration ─────────────────────────

    /// Set the per-market fee overrides. Admin-only; re-emits on identical
    /// values. Values above the ceiling are clamped at resolution time,
    /// not here.
    pub fn set_fee_overrides(
        &mut self,
        caller: &str,
        mint_fee_override: u64,
        redeem_fee_override: u64,
    ) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            return Err(MarketError::Unauthorized);
        }
        self.mint_fee_override = mint_fee_override;
        self.redeem_fee_override = redeem_fee_override;
        self.events.push(ContractEvent::MarketFeeOverrideUpdated(
            MarketFeeOverrideUpdated {
                market_id: self.terms.market_id.clone(),
                mint_fee_override,
                redeem_fee_override,
            },
        ));
        Ok(())
    }

    /// Install or remove the mint hook. Admin-only.
    pub fn set_mint_hook(
        &mut self,
        caller: &str,
        hook: Option<Box<dyn FlowHook>>,
    ) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            return Err(MarketError::Unauthorized);
        }
        self.mint_hook = hook;
        Ok(())
    }

    /// Install or remove the redeem hook. Admin-only.
    pub fn set_redeem_hook(
        &mut self,
        caller: &str,
        hook: Option<Box<dyn FlowHook>>,
    ) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            return Err(MarketError::Unauthorized);
        }
        self.redeem_hook = hook;
        Ok(())
    }

    /// Pause minting and redemption. Admin-only.
    pub fn pause(&mut self, caller: &str) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            return Err(MarketError::Unauthorized);
        }
        self.pause.pause();
        Ok(())
    }

    /// Unpause. Admin-only.
    pub fn unpause(&mut self, caller: &str) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            return Err(MarketError::Unauthorized);
        }
        self.pause.unpause();
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// The market's collateral custody account.
    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn terms(&self) -> &MarketTerms {
        &self.terms
    }

    pub fn state(&self) -> MarketState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn mint_fee_override(&self) -> u64 {
        self.mint_fee_override
    }

    pub fn redeem_fee_override(&self) -> u64 {
        self.redeem_fee_override
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
