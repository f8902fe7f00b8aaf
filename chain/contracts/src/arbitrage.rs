//! Arbitrage execution across a swap venue and a settlement market
//!
//! Two compositions: buy both claim legs and redeem the pair, or mint
//! the pair and sell both legs. Either way the executor's collateral
//! balance must come out strictly higher than it went in; break-even or
//! worse reverts everything. Venue and market approvals use the
//! unlimited sentinel and are only written when missing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use types::ids::{AccountId, MarketId};

use crate::errors::{ArbitrageError, TokenError, VenueError};
use crate::events::{ArbitrageExecuted, ArbitrageKind, ContractEvent, MarketListed};
use crate::market::{FeeBeacon, SettlementMarket};
use crate::security::AccessControl;
use crate::token::{TokenBank, UNLIMITED_ALLOWANCE};

/// Which amount a swap fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapKind {
    /// `amount` is the input; `limit` is the minimum acceptable output.
    ExactIn,
    /// `amount` is the output; `limit` is the maximum acceptable input.
    ExactOut,
}

/// External trade execution. The venue pulls `token_in` from `trader`
/// (allowance required) and delivers `token_out` to the same account.
pub trait SwapVenue: std::fmt::Debug {
    /// Account the venue spends allowances as.
    fn address(&self) -> AccountId;

    /// Execute one swap. Returns the output amount for [`SwapKind::ExactIn`]
    /// and the input spent for [`SwapKind::ExactOut`].
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<Decimal, VenueError>;
}

/// Parameters for one arbitrage execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageParams {
    pub deadline: i64,
    /// Claim amount per leg (both legs always trade the same size).
    pub long_short_amount: Decimal,
    /// Buy direction: max collateral spend per leg. Sell direction: min
    /// collateral proceeds per leg.
    pub long_limit: Decimal,
    pub short_limit: Decimal,
}

/// Outcome of a profitable execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageResult {
    pub profit: Decimal,
    /// Collateral spent (buy direction) or received (sell direction) on
    /// the long leg.
    pub long_leg: Decimal,
    pub short_leg: Decimal,
}

/// Executes the two claim-pair arbitrage compositions atomically.
#[derive(Debug, Clone)]
pub struct ArbitrageExecutor {
    address: AccountId,
    allowed_markets: HashSet<MarketId>,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl ArbitrageExecutor {
    pub fn new(admin: impl Into<String>) -> Self {
        Self {
            address: AccountId::new(),
            allowed_markets: HashSet::new(),
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    /// The executor's trading account.
    pub fn address(&self) -> AccountId {
        self.address
    }

    /// Whether a market may be traded.
    pub fn is_listed(&self, market_id: &MarketId) -> bool {
        self.allowed_markets.contains(market_id)
    }

    /// Allow-list or delist a market. Admin-only; re-emits on identical
    /// values.
    pub fn list_market(
        &mut self,
        caller: &str,
        market_id: MarketId,
        allowed: bool,
    ) -> Result<(), ArbitrageError> {
        if !self.access.is_admin(caller) {
            return Err(ArbitrageError::Unauthorized);
        }
        if allowed {
            self.allowed_markets.insert(market_id.clone());
        } else {
            self.allowed_markets.remove(&market_id);
        }
        self.events
            .push(ContractEvent::MarketListed(MarketListed { market_id, allowed }));
        Ok(())
    }

    /// Buy `long_short_amount` of each claim exact-out under per-leg spend
    /// limits, then redeem the pair. Fails unless strictly profitable.
    pub fn buy_and_redeem(
        &mut self,
        bank: &mut TokenBank,
        market: &mut SettlementMarket,
        beacon: &FeeBeacon,
        venue: &mut dyn SwapVenue,
        params: &ArbitrageParams,
        now: i64,
    ) -> Result<ArbitrageResult, ArbitrageError> {
        self.pre_checks(market, params, now)?;

        let bank_snapshot = bank.clone();
        let market_snapshot = market.clone();
        let result = self.buy_and_redeem_execute(bank, market, beacon, venue, params, now);
        if result.is_err() {
            *bank = bank_snapshot;
            *market = market_snapshot;
            warn!(market = %market.terms().market_id, "buy-and-redeem rolled back");
        }
        result
    }

    fn buy_and_redeem_execute(
        &mut self,
        bank: &mut TokenBank,
        market: &mut SettlementMarket,
        beacon: &FeeBeacon,
        venue: &mut dyn SwapVenue,
        params: &ArbitrageParams,
        now: i64,
    ) -> Result<ArbitrageResult, ArbitrageError> {
        let collateral = market.terms().collateral_token.clone();
        let long_token = market.terms().long_token.clone();
        let short_token = market.terms().short_token.clone();
        let pre = bank.balance_of(&collateral, &self.address)?;

        self.ensure_approval(bank, &collateral, venue.address())?;
        let long_spend = venue.execute(
            bank,
            self.address,
            SwapKind::ExactOut,
            &collateral,
            &long_token,
            params.long_short_amount,
            params.long_limit,
            params.deadline,
            now,
        )?;
        let short_spend = venue.execute(
            bank,
            self.address,
            SwapKind::ExactOut,
            &collateral,
            &short_token,
            params.long_short_amount,
            params.short_limit,
            params.deadline,
            now,
        )?;
        market.redeem(
            bank,
            beacon,
            self.address,
            self.address,
            params.long_short_amount,
            params.long_short_amount,
            now,
            Vec::new(),
        )?;

        let post = bank.balance_of(&collateral, &self.address)?;
        if post <= pre {
            return Err(ArbitrageError::Unprofitable { pre, post });
        }
        let profit = post - pre;
        self.events
            .push(ContractEvent::ArbitrageExecuted(ArbitrageExecuted {
                market_id: market.terms().market_id.clone(),
                kind: ArbitrageKind::BuyAndRedeem,
                long_short_amount: params.long_short_amount,
                profit,
            }));
        debug!(market = %market.terms().market_id, %profit, "buy-and-redeem executed");
        Ok(ArbitrageResult {
            profit,
            long_leg: long_spend,
            short_leg: short_spend,
        })
    }

    /// Mint the claim pair, then sell both legs exact-in under per-leg
    /// minimum-proceeds limits. Fails unless strictly profitable.
    pub fn mint_and_sell(
        &mut self,
        bank: &mut TokenBank,
        market: &mut SettlementMarket,
        beacon: &FeeBeacon,
        venue: &mut dyn SwapVenue,
        params: &ArbitrageParams,
        now: i64,
    ) -> Result<ArbitrageResult, ArbitrageError> {
        self.pre_checks(market, params, now)?;

        let bank_snapshot = bank.clone();
        let market_snapshot = market.clone();
        let result = self.mint_and_sell_execute(bank, market, beacon, venue, params, now);
        if result.is_err() {
            *bank = bank_snapshot;
            *market = market_snapshot;
            warn!(market = %market.terms().market_id, "mint-and-sell rolled back");
        }
        result
    }

    fn mint_and_sell_execute(
        &mut self,
        bank: &mut TokenBank,
        market: &mut SettlementMarket,
        beacon: &FeeBeacon,
        venue: &mut dyn SwapVenue,
        params: &ArbitrageParams,
        now: i64,
    ) -> Result<ArbitrageResult, ArbitrageError> {
        let collateral = market.terms().collateral_token.clone();
        let long_token = market.terms().long_token.clone();
        let short_token = market.terms().short_token.clone();
        let pre = bank.balance_of(&collateral, &self.address)?;

        self.ensure_approval(bank, &collateral, market.address())?;
        let minted = market.mint(
            bank,
            beacon,
            self.address,
            self.address,
            params.long_short_amount,
            now,
            Vec::new(),
        )?;

        self.ensure_approval(bank, &long_token, venue.address())?;
        self.ensure_approval(bank, &short_token, venue.address())?;
        let long_proceeds = venue.execute(
            bank,
            self.address,
            SwapKind::ExactIn,
            &long_token,
            &collateral,
            minted,
            params.long_limit,
            params.deadline,
            now,
        )?;
        let short_proceeds = venue.execute(
            bank,
            self.address,
            SwapKind::ExactIn,
            &short_token,
            &collateral,
            minted,
            params.short_limit,
            params.deadline,
            now,
        )?;

        let post = bank.balance_of(&collateral, &self.address)?;
        if post <= pre {
            return Err(ArbitrageError::Unprofitable { pre, post });
        }
        let profit = post - pre;
        self.events
            .push(ContractEvent::ArbitrageExecuted(ArbitrageExecuted {
                market_id: market.terms().market_id.clone(),
                kind: ArbitrageKind::MintAndSell,
                long_short_amount: params.long_short_amount,
                profit,
            }));
        debug!(market = %market.terms().market_id, %profit, "mint-and-sell executed");
        Ok(ArbitrageResult {
            profit,
            long_leg: long_proceeds,
            short_leg: short_proceeds,
        })
    }

    fn pre_checks(
        &self,
        market: &SettlementMarket,
        params: &ArbitrageParams,
        now: i64,
    ) -> Result<(), ArbitrageError> {
        if !self.is_listed(&market.terms().market_id) {
            return Err(ArbitrageError::InvalidMarket {
                market_id: market.terms().market_id.to_string(),
            });
        }
        if now > params.deadline {
            return Err(ArbitrageError::DeadlineExceeded {
                deadline: params.deadline,
            });
        }
        if params.long_short_amount <= Decimal::ZERO {
            return Err(ArbitrageError::InvalidParameter {
                reason: "claim amount must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Grant the unlimited allowance unless it is already in place.
    fn ensure_approval(
        &self,
        bank: &mut TokenBank,
        token: &str,
        spender: AccountId,
    ) -> Result<(), TokenError> {
        if bank.allowance(token, &self.address, &spender)? != UNLIMITED_ALLOWANCE {
            bank.approve(token, self.address, spender, UNLIMITED_ALLOWANCE)?;
        }
        Ok(())
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}
