//! Contract events
//!
//! Events are immutable records emitted by contract operations. Each
//! component keeps an append-only log; configuration setters re-emit their
//! event even when the new value equals the old one, so observers can rely
//! on one notification per call.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{AccountId, MarketId};

/// Base asset deposited into the vault; ledger units minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub funder: AccountId,
    pub recipient: AccountId,
    pub base_amount: Decimal,
    pub fee: Decimal,
    pub minted: Decimal,
}

/// Ledger units burned; base asset released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub funder: AccountId,
    pub recipient: AccountId,
    pub ledger_amount: Decimal,
    pub fee: Decimal,
    pub released: Decimal,
}

/// Vault fee percentages changed (prospective only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfigUpdated {
    pub deposit_fee_percent: u64,
    pub withdraw_fee_percent: u64,
}

/// Fee transferred to the treasury by the hook pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCaptured {
    pub caller: AccountId,
    pub token: String,
    pub amount: Decimal,
}

/// Rebate tokens dispatched to a flow recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebateDispatched {
    pub to: AccountId,
    pub token: String,
    pub amount: Decimal,
}

/// Per-caller rebate multiplier changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierUpdated {
    pub caller: AccountId,
    pub multiplier: u64,
}

/// Global net-flow cap changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCapUpdated {
    pub cap: Decimal,
}

/// Per-account cumulative deposit cap changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCapUpdated {
    pub cap: Decimal,
}

/// Cap-bypass flag changed for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapBypassUpdated {
    pub account: AccountId,
    pub bypassed: bool,
}

/// Recorder allow-list flag changed for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderUpdated {
    pub account: AccountId,
    pub allowed: bool,
}

/// Rate limiter configuration changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitUpdated {
    pub window_length: i64,
    pub configured_limit: Decimal,
    pub absolute_minimum: Decimal,
    pub floor_percent: u64,
}

/// Settlement market created with its claim token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCreated {
    pub market_id: MarketId,
    pub long_token: String,
    pub short_token: String,
    pub expiry_ts: i64,
}

/// Claim token pair minted against collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsMinted {
    pub market_id: MarketId,
    pub funder: AccountId,
    pub recipient: AccountId,
    pub collateral_amount: Decimal,
    pub fee: Decimal,
    pub minted: Decimal,
}

/// Claim tokens redeemed for collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsRedeemed {
    pub market_id: MarketId,
    pub funder: AccountId,
    pub recipient: AccountId,
    pub long_amount: Decimal,
    pub short_amount: Decimal,
    pub payout: Decimal,
    pub fee: Decimal,
}

/// Final payout pinned, either by the privileged setter or after expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutFinalized {
    pub market_id: MarketId,
    pub payout: Decimal,
    pub by_expiry: bool,
}

/// Per-market fee overrides changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketFeeOverrideUpdated {
    pub market_id: MarketId,
    pub mint_fee_override: u64,
    pub redeem_fee_override: u64,
}

/// Beacon default fee percentages changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconDefaultsUpdated {
    pub mint_fee_percent: u64,
    pub redeem_fee_percent: u64,
}

/// Arbitrage market allow-list changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListed {
    pub market_id: MarketId,
    pub allowed: bool,
}

/// Direction of a completed arbitrage composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrageKind {
    BuyAndRedeem,
    MintAndSell,
}

/// Arbitrage composition executed with strict profit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrageExecuted {
    pub market_id: MarketId,
    pub kind: ArbitrageKind,
    pub long_short_amount: Decimal,
    pub profit: Decimal,
}

/// Composite helper pipeline completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineExecuted {
    pub pipeline: String,
    pub funder: AccountId,
    pub recipient: AccountId,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub fee: Decimal,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    Deposited(Deposited),
    Withdrawn(Withdrawn),
    FeeConfigUpdated(FeeConfigUpdated),
    FeeCaptured(FeeCaptured),
    RebateDispatched(RebateDispatched),
    MultiplierUpdated(MultiplierUpdated),
    GlobalCapUpdated(GlobalCapUpdated),
    AccountCapUpdated(AccountCapUpdated),
    CapBypassUpdated(CapBypassUpdated),
    RecorderUpdated(RecorderUpdated),
    RateLimitUpdated(RateLimitUpdated),
    MarketCreated(MarketCreated),
    ClaimsMinted(ClaimsMinted),
    ClaimsRedeemed(ClaimsRedeemed),
    PayoutFinalized(PayoutFinalized),
    MarketFeeOverrideUpdated(MarketFeeOverrideUpdated),
    BeaconDefaultsUpdated(BeaconDefaultsUpdated),
    MarketListed(MarketListed),
    ArbitrageExecuted(ArbitrageExecuted),
    PipelineExecuted(PipelineExecuted),
}
