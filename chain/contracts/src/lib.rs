//! Accounting & Settlement Core for Collateral-Backed Synthetic Assets
//!
//! This crate implements the contract layer of the protocol: collateral
//! custody and ledger-unit issuance, fee capture with rebates, flow caps
//! and rate limiting, binary settlement markets over a bounded payout,
//! and the arbitrage/composite executors built on top.
//!
//! # Modules
//! - `errors`: Contract-specific error types
//! - `events`: Typed contract events and the `ContractEvent` wrapper
//! - `security`: Shared security primitives (access control, guards, allow-lists, nonces)
//! - `token`: Fungible token ledgers, allowances, permit
//! - `decimal`: Cross-precision normalization and fee arithmetic
//! - `caps`: Global and per-account flow-cap accounting
//! - `rate_limit`: Rolling-window outflow limiter
//! - `hooks`: Flow hooks for fee capture and rebates
//! - `rebate`: Fee-to-rebate-token conversion and dispatch
//! - `vault`: Collateral custody, deposits, withdrawals
//! - `market`: Settlement markets and the fee beacon
//! - `arbitrage`: Claim-pair arbitrage executor and the swap-venue trait
//! - `composite`: Multi-step user pipelines (wrap/deposit/trade)
//!
//! # Version
//! v0.1.0 — initial implementation

pub mod arbitrage;
pub mod caps;
pub mod composite;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod hooks;
pub mod market;
pub mod rate_limit;
pub mod rebate;
pub mod security;
pub mod token;
pub mod vault;

/// Contract ABI version — frozen after release
pub const CONTRACT_ABI_VERSION: &str = "1.0.0";
