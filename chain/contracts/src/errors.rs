//! Contract-specific error types
//!
//! Error taxonomy for the accounting and settlement core. Every enum follows
//! the same discipline: validation errors are raised before any mutation or
//! fund movement, capacity errors are strict (never silently clamped), and
//! external-dependency errors abort the whole operation with no partial
//! effects.

use rust_decimal::Decimal;
use thiserror::Error;
use types::ids::AccountId;

/// Fungible token ledger errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Unknown token: {symbol}")]
    UnknownToken { symbol: String },

    #[error("Token already registered: {symbol}")]
    TokenExists { symbol: String },

    #[error("Insufficient balance of {token}: required {required}, available {available}")]
    InsufficientBalance {
        token: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient allowance for {token}: required {required}, available {available}")]
    InsufficientAllowance {
        token: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,

    #[error("Permit deadline {deadline} has passed")]
    PermitExpired { deadline: i64 },

    #[error("Permit nonce already used: account {account}, nonce {nonce}")]
    NonceReused { account: AccountId, nonce: u64 },

    #[error("Invalid permit signature")]
    InvalidSignature,
}

/// Flow-cap ledger errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapError {
    #[error("Caller is not an allow-listed recorder")]
    UnauthorizedRecorder,

    #[error("Global cap exceeded: recording {requested} against cap {cap}")]
    GlobalCapExceeded { requested: Decimal, cap: Decimal },

    #[error("Per-account cap exceeded for {account}: recording {requested} against cap {cap}")]
    UserCapExceeded {
        account: AccountId,
        requested: Decimal,
        cap: Decimal,
    },

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Arithmetic overflow in cap accounting")]
    Overflow,
}

/// Rolling-window rate limiter errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("Rate limit exceeded: window total {window_total} against limit {limit}")]
    LimitExceeded { window_total: Decimal, limit: Decimal },

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Arithmetic overflow in window accounting")]
    Overflow,
}

/// Fee hook pipeline errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HookError {
    #[error("Caller is not registered with this hook")]
    UnauthorizedCaller,

    #[error("Multiplier key {caller} is not a registered caller")]
    UnknownMultiplierKey { caller: AccountId },

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Rebate dispatcher failed: {0}")]
    Dispatch(#[from] RebateError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Rebate dispatcher errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RebateError {
    #[error("Arithmetic overflow in rebate conversion")]
    Overflow,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Collateral vault errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    #[error("Amount is zero (or normalizes to zero) while a fee is configured")]
    ZeroAmount,

    #[error("Fee rounds to zero for a nonzero fee percent")]
    FeeRoundsToZero,

    #[error("Amount has more fractional digits than the {scale}-decimal token allows")]
    PrecisionExceeded { scale: u32 },

    #[error("Vault is paused")]
    Paused,

    #[error("Reentrancy detected")]
    Reentrancy,

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Arithmetic overflow in vault calculation")]
    Overflow,

    #[error("Fee config error: {0}")]
    FeeConfig(#[from] types::fee::FeeConfigError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Cap error: {0}")]
    Cap(#[from] CapError),

    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

/// Settlement market errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Invalid market terms: {reason}")]
    InvalidTerms { reason: String },

    #[error("Market is settled; minting is closed")]
    MarketSettled,

    #[error("Final payout has already been set")]
    PayoutAlreadySet,

    #[error("Final payout {value} is outside [{floor}, {ceiling}]")]
    PayoutOutOfRange {
        value: Decimal,
        floor: Decimal,
        ceiling: Decimal,
    },

    #[error("Expiry {expiry_ts} has not been reached")]
    ExpiryNotReached { expiry_ts: i64 },

    #[error("Pre-settlement redemption requires equal amounts: long {long}, short {short}")]
    ClaimAmountMismatch { long: Decimal, short: Decimal },

    #[error("Amount is zero while a fee is configured")]
    ZeroAmount,

    #[error("Fee rounds to zero for a nonzero fee percent")]
    FeeRoundsToZero,

    #[error("Amount has more fractional digits than the {scale}-decimal token allows")]
    PrecisionExceeded { scale: u32 },

    #[error("Market is paused")]
    Paused,

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Arithmetic overflow in market calculation")]
    Overflow,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

/// External swap venue errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    #[error("Trade deadline {deadline} has passed")]
    DeadlineExceeded { deadline: i64 },

    #[error("Slippage limit violated: limit {limit}, actual {actual}")]
    SlippageLimit { limit: Decimal, actual: Decimal },

    #[error("Venue cannot quote {token}")]
    UnsupportedToken { token: String },

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Arbitrage executor errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArbitrageError {
    #[error("Market {market_id} is not allow-listed for arbitrage")]
    InvalidMarket { market_id: String },

    #[error("Execution not strictly profitable: balance before {pre}, after {post}")]
    Unprofitable { pre: Decimal, post: Decimal },

    #[error("Execution deadline {deadline} has passed")]
    DeadlineExceeded { deadline: i64 },

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Composite trade helper errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HelperError {
    #[error("Amount is zero while a fee is configured")]
    ZeroAmount,

    #[error("Fee rounds to zero for a nonzero fee percent")]
    FeeRoundsToZero,

    #[error("Unauthorized: caller lacks the required role")]
    Unauthorized,

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Arithmetic overflow in helper calculation")]
    Overflow,

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        let err = TokenError::UnknownToken {
            symbol: "sUSD".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown token: sUSD");
    }

    #[test]
    fn test_cap_error_display_carries_amounts() {
        let err = CapError::GlobalCapExceeded {
            requested: Decimal::from(50_001),
            cap: Decimal::from(50_000),
        };
        assert!(err.to_string().contains("50001"));
        assert!(err.to_string().contains("50000"));
    }

    #[test]
    fn test_vault_error_from_token() {
        let token_err = TokenError::Overflow;
        let vault_err: VaultError = token_err.into();
        assert!(matches!(vault_err, VaultError::Token(_)));
    }

    #[test]
    fn test_vault_error_from_cap() {
        let cap_err = CapError::UnauthorizedRecorder;
        let vault_err: VaultError = cap_err.into();
        assert!(matches!(vault_err, VaultError::Cap(_)));
    }

    #[test]
    fn test_arbitrage_error_from_venue() {
        let venue_err = VenueError::SlippageLimit {
            limit: Decimal::from(100),
            actual: Decimal::from(101),
        };
        let arb_err: ArbitrageError = venue_err.into();
        assert!(matches!(arb_err, ArbitrageError::Venue(_)));
    }

    #[test]
    fn test_rate_limit_error_display() {
        let err = RateLimitError::LimitExceeded {
            window_total: Decimal::from(1_001),
            limit: Decimal::from(1_000),
        };
        assert!(err.to_string().contains("1001"));
    }
}
