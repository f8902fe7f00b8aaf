//! Types library for the synthetic-asset protocol
//!
//! This library provides the core type definitions shared by the accounting
//! and settlement crates, ensuring type safety and deterministic behavior.
//!
//! # Modules
//! - `ids`: Unique identifiers (AccountId, MarketId)
//! - `fee`: Fixed-point fee arithmetic constants and configuration

// Public modules
pub mod fee;
pub mod ids;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fee::*;
    pub use crate::ids::*;
}
