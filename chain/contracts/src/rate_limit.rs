//! Rolling-window rate limiter with a policy-derived floor
//!
//! Aggregate outflow within a fixed-length window is capped by
//! `max(configured_limit, max(absolute_minimum, percent of global
//! deposits))`. The window resets lazily once its length has elapsed. A
//! rejected recording leaves no trace: neither the accumulated amount nor
//! the lazy reset is committed on failure.

use rust_decimal::Decimal;
use tracing::{debug, warn};
use types::fee::FEE_PERCENT_UNIT;

use crate::errors::RateLimitError;
use crate::events::{ContractEvent, RateLimitUpdated};
use crate::security::AccessControl;

/// Rolling-window cap on aggregate flow.
#[derive(Debug, Clone)]
pub struct PeriodicRateLimiter {
    window_length: i64,
    configured_limit: Decimal,
    absolute_minimum: Decimal,
    /// Fixed-point over [`FEE_PERCENT_UNIT`]; fraction of global deposits
    /// guaranteed to fit through each window.
    floor_percent: u64,
    last_reset: Option<i64>,
    amount_this_window: Decimal,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl PeriodicRateLimiter {
    pub fn new(
        admin: impl Into<String>,
        window_length: i64,
        configured_limit: Decimal,
        absolute_minimum: Decimal,
        floor_percent: u64,
    ) -> Self {
        Self {
            window_length,
            configured_limit,
            absolute_minimum,
            floor_percent,
            last_reset: None,
            amount_this_window: Decimal::ZERO,
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    /// The limit actually enforced, given the current global deposit total.
    pub fn effective_limit(&self, global_deposits: Decimal) -> Decimal {
        let percent_floor = (global_deposits * Decimal::from(self.floor_percent)
            / Decimal::from(FEE_PERCENT_UNIT))
        .trunc_with_scale(global_deposits.scale());
        let derived_floor = self.absolute_minimum.max(percent_floor);
        self.configured_limit.max(derived_floor)
    }

    /// Account for `amount` of flow at time `now`.
    ///
    /// Resets the window first when it has elapsed (or was never started).
    /// On rejection the whole operation rolls back, including the reset —
    /// a failed first call of a fresh window leaves the limiter exactly as
    /// it was.
    pub fn check_and_record(
        &mut self,
        amount: Decimal,
        now: i64,
        global_deposits: Decimal,
    ) -> Result<(), RateLimitError> {
        let fresh_window = match self.last_reset {
            None => true,
            Some(last) => now - last >= self.window_length,
        };

        let window_amount = if fresh_window {
            Decimal::ZERO
        } else {
            self.amount_this_window
        };
        let window_total = window_amount
            .checked_add(amount)
            .ok_or(RateLimitError::Overflow)?;

        let limit = self.effective_limit(global_deposits);
        if window_total > limit {
            warn!(%amount, %window_total, %limit, "rate limit exceeded");
            return Err(RateLimitError::LimitExceeded { window_total, limit });
        }

        if fresh_window {
            self.last_reset = Some(now);
        }
        self.amount_this_window = window_total;
        debug!(%amount, %window_total, %limit, "flow recorded");
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn window_length(&self) -> i64 {
        self.window_length
    }

    pub fn configured_limit(&self) -> Decimal {
        self.configured_limit
    }

    pub fn amount_this_window(&self) -> Decimal {
        self.amount_this_window
    }

    pub fn last_reset(&self) -> Option<i64> {
        self.last_reset
    }

    // ───────────────────────── Configuration ─────────────────────────

    /// Replace the limiter configuration. Admin-only; the running window
    /// is kept, only future checks see the new parameters. Re-emits on
    /// identical values.
    pub fn configure(
        &mut self,
        caller: &str,
        window_length: i64,
        configured_limit: Decimal,
        absolute_minimum: Decimal,
        floor_percent: u64,
    ) -> Result<(), RateLimitError> {
        if !self.access.is_admin(caller) {
            return Err(RateLimitError::Unauthorized);
        }
        if window_length <= 0 {
            return Err(RateLimitError::InvalidParameter {
                reason: "window length must be positive".to_string(),
            });
        }
        self.window_length = window_length;
        self.configured_limit = configured_limit;
        self.absolute_minimum = absolute_minimum;
        self.floor_percent = floor_percent;
        self.events.push(ContractEvent::RateLimitUpdated(RateLimitUpdated {
            window_length,
            configured_limit,
            absolute_minimum,
            floor_percent,
        }));
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
