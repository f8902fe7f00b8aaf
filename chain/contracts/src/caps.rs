//! Flow-cap ledger — global and per-account cumulative flow tracking
//!
//! The global counter is a net figure: deposits add, withdrawals subtract,
//! floored at zero. The per-account counter is a monotonic exposure
//! tracker: deposits add and withdrawals never subtract. Cap-bypassed
//! accounts are exempt from the per-account cap only — their flow is still
//! tracked, and the global cap always applies. Tightening a cap (or
//! removing a bypass) can therefore leave an account over cap, which
//! blocks any further recording for it, including a zero-amount call,
//! until the configuration changes again.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};
use types::ids::AccountId;

use crate::errors::CapError;
use crate::events::{
    AccountCapUpdated, CapBypassUpdated, ContractEvent, GlobalCapUpdated, RecorderUpdated,
};
use crate::security::{AccessControl, AllowList};

/// Global and per-account cumulative net-flow accounting against caps.
#[derive(Debug, Clone)]
pub struct FlowCapLedger {
    global_net: Decimal,
    per_account: HashMap<AccountId, Decimal>,
    global_cap: Decimal,
    per_account_cap: Decimal,
    /// Exempt from the per-account cap; still tracked, still globally capped.
    bypass: AllowList,
    /// Components allowed to record flows.
    recorders: AllowList,
    access: AccessControl,
    events: Vec<ContractEvent>,
}

impl FlowCapLedger {
    /// Create a ledger with the given caps and an admin for configuration.
    pub fn new(admin: impl Into<String>, global_cap: Decimal, per_account_cap: Decimal) -> Self {
        Self {
            global_net: Decimal::ZERO,
            per_account: HashMap::new(),
            global_cap,
            per_account_cap,
            bypass: AllowList::new(),
            recorders: AllowList::new(),
            access: AccessControl::new(admin),
            events: Vec::new(),
        }
    }

    /// Register the owning component as a recorder at construction time,
    /// without the admin gate.
    pub(crate) fn allow_recorder(&mut self, account: AccountId) {
        self.recorders.set(&[account], &[true]);
    }

    // ───────────────────────── Recording ─────────────────────────

    /// Record a deposit of `amount` attributed to `account`.
    ///
    /// The caller component must be on the recorder allow-list. The global
    /// cap applies to everyone; the per-account cap applies unless the
    /// account is bypassed. The per-account tracker is updated either way.
    pub fn record_deposit(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        amount: Decimal,
    ) -> Result<(), CapError> {
        if !self.recorders.is_included(caller) {
            return Err(CapError::UnauthorizedRecorder);
        }

        let new_global = self
            .global_net
            .checked_add(amount)
            .ok_or(CapError::Overflow)?;
        if new_global > self.global_cap {
            warn!(%account, %amount, cap = %self.global_cap, "global cap exceeded");
            return Err(CapError::GlobalCapExceeded {
                requested: new_global,
                cap: self.global_cap,
            });
        }

        let tracked = self
            .per_account
            .get(&account)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let new_tracked = tracked.checked_add(amount).ok_or(CapError::Overflow)?;
        if !self.bypass.is_included(&account) && new_tracked > self.per_account_cap {
            warn!(%account, %amount, cap = %self.per_account_cap, "per-account cap exceeded");
            return Err(CapError::UserCapExceeded {
                account,
                requested: new_tracked,
                cap: self.per_account_cap,
            });
        }

        self.global_net = new_global;
        self.per_account.insert(account, new_tracked);
        debug!(%account, %amount, global_net = %self.global_net, "deposit recorded");
        Ok(())
    }

    /// Record a withdrawal of `amount`.
    ///
    /// Subtracts from the global net figure, floored at zero. Per-account
    /// exposure is deliberately untouched: the global cap tracks net
    /// deposits, not per-account exposure on the way out.
    pub fn record_withdrawal(&mut self, caller: &AccountId, amount: Decimal) -> Result<(), CapError> {
        if !self.recorders.is_included(caller) {
            return Err(CapError::UnauthorizedRecorder);
        }
        self.global_net = (self.global_net - amount).max(Decimal::ZERO);
        debug!(%amount, global_net = %self.global_net, "withdrawal recorded");
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Current global net flow.
    pub fn global_net(&self) -> Decimal {
        self.global_net
    }

    /// Configured global cap.
    pub fn global_cap(&self) -> Decimal {
        self.global_cap
    }

    /// Configured per-account cap.
    pub fn per_account_cap(&self) -> Decimal {
        self.per_account_cap
    }

    /// Tracked cumulative deposits for an account.
    pub fn account_amount(&self, account: &AccountId) -> Decimal {
        self.per_account
            .get(account)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether an account is exempt from the per-account cap.
    pub fn is_bypassed(&self, account: &AccountId) -> bool {
        self.bypass.is_included(account)
    }

    // ───────────────────────── Configuration ─────────────────────────

    /// Set the global cap. Admin-only; re-emits on identical values.
    pub fn set_global_cap(&mut self, caller: &str, cap: Decimal) -> Result<(), CapError> {
        if !self.access.is_admin(caller) {
            return Err(CapError::Unauthorized);
        }
        self.global_cap = cap;
        self.events
            .push(ContractEvent::GlobalCapUpdated(GlobalCapUpdated { cap }));
        Ok(())
    }

    /// Set the per-account cap. Admin-only; re-emits on identical values.
    pub fn set_per_account_cap(&mut self, caller: &str, cap: Decimal) -> Result<(), CapError> {
        if !self.access.is_admin(caller) {
            return Err(CapError::Unauthorized);
        }
        self.per_account_cap = cap;
        self.events
            .push(ContractEvent::AccountCapUpdated(AccountCapUpdated { cap }));
        Ok(())
    }

    /// Batch-update the cap-bypass flags. Admin-only.
    pub fn set_bypass(
        &mut self,
        caller: &str,
        accounts: &[AccountId],
        flags: &[bool],
    ) -> Result<(), CapError> {
        if !self.access.is_admin(caller) {
            return Err(CapError::Unauthorized);
        }
        if !self.bypass.set(accounts, flags) {
            return Err(CapError::InvalidParameter {
                reason: "accounts/flags length mismatch".to_string(),
            });
        }
        for (account, flag) in accounts.iter().zip(flags) {
            self.events.push(ContractEvent::CapBypassUpdated(CapBypassUpdated {
                account: *account,
                bypassed: *flag,
            }));
        }
        Ok(())
    }

    /// Batch-update the recorder allow-list. Admin-only.
    pub fn set_recorders(
        &mut self,
        caller: &str,
        accounts: &[AccountId],
        flags: &[bool],
    ) -> Result<(), CapError> {
        if !self.access.is_admin(caller) {
            return Err(CapError::Unauthorized);
        }
        if !self.recorders.set(accounts, flags) {
            return Err(CapError::InvalidParameter {
                reason: "accounts/flags length mismatch".to_string(),
            });
        }
        for (account, flag) in accounts.iter().zip(flags) {
            self.events.push(ContractEvent::RecorderUpdated(RecorderUpdated {
                account: *account,
                allowed: *flag,
            }));
        }
        Ok(())
    }

    /// Access control handle (role grants, admin handover).
    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    // ───────────────────────── Events ─────────────────────────

    /// Get all emitted events.
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}
