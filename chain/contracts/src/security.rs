//! Shared security primitives for contract modules
//!
//! Guards, role-based access control, set-membership predicates, and
//! permit replay protection used across the vault, market, hook, and
//! executor modules.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use types::ids::AccountId;

/// Roles recognized by privileged setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full control over a component's configuration
    Admin,
    /// Operational tasks (e.g. submitting a final payout)
    Operator,
    /// Regular user
    User,
}

/// Role-based access control with two-step admin handover.
///
/// Callers are identified by string. The primary admin nominates a
/// successor, who must accept before any authority changes hands; an
/// un-accepted nomination can be replaced at any time.
#[derive(Debug, Clone)]
pub struct AccessControl {
    roles: HashMap<String, Role>,
    admin: String,
    pending_admin: Option<String>,
}

impl AccessControl {
    /// Create access control with an initial admin.
    pub fn new(admin: impl Into<String>) -> Self {
        let admin = admin.into();
        let mut roles = HashMap::new();
        roles.insert(admin.clone(), Role::Admin);
        Self {
            roles,
            admin,
            pending_admin: None,
        }
    }

    /// Check if a caller has the specified role.
    pub fn has_role(&self, caller: &str, role: Role) -> bool {
        self.roles.get(caller).map_or(false, |r| *r == role)
    }

    /// Check if a caller is admin.
    pub fn is_admin(&self, caller: &str) -> bool {
        self.has_role(caller, Role::Admin)
    }

    /// Check if a caller may perform operational tasks (admin or operator).
    pub fn is_operator(&self, caller: &str) -> bool {
        self.is_admin(caller) || self.has_role(caller, Role::Operator)
    }

    /// Assign a role. Admin-only; returns `false` when unauthorized.
    pub fn grant_role(&mut self, admin_caller: &str, target: impl Into<String>, role: Role) -> bool {
        if !self.is_admin(admin_caller) {
            return false;
        }
        self.roles.insert(target.into(), role);
        true
    }

    /// Remove a role. Admin-only; the primary admin cannot be revoked.
    pub fn revoke_role(&mut self, admin_caller: &str, target: &str) -> bool {
        if !self.is_admin(admin_caller) || target == self.admin {
            return false;
        }
        self.roles.remove(target);
        true
    }

    /// Nominate a successor admin. Admin-only; replaces any prior nomination.
    pub fn nominate_admin(&mut self, admin_caller: &str, nominee: impl Into<String>) -> bool {
        if !self.is_admin(admin_caller) {
            return false;
        }
        self.pending_admin = Some(nominee.into());
        true
    }

    /// Accept a pending nomination. Only the nominee may accept.
    pub fn accept_admin(&mut self, caller: &str) -> bool {
        match &self.pending_admin {
            Some(nominee) if nominee == caller => {
                self.roles.remove(&self.admin);
                self.admin = caller.to_string();
                self.roles.insert(self.admin.clone(), Role::Admin);
                self.pending_admin = None;
                true
            }
            _ => false,
        }
    }

    /// Get the current admin identifier.
    pub fn admin(&self) -> &str {
        &self.admin
    }

    /// Get the pending admin nominee, if any.
    pub fn pending_admin(&self) -> Option<&str> {
        self.pending_admin.as_deref()
    }
}

/// Set-membership predicate over accounts.
///
/// Backs the fee-bypass list, the cap-bypass list, the recorder
/// allow-list, and the arbitrage market allow-list. Each check that
/// consults a list keeps its own instance; "exempt from fees" and
/// "exempt from cap accounting" are deliberately separate predicates.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    members: HashSet<AccountId>,
}

impl AllowList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            members: HashSet::new(),
        }
    }

    /// Check membership.
    pub fn is_included(&self, account: &AccountId) -> bool {
        self.members.contains(account)
    }

    /// Batch update. Returns `false` (without mutating) when the slices
    /// disagree in length.
    pub fn set(&mut self, accounts: &[AccountId], flags: &[bool]) -> bool {
        if accounts.len() != flags.len() {
            return false;
        }
        for (account, flag) in accounts.iter().zip(flags) {
            if *flag {
                self.members.insert(*account);
            } else {
                self.members.remove(account);
            }
        }
        true
    }

    /// Number of listed accounts.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Composable pause modifier.
///
/// When paused, protected operations must be rejected.
#[derive(Debug, Clone, Default)]
pub struct PauseGuard {
    paused: bool,
}

impl PauseGuard {
    /// Create a new unpaused guard.
    pub fn new() -> Self {
        Self { paused: false }
    }

    /// Pause operations.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Unpause operations.
    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Check if currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Reentrancy guard preventing nested calls into protected functions.
///
/// An entry point acquires the guard before any state change and releases
/// it on every exit path, success or error.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    locked: bool,
}

impl ReentrancyGuard {
    /// Create a new unlocked guard.
    pub fn new() -> Self {
        Self { locked: false }
    }

    /// Acquire the guard. Returns `false` if already locked.
    pub fn acquire(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    /// Release the guard.
    pub fn release(&mut self) {
        self.locked = false;
    }

    /// Check if currently locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Per-account nonce tracker for permit replay protection.
///
/// A nonce can only be consumed once per account.
#[derive(Debug, Clone, Default)]
pub struct NonceTracker {
    used: HashSet<(AccountId, u64)>,
}

impl NonceTracker {
    /// Create a new empty tracker.
    pub fn new() -> Self {
        Self { used: HashSet::new() }
    }

    /// Check if a nonce has been consumed for an account.
    pub fn is_used(&self, account: &AccountId, nonce: u64) -> bool {
        self.used.contains(&(*account, nonce))
    }

    /// Consume a nonce. Returns `false` if already used (replay attempt).
    pub fn use_nonce(&mut self, account: AccountId, nonce: u64) -> bool {
        self.used.insert((account, nonce))
    }

    /// Number of consumed nonces.
    pub fn count(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- AccessControl tests ---

    #[test]
    fn test_access_control_admin() {
        let ac = AccessControl::new("alice");
        assert!(ac.is_admin("alice"));
        assert!(!ac.is_admin("bob"));
        assert_eq!(ac.admin(), "alice");
    }

    #[test]
    fn test_grant_and_revoke_role() {
        let mut ac = AccessControl::new("alice");
        assert!(ac.grant_role("alice", "bob", Role::Operator));
        assert!(ac.has_role("bob", Role::Operator));
        assert!(ac.is_operator("bob"));
        assert!(!ac.is_admin("bob"));
        assert!(ac.revoke_role("alice", "bob"));
        assert!(!ac.has_role("bob", Role::Operator));
    }

    #[test]
    fn test_non_admin_cannot_grant() {
        let mut ac = AccessControl::new("alice");
        assert!(!ac.grant_role("bob", "charlie", Role::Operator));
    }

    #[test]
    fn test_cannot_revoke_primary_admin() {
        let mut ac = AccessControl::new("alice");
        assert!(!ac.revoke_role("alice", "alice"));
        assert!(ac.is_admin("alice"));
    }

    #[test]
    fn test_two_step_admin_handover() {
        let mut ac = AccessControl::new("alice");
        assert!(ac.nominate_admin("alice", "bob"));
        // Nothing changes until acceptance
        assert!(ac.is_admin("alice"));
        assert!(!ac.is_admin("bob"));
        assert_eq!(ac.pending_admin(), Some("bob"));

        assert!(ac.accept_admin("bob"));
        assert!(ac.is_admin("bob"));
        assert!(!ac.is_admin("alice"));
        assert_eq!(ac.pending_admin(), None);
    }

    #[test]
    fn test_only_nominee_can_accept() {
        let mut ac = AccessControl::new("alice");
        ac.nominate_admin("alice", "bob");
        assert!(!ac.accept_admin("eve"));
        assert!(ac.is_admin("alice"));
    }

    #[test]
    fn test_nomination_can_be_replaced() {
        let mut ac = AccessControl::new("alice");
        ac.nominate_admin("alice", "bob");
        ac.nominate_admin("alice", "carol");
        assert!(!ac.accept_admin("bob"));
        assert!(ac.accept_admin("carol"));
        assert!(ac.is_admin("carol"));
    }

    #[test]
    fn test_non_admin_cannot_nominate() {
        let mut ac = AccessControl::new("alice");
        assert!(!ac.nominate_admin("eve", "eve"));
    }

    // --- AllowList tests ---

    #[test]
    fn test_allow_list_set_and_check() {
        let mut list = AllowList::new();
        let a = AccountId::new();
        let b = AccountId::new();
        assert!(list.set(&[a, b], &[true, true]));
        assert!(list.is_included(&a));
        assert!(list.is_included(&b));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_allow_list_unset() {
        let mut list = AllowList::new();
        let a = AccountId::new();
        list.set(&[a], &[true]);
        list.set(&[a], &[false]);
        assert!(!list.is_included(&a));
        assert!(list.is_empty());
    }

    #[test]
    fn test_allow_list_length_mismatch_rejected() {
        let mut list = AllowList::new();
        let a = AccountId::new();
        assert!(!list.set(&[a], &[true, false]));
        assert!(list.is_empty());
    }

    // --- PauseGuard tests ---

    #[test]
    fn test_pause_guard() {
        let mut pg = PauseGuard::new();
        assert!(!pg.is_paused());
        pg.pause();
        assert!(pg.is_paused());
        pg.unpause();
        assert!(!pg.is_paused());
    }

    // --- ReentrancyGuard tests ---

    #[test]
    fn test_reentrancy_guard_cycle() {
        let mut guard = ReentrancyGuard::new();
        assert!(guard.acquire());
        assert!(guard.is_locked());
        assert!(!guard.acquire(), "nested acquire must fail");
        guard.release();
        assert!(guard.acquire(), "reacquire after release must succeed");
    }

    // --- NonceTracker tests ---

    #[test]
    fn test_nonce_tracker_replay_rejected() {
        let mut tracker = NonceTracker::new();
        let acc = AccountId::new();
        assert!(tracker.use_nonce(acc, 7));
        assert!(tracker.is_used(&acc, 7));
        assert!(!tracker.use_nonce(acc, 7));
    }

    #[test]
    fn test_nonce_tracker_independent_accounts() {
        let mut tracker = NonceTracker::new();
        let a = AccountId::new();
        let b = AccountId::new();
        assert!(tracker.use_nonce(a, 1));
        assert!(tracker.use_nonce(b, 1));
        assert_eq!(tracker.count(), 2);
    }
}
