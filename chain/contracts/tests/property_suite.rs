//! Property Tests
//!
//! Randomized invariant checks over the accounting core:
//! - Round-trip shortfall is fully explained by captured fees
//! - Flow-cap accounting never exceeds its caps and never goes negative
//! - The rate limiter never admits more than the effective limit per
//!   window and mutates nothing on rejection
//! - Token supply always equals the sum of balances

use contracts::caps::FlowCapLedger;
use contracts::decimal::DecimalAdapter;
use contracts::hooks::{FeeCaptureHook, FlowHook};
use contracts::rate_limit::PeriodicRateLimiter;
use contracts::token::TokenBank;
use contracts::vault::CollateralVault;
use proptest::prelude::*;
use rust_decimal::Decimal;
use types::fee::FeeConfig;
use types::ids::AccountId;

fn vault_fixture(
    deposit_fee_percent: u64,
    withdraw_fee_percent: u64,
) -> (TokenBank, CollateralVault, AccountId) {
    let mut bank = TokenBank::new();
    bank.create_token("USDm", 6).unwrap();
    bank.create_token("sUSD", 18).unwrap();
    let mut vault = CollateralVault::new(
        "admin",
        "USDm",
        "sUSD",
        DecimalAdapter::new(6),
        FlowCapLedger::new("admin", Decimal::MAX, Decimal::MAX),
        PeriodicRateLimiter::new("admin", 20, Decimal::MAX, Decimal::ZERO, 0),
    );
    let treasury = AccountId::new();
    let mut hook = FeeCaptureHook::new("admin", treasury);
    hook.set_registered_callers("admin", &[vault.address()], &[true])
        .unwrap();
    vault
        .set_deposit_hook("admin", Some(hook.box_clone()))
        .unwrap();
    vault
        .set_withdraw_hook("admin", Some(Box::new(hook)))
        .unwrap();
    vault
        .set_fee_config(
            "admin",
            FeeConfig {
                deposit_fee_percent,
                withdraw_fee_percent,
            },
        )
        .unwrap();
    (bank, vault, treasury)
}

proptest! {
    // ═══ Round-trip fee accounting ═══

    #[test]
    fn prop_round_trip_shortfall_equals_captured_fees(
        amount in 1u64..=1_000_000,
        deposit_fee in 10u64..=100_000,
        withdraw_fee in 10u64..=100_000,
    ) {
        let (mut bank, mut vault, treasury) = vault_fixture(deposit_fee, withdraw_fee);
        let acc = AccountId::new();
        let amount = Decimal::from(amount);
        bank.mint("USDm", acc, amount).unwrap();
        bank.approve("USDm", acc, vault.address(), amount).unwrap();

        let minted = vault.deposit(&mut bank, acc, acc, amount, 0, Vec::new()).unwrap();
        let released = vault.withdraw(&mut bank, acc, acc, minted, 1, Vec::new()).unwrap();

        let fees = bank.balance_of("USDm", &treasury).unwrap();
        prop_assert!(released <= amount);
        prop_assert_eq!(released + fees, amount);
        // Custody fully unwound
        prop_assert_eq!(
            bank.balance_of("USDm", &vault.address()).unwrap(),
            Decimal::ZERO
        );
        prop_assert_eq!(bank.total_supply("sUSD").unwrap(), Decimal::ZERO);
    }

    // ═══ Flow-cap invariants ═══

    #[test]
    fn prop_caps_never_exceeded_and_global_never_negative(
        ops in prop::collection::vec((any::<bool>(), 0u64..=5_000), 1..40),
    ) {
        let global_cap = Decimal::from(20_000);
        let account_cap = Decimal::from(8_000);
        let mut caps = FlowCapLedger::new("admin", global_cap, account_cap);
        let recorder = AccountId::new();
        caps.set_recorders("admin", &[recorder], &[true]).unwrap();
        let accounts = [AccountId::new(), AccountId::new(), AccountId::new()];

        for (i, (is_deposit, amount)) in ops.iter().enumerate() {
            let account = accounts[i % accounts.len()];
            let amount = Decimal::from(*amount);
            if *is_deposit {
                let _ = caps.record_deposit(&recorder, account, amount);
            } else {
                caps.record_withdrawal(&recorder, amount).unwrap();
            }
            prop_assert!(caps.global_net() >= Decimal::ZERO);
            prop_assert!(caps.global_net() <= global_cap);
            for account in &accounts {
                prop_assert!(caps.account_amount(account) <= account_cap);
            }
        }
    }

    // ═══ Rate limiter invariants ═══

    #[test]
    fn prop_rate_limiter_window_never_exceeds_limit(
        ops in prop::collection::vec((0u64..=1_500, 0i64..=30), 1..40),
    ) {
        let limit = Decimal::from(1_000);
        let mut rl = PeriodicRateLimiter::new("admin", 20, limit, Decimal::ZERO, 0);
        let mut now = 0i64;

        for (amount, dt) in ops {
            now += dt;
            let amount = Decimal::from(amount);
            let before = (rl.last_reset(), rl.amount_this_window());
            let result = rl.check_and_record(amount, now, Decimal::ZERO);
            match result {
                Ok(()) => prop_assert!(rl.amount_this_window() <= limit),
                Err(_) => {
                    // Rejection leaves no trace, including the lazy reset
                    prop_assert_eq!((rl.last_reset(), rl.amount_this_window()), before);
                }
            }
        }
    }

    // ═══ Supply conservation ═══

    #[test]
    fn prop_supply_equals_sum_of_balances(
        ops in prop::collection::vec((0u8..3, 0usize..3, 0usize..3, 1u64..=10_000), 1..40),
    ) {
        let mut bank = TokenBank::new();
        bank.create_token("USDm", 6).unwrap();
        let accounts = [AccountId::new(), AccountId::new(), AccountId::new()];

        for (kind, from, to, amount) in ops {
            let amount = Decimal::from(amount);
            match kind {
                0 => bank.mint("USDm", accounts[to], amount).unwrap(),
                1 => {
                    let _ = bank.burn("USDm", &accounts[from], amount);
                }
                _ => {
                    let _ = bank.transfer("USDm", &accounts[from], accounts[to], amount);
                }
            }
            let sum: Decimal = accounts
                .iter()
                .map(|account| bank.balance_of("USDm", account).unwrap())
                .sum();
            prop_assert_eq!(bank.total_supply("USDm").unwrap(), sum);
        }
    }
}
