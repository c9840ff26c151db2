// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Property-based tests for the ledger.
//!
//! These tests verify invariants that should hold for any sequence of
//! operations, whatever their individual outcomes.

use currency_ledger::{
    Account, AccountId, AccountServices, BalanceTable, Cause, Context, ContextSet,
    CurrencyConstraints, EventBus, ExtendedCurrency, MemoryStore, PlainCurrency, ResultType,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (up to 1000 with 4 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

/// Generate a signed amount.
fn arb_signed_amount() -> impl Strategy<Value = Decimal> {
    (-10_000_000i64..=10_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

#[derive(Debug, Clone)]
enum Op {
    Deposit(Decimal),
    Withdraw(Decimal),
    Set(Decimal),
    Reset,
    TransferOut(Decimal),
    TransferIn(Decimal),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_amount().prop_map(Op::Deposit),
        arb_amount().prop_map(Op::Withdraw),
        arb_signed_amount().prop_map(Op::Set),
        Just(Op::Reset),
        arb_signed_amount().prop_map(Op::TransferOut),
        arb_signed_amount().prop_map(Op::TransferIn),
    ]
}

fn arb_contexts() -> impl Strategy<Value = ContextSet> {
    prop::collection::vec((0u8..3, 0u8..3), 0..3).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| Context::new(format!("k{k}"), format!("v{v}")))
            .collect()
    })
}

fn services() -> Arc<AccountServices> {
    Arc::new(AccountServices::new(
        Arc::new(EventBus::new()),
        Arc::new(MemoryStore::new()),
    ))
}

fn pair() -> (Account, Account) {
    let services = services();
    (
        Account::new(AccountId::from("alex"), services.clone()),
        Account::new(AccountId::from("blake"), services),
    )
}

fn apply(
    op: &Op,
    alex: &Account,
    blake: &Account,
    currency: &ExtendedCurrency,
    contexts: &ContextSet,
) -> ResultType {
    let cause = Cause::from("prop");
    let outcome = match op {
        Op::Deposit(amount) => alex.deposit(currency, *amount, &cause, contexts),
        Op::Withdraw(amount) => alex.withdraw(currency, *amount, &cause, contexts),
        Op::Set(amount) => alex.set_balance(currency, *amount, &cause, contexts),
        Op::Reset => alex.reset_balance(currency, &cause, contexts),
        Op::TransferOut(amount) => alex.transfer(blake, currency, *amount, &cause, contexts),
        Op::TransferIn(amount) => blake.transfer(alex, currency, *amount, &cause, contexts),
    };
    outcome.result()
}

// =============================================================================
// Constraint Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A no-negatives currency never stores a negative balance.
    #[test]
    fn no_negatives_never_below_zero(
        ops in prop::collection::vec(arb_op(), 1..30),
        default in 0i64..1000,
    ) {
        let (alex, blake) = pair();
        let currency = ExtendedCurrency::new(
            "gold",
            CurrencyConstraints::default()
                .with_default_balance(Decimal::from(default))
                .no_negatives(),
        );
        let global = ContextSet::empty();

        for op in &ops {
            let _ = apply(op, &alex, &blake, &currency, &global);
            prop_assert!(alex.balance(&currency, &global) >= Decimal::ZERO);
            prop_assert!(blake.balance(&currency, &global) >= Decimal::ZERO);
        }
    }

    /// A capped currency never stores a balance above its maximum.
    #[test]
    fn maximum_never_exceeded(
        ops in prop::collection::vec(arb_op(), 1..30),
        maximum in 1i64..2000,
    ) {
        let (alex, blake) = pair();
        let maximum = Decimal::from(maximum);
        let currency = ExtendedCurrency::new(
            "gems",
            CurrencyConstraints::default().with_maximum_balance(maximum),
        );
        let global = ContextSet::empty();

        for op in &ops {
            let _ = apply(op, &alex, &blake, &currency, &global);
            prop_assert!(alex.balance(&currency, &global) <= maximum);
            prop_assert!(blake.balance(&currency, &global) <= maximum);
        }
    }

    /// A rejected operation leaves both accounts untouched.
    #[test]
    fn failed_operations_change_nothing(
        ops in prop::collection::vec(arb_op(), 1..30),
        contexts in arb_contexts(),
    ) {
        let (alex, blake) = pair();
        let currency = ExtendedCurrency::new(
            "gold",
            CurrencyConstraints::default()
                .no_negatives()
                .with_maximum_balance(Decimal::from(500)),
        );

        for op in &ops {
            let before: (BalanceTable, BalanceTable) = (alex.snapshot(), blake.snapshot());
            let result = apply(op, &alex, &blake, &currency, &contexts);
            if result != ResultType::Success {
                prop_assert_eq!(alex.snapshot(), before.0);
                prop_assert_eq!(blake.snapshot(), before.1);
            }
        }
    }
}

// =============================================================================
// Transfer Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Transfers move value; they never create or destroy it.
    #[test]
    fn transfers_conserve_total(
        transfers in prop::collection::vec((any::<bool>(), arb_signed_amount()), 1..40),
        contexts in arb_contexts(),
    ) {
        let (alex, blake) = pair();
        let coins = PlainCurrency::new("coins");
        let cause = Cause::from("prop");

        for (outgoing, amount) in &transfers {
            let (from, to) = if *outgoing { (&alex, &blake) } else { (&blake, &alex) };
            let outcome = from.transfer(to, &coins, *amount, &cause, &contexts);
            prop_assert!(outcome.is_success());
        }

        let total = alex.balance(&coins, &contexts) + blake.balance(&coins, &contexts);
        prop_assert_eq!(total, Decimal::ZERO);
    }

    /// The outcome amount is the change of the source balance.
    #[test]
    fn outcome_amount_matches_balance_change(
        ops in prop::collection::vec(arb_op(), 1..30),
    ) {
        let (alex, blake) = pair();
        let currency = ExtendedCurrency::new(
            "gold",
            CurrencyConstraints::default().with_default_balance(Decimal::from(50)),
        );
        let global = ContextSet::empty();
        let cause = Cause::from("prop");

        for op in &ops {
            let Op::Deposit(amount) = op else {
                let _ = apply(op, &alex, &blake, &currency, &global);
                continue;
            };
            let before = if alex.has_balance(&currency, &global) {
                alex.balance(&currency, &global)
            } else {
                alex.default_balance(&currency)
            };
            let outcome = alex.deposit(&currency, *amount, &cause, &global);
            prop_assert!(outcome.is_success());
            prop_assert_eq!(outcome.amount(), *amount);
            prop_assert_eq!(alex.balance(&currency, &global), before + *amount);
        }
    }
}

// =============================================================================
// Read Invariants
// =============================================================================

proptest! {
    /// Reads are idempotent and never create entries.
    #[test]
    fn reads_are_idempotent(
        amount in arb_signed_amount(),
        contexts in arb_contexts(),
    ) {
        let services = services();
        let alex = Account::new(AccountId::from("alex"), services);
        let coins = PlainCurrency::new("coins");

        prop_assert!(!alex.has_balance(&coins, &contexts));
        prop_assert_eq!(alex.balance(&coins, &contexts), Decimal::ZERO);
        prop_assert!(alex.snapshot().is_empty());

        alex.set_balance(&coins, amount, &Cause::from("prop"), &contexts);
        let first = alex.balance(&coins, &contexts);
        let second = alex.balance(&coins, &contexts);
        prop_assert_eq!(first, amount);
        prop_assert_eq!(first, second);
        prop_assert_eq!(alex.snapshot().len(), 1);
    }
}
