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

//! # Currency Ledger
//!
//! This library tracks per-account balances across multiple currencies and
//! contexts (tags qualifying where a balance applies, e.g. per-world
//! economies), persists them, and routes every balance change through a
//! cancellable transaction pipeline.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Registry of open accounts and their shared collaborators
//! - [`Account`]: Deposit, withdraw, set, reset and transfer with constraint checks
//! - [`TransactionOutcome`]: Immutable result of a mutation attempt
//! - [`Currency`] / [`ConstrainedCurrency`]: Currencies and their optional rules
//! - [`BalanceStore`]: Persistence contract, with [`JsonFileStore`] and [`MemoryStore`]
//! - [`TransactionNotifier`]: Veto hook, implemented in-process by [`EventBus`]
//!
//! ## Example
//!
//! ```
//! use currency_ledger::{
//!     AccountId, AccountServices, Cause, ContextSet, CurrencyConstraints, EventBus,
//!     ExtendedCurrency, Ledger, MemoryStore, ResultType,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let ledger = Ledger::new(AccountServices::new(
//!     Arc::new(EventBus::new()),
//!     Arc::new(MemoryStore::new()),
//! ));
//! let gold = ExtendedCurrency::new("gold", CurrencyConstraints::default().no_negatives());
//! let cause = Cause::from("shop");
//! let global = ContextSet::empty();
//!
//! let alex = ledger.account(&AccountId::from("alex"));
//! let blake = ledger.account(&AccountId::from("blake"));
//! alex.deposit(&gold, dec!(15), &cause, &global);
//!
//! // Overdrawing a no-negatives currency is reported, not applied.
//! let outcome = alex.transfer(blake.as_ref(), &gold, dec!(20), &cause, &global);
//! assert_eq!(outcome.result(), ResultType::AccountNoFunds);
//! assert_eq!(alex.balance(&gold, &global), dec!(15));
//!
//! let outcome = alex.transfer(blake.as_ref(), &gold, dec!(10), &cause, &global);
//! assert!(outcome.is_success());
//! assert_eq!(blake.balance(&gold, &global), dec!(10));
//! ```
//!
//! ## Thread Safety
//!
//! Each account serializes its own operations; transfers lock both accounts in
//! a fixed order, so opposing transfers cannot deadlock.

pub mod account;
pub mod balance_table;
mod base;
pub mod config;
pub mod constraint;
pub mod context;
pub mod currency;
mod engine;
pub mod error;
pub mod notify;
pub mod save_queue;
pub mod store;
mod transaction;

pub use account::{Account, AccountServices, LedgerAccount};
pub use balance_table::BalanceTable;
pub use base::{AccountId, Context, ContextSet};
pub use config::{CurrencyDefinition, LedgerConfig};
pub use context::{ContextCalculator, ContextCalculators, ContextMatch};
pub use currency::{
    ConstrainedCurrency, Currency, CurrencyConstraints, CurrencyId, CurrencyRegistry,
    ExtendedCurrency, PlainCurrency,
};
pub use engine::Ledger;
pub use error::LedgerError;
pub use notify::{Cause, EventBus, TransactionEvent, TransactionListener, TransactionNotifier};
pub use save_queue::BackgroundStore;
pub use store::{BalanceStore, JsonFileStore, MemoryStore};
pub use transaction::{
    OutcomeKind, ResultType, TransactionKind, TransactionOutcome, TransactionRecord,
};
