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

//! Account management.
//!
//! An [`Account`] owns one [`BalanceTable`] and drives every change to it
//! through the same pipeline:
//!
//! ```text
//!  compute from/to ──► constraint check ──► notify ──canceled──► Failed
//!                      (provisional)          │
//!                                             ├─ provisional failed ──► returned as is
//!                                             └─ provisional success ──► commit ──► persist ──► Success
//! ```
//!
//! Business failures are reported in the returned [`TransactionOutcome`].
//! Persistence failures are logged; memory stays ahead of disk until the next
//! successful save.
//!
//! # Example
//!
//! ```
//! use currency_ledger::{
//!     Account, AccountId, AccountServices, Cause, ContextSet, EventBus, MemoryStore,
//!     PlainCurrency,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let services = Arc::new(AccountServices::new(
//!     Arc::new(EventBus::new()),
//!     Arc::new(MemoryStore::new()),
//! ));
//! let account = Account::new(AccountId::from("alex"), services);
//! let coins = PlainCurrency::new("coins");
//!
//! let outcome = account.deposit(&coins, dec!(25), &Cause::from("quest"), &ContextSet::empty());
//! assert!(outcome.is_success());
//! assert_eq!(account.balance(&coins, &ContextSet::empty()), dec!(25));
//! ```

use crate::balance_table::BalanceTable;
use crate::base::{AccountId, ContextSet};
use crate::constraint;
use crate::context::ContextCalculators;
use crate::currency::{self, Currency, CurrencyId, CurrencyRegistry};
use crate::notify::{Cause, TransactionNotifier};
use crate::store::{self, BalanceStore};
use crate::transaction::{ResultType, TransactionKind, TransactionOutcome, TransactionRecord};
use parking_lot::ReentrantMutex;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Collaborators shared by the accounts of one ledger.
pub struct AccountServices {
    pub notifier: Arc<dyn TransactionNotifier>,
    pub store: Arc<dyn BalanceStore>,
    pub currencies: Arc<CurrencyRegistry>,
    pub contexts: Arc<ContextCalculators>,
}

impl AccountServices {
    /// Services with an empty currency registry and no context calculators.
    pub fn new(notifier: Arc<dyn TransactionNotifier>, store: Arc<dyn BalanceStore>) -> Self {
        Self {
            notifier,
            store,
            currencies: Arc::new(CurrencyRegistry::new()),
            contexts: Arc::new(ContextCalculators::new()),
        }
    }

    pub fn with_currencies(mut self, currencies: Arc<CurrencyRegistry>) -> Self {
        self.currencies = currencies;
        self
    }

    pub fn with_context_calculators(mut self, contexts: Arc<ContextCalculators>) -> Self {
        self.contexts = contexts;
        self
    }
}

/// Anything that can be named as the destination of a transfer.
///
/// Transfers only succeed towards accounts backed by a [`BalanceTable`], i.e.
/// those returning `Some` from [`as_table_account`](Self::as_table_account).
pub trait LedgerAccount: Send + Sync {
    fn identifier(&self) -> &AccountId;

    fn as_table_account(&self) -> Option<&Account> {
        None
    }
}

/// Ledger account.
///
/// The table sits behind a re-entrant lock held for the whole of each
/// operation. Notification listeners run on the mutating thread, so they can
/// read the balances of the accounts being changed. Mutating an account whose
/// own mutation is awaiting its notifier fails instead.
pub struct Account {
    id: AccountId,
    display_name: String,
    table: ReentrantMutex<RefCell<BalanceTable>>,
    /// Set from notification to commit; only touched with `table` locked.
    in_pipeline: AtomicBool,
    services: Arc<AccountServices>,
}

impl Account {
    /// Opens an account, loading any persisted balances.
    pub fn new(id: AccountId, services: Arc<AccountServices>) -> Self {
        let display_name = id.to_string();
        Self::with_display_name(id, display_name, services)
    }

    pub fn with_display_name(
        id: AccountId,
        display_name: impl Into<String>,
        services: Arc<AccountServices>,
    ) -> Self {
        let table = store::load_or_empty(services.store.as_ref(), &id);
        info!(account = %id, entries = table.len(), "opened account");
        Self {
            id,
            display_name: display_name.into(),
            table: ReentrantMutex::new(RefCell::new(table)),
            in_pipeline: AtomicBool::new(false),
            services,
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Contexts currently applying to this account.
    pub fn active_contexts(&self) -> ContextSet {
        self.services.contexts.active_contexts(&self.id)
    }

    pub fn default_balance(&self, currency: &dyn Currency) -> Decimal {
        currency::default_balance(currency)
    }

    /// Whether anything is stored for this pair, zero included.
    pub fn has_balance(&self, currency: &dyn Currency, contexts: &ContextSet) -> bool {
        self.stored(currency.id(), contexts).is_some()
    }

    /// Stored balance, or zero when nothing is stored.
    pub fn balance(&self, currency: &dyn Currency, contexts: &ContextSet) -> Decimal {
        self.stored(currency.id(), contexts)
            .unwrap_or(Decimal::ZERO)
    }

    /// Every stored balance for exactly `contexts`.
    pub fn balances(&self, contexts: &ContextSet) -> HashMap<CurrencyId, Decimal> {
        self.table.lock().borrow().balances(contexts)
    }

    /// Copy of the whole table.
    pub fn snapshot(&self) -> BalanceTable {
        self.table.lock().borrow().clone()
    }

    pub fn deposit(
        &self,
        currency: &dyn Currency,
        amount: Decimal,
        cause: &Cause,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let _guard = self.table.lock();
        let from = self.balance_or_default(currency, contexts);
        match from.checked_add(amount) {
            Some(to) => self.handle_non_transfer(cause, from, to, currency, contexts),
            None => self.overflowed(currency, amount, contexts),
        }
    }

    pub fn withdraw(
        &self,
        currency: &dyn Currency,
        amount: Decimal,
        cause: &Cause,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let _guard = self.table.lock();
        let from = self.balance_or_default(currency, contexts);
        match from.checked_sub(amount) {
            Some(to) => self.handle_non_transfer(cause, from, to, currency, contexts),
            None => self.overflowed(currency, -amount, contexts),
        }
    }

    /// Sets the balance to `amount`.
    ///
    /// Unlike deposit and withdraw, the starting point of a missing entry is
    /// zero, not the currency default.
    pub fn set_balance(
        &self,
        currency: &dyn Currency,
        amount: Decimal,
        cause: &Cause,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let _guard = self.table.lock();
        let from = self.balance(currency, contexts);
        self.handle_non_transfer(cause, from, amount, currency, contexts)
    }

    /// Sets the balance back to the currency default.
    ///
    /// Nothing stored means nothing to reset: returns a success with a zero
    /// amount without notifying or writing.
    pub fn reset_balance(
        &self,
        currency: &dyn Currency,
        cause: &Cause,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let _guard = self.table.lock();
        if !self.has_balance(currency, contexts) {
            let record = self.record(currency.id(), Decimal::ZERO, contexts, TransactionKind::Withdraw);
            return TransactionOutcome::success(record);
        }
        self.set_balance(currency, currency::default_balance(currency), cause, contexts)
    }

    /// Resets every currency that has a balance stored for `contexts`.
    ///
    /// Currencies are looked up in the ledger's registry, which remembers every
    /// currency an account has written. The outcome succeeds only if every
    /// reset did. It describes the first
    /// currency of the table (by id) with its default as the amount. Returns
    /// `None` when the account holds no currency at all, since there is
    /// nothing to describe.
    pub fn reset_balances(&self, cause: &Cause, contexts: &ContextSet) -> Option<TransactionOutcome> {
        let _guard = self.table.lock();
        let currencies = self.table.lock().borrow().currencies();
        let first = currencies.first()?;

        let representative = self.record(
            first,
            currency::default_balance(self.services.currencies.resolve(first).as_ref()),
            contexts,
            TransactionKind::Withdraw,
        );

        let mut all_ok = true;
        for id in &currencies {
            let currency = self.services.currencies.resolve(id);
            if !self.has_balance(currency.as_ref(), contexts) {
                continue;
            }
            all_ok &= self
                .reset_balance(currency.as_ref(), cause, contexts)
                .is_success();
        }

        Some(if all_ok {
            TransactionOutcome::success(representative)
        } else {
            TransactionOutcome::failed(representative)
        })
    }

    /// Moves `amount` from this account to `to`.
    ///
    /// Both accounts are locked (in a global order) for the whole operation.
    /// The constraint check covers both post-balances and a successful commit
    /// persists both accounts.
    pub fn transfer(
        &self,
        to: &dyn LedgerAccount,
        currency: &dyn Currency,
        amount: Decimal,
        cause: &Cause,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let destination = to.identifier().clone();
        let outcome = match to.as_table_account() {
            Some(target) if !std::ptr::eq(self, target) => {
                self.handle_transfer(target, currency, amount, cause, contexts)
            }
            _ => {
                debug!(account = %self.id, %destination, "unsupported transfer target");
                // Sign of the change is that of `-amount`.
                let kind = TransactionKind::between(amount, Decimal::ZERO);
                TransactionOutcome::failed(self.record(currency.id(), -amount, contexts, kind))
            }
        };
        outcome.into_transfer(destination)
    }

    fn stored(&self, currency: &CurrencyId, contexts: &ContextSet) -> Option<Decimal> {
        self.table.lock().borrow().get(currency, contexts)
    }

    fn balance_or_default(&self, currency: &dyn Currency, contexts: &ContextSet) -> Decimal {
        self.stored(currency.id(), contexts)
            .unwrap_or_else(|| currency::default_balance(currency))
    }

    fn record(
        &self,
        currency: &CurrencyId,
        amount: Decimal,
        contexts: &ContextSet,
        kind: TransactionKind,
    ) -> TransactionRecord {
        TransactionRecord::new(self.id.clone(), currency.clone(), amount, contexts.clone(), kind)
    }

    /// Outcome for a change whose resulting balance is not representable.
    fn overflowed(
        &self,
        currency: &dyn Currency,
        amount: Decimal,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        debug!(account = %self.id, currency = %currency.id(), %amount, "balance overflow");
        let kind = TransactionKind::between(Decimal::ZERO, amount);
        TransactionOutcome::failed(self.record(currency.id(), amount, contexts, kind))
    }

    fn handle_non_transfer(
        &self,
        cause: &Cause,
        from: Decimal,
        to: Decimal,
        currency: &dyn Currency,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let Some(delta) = to.checked_sub(from) else {
            return self.overflowed(currency, to, contexts);
        };
        let kind = TransactionKind::between(from, to);
        let record = self.record(currency.id(), delta, contexts, kind);
        if self.is_in_pipeline() {
            return self.nested(record);
        }
        let provisional = TransactionOutcome::new(record, constraint::check(currency, &[to]));

        self.handle_action(&[self], cause, provisional, || {
            self.commit(currency, contexts, to);
        })
    }

    fn handle_transfer(
        &self,
        target: &Account,
        currency: &dyn Currency,
        amount: Decimal,
        cause: &Cause,
        contexts: &ContextSet,
    ) -> TransactionOutcome {
        let (first, second) = if lock_order(self) <= lock_order(target) {
            (self, target)
        } else {
            (target, self)
        };
        let _first = first.table.lock();
        let _second = second.table.lock();

        let from = self.balance_or_default(currency, contexts);
        let Some(to) = from.checked_sub(amount) else {
            return self.overflowed(currency, -amount, contexts);
        };
        let Some(delta) = to.checked_sub(from) else {
            return self.overflowed(currency, -amount, contexts);
        };
        let Some(target_to) = target.balance_or_default(currency, contexts).checked_sub(delta) else {
            return self.overflowed(currency, delta, contexts);
        };

        let kind = TransactionKind::between(from, to);
        let record = self.record(currency.id(), delta, contexts, kind);
        if self.is_in_pipeline() || target.is_in_pipeline() {
            return self.nested(record);
        }
        let result = constraint::check(currency, &[to, target_to]);
        let provisional = TransactionOutcome::new(record, result).into_transfer(target.id.clone());

        self.handle_action(&[self, target], cause, provisional, || {
            self.commit(currency, contexts, to);
            target.commit(currency, contexts, target_to);
        })
    }

    /// Notify, then commit if both the notifier and the constraint check agree.
    ///
    /// `involved` accounts are marked in-pipeline until the attempt resolves.
    fn handle_action(
        &self,
        involved: &[&Account],
        cause: &Cause,
        provisional: TransactionOutcome,
        commit: impl FnOnce(),
    ) -> TransactionOutcome {
        let _pipeline = PipelineGuard::enter(involved);
        if self.services.notifier.notify(cause, &provisional) {
            debug!(account = %self.id, currency = %provisional.currency(), %cause, "transaction canceled");
            return provisional.with_result(ResultType::Failed);
        }
        if !provisional.is_success() {
            debug!(
                account = %self.id,
                currency = %provisional.currency(),
                result = %provisional.result(),
                "transaction rejected"
            );
            return provisional;
        }

        commit();
        debug!(
            account = %self.id,
            currency = %provisional.currency(),
            amount = %provisional.amount(),
            "transaction committed"
        );
        provisional
    }

    fn is_in_pipeline(&self) -> bool {
        self.in_pipeline.load(Ordering::SeqCst)
    }

    /// Outcome for a mutation started by a listener of a pending mutation on
    /// the same account. Its `from` would be stale by the time the outer
    /// mutation commits.
    fn nested(&self, record: TransactionRecord) -> TransactionOutcome {
        debug!(account = %self.id, currency = %record.currency, "nested mutation rejected");
        TransactionOutcome::failed(record)
    }

    /// Writes `amount` and persists the table.
    fn commit(&self, currency: &dyn Currency, contexts: &ContextSet, amount: Decimal) {
        self.services.currencies.remember(currency);
        let guard = self.table.lock();
        guard
            .borrow_mut()
            .put(currency.id().clone(), contexts.clone(), amount);
        store::save_or_log(self.services.store.as_ref(), &self.id, &guard.borrow());
    }
}

/// Marks accounts as in-pipeline, clearing the mark on drop.
struct PipelineGuard<'a> {
    accounts: &'a [&'a Account],
}

impl<'a> PipelineGuard<'a> {
    fn enter(accounts: &'a [&'a Account]) -> Self {
        for account in accounts {
            account.in_pipeline.store(true, Ordering::SeqCst);
        }
        Self { accounts }
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        for account in self.accounts {
            account.in_pipeline.store(false, Ordering::SeqCst);
        }
    }
}

/// Global lock order: account id, then address for distinct accounts sharing an id.
fn lock_order(account: &Account) -> (&AccountId, usize) {
    (&account.id, account as *const Account as usize)
}

impl LedgerAccount for Account {
    fn identifier(&self) -> &AccountId {
        &self.id
    }

    fn as_table_account(&self) -> Option<&Account> {
        Some(self)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}
