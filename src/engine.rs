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

//! Ledger service.
//!
//! The [`Ledger`] owns every open [`Account`] and the collaborators they share.
//! Accounts are opened on first access, which loads their persisted balances.
//!
//! # Thread Safety
//!
//! Accounts live in a [`DashMap`] behind [`Arc`]s. Operations on different
//! accounts run in parallel; operations on one account are serialized by that
//! account's lock, and transfers take both locks in a fixed order.

use crate::account::{Account, AccountServices};
use crate::base::AccountId;
use crate::config::LedgerConfig;
use crate::currency::CurrencyRegistry;
use crate::notify::{EventBus, TransactionNotifier};
use crate::save_queue::BackgroundStore;
use crate::store::{BalanceStore, JsonFileStore};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Registry of open accounts.
pub struct Ledger {
    /// Open accounts indexed by id.
    accounts: DashMap<AccountId, Arc<Account>>,
    services: Arc<AccountServices>,
}

impl Ledger {
    pub fn new(services: AccountServices) -> Self {
        Ledger {
            accounts: DashMap::new(),
            services: Arc::new(services),
        }
    }

    /// Builds a ledger from configuration, using `notifier` for vetoes.
    ///
    /// Configured currencies are registered; balances are stored as JSON files
    /// under the configured data directory, through a background worker when
    /// `background_saves` is set.
    pub fn from_config(config: &LedgerConfig, notifier: Arc<dyn TransactionNotifier>) -> Self {
        let files: Arc<dyn BalanceStore> = Arc::new(JsonFileStore::new(config.data_dir.clone()));
        let store: Arc<dyn BalanceStore> = if config.background_saves {
            Arc::new(BackgroundStore::new(files))
        } else {
            files
        };

        let currencies = Arc::new(CurrencyRegistry::new());
        for definition in &config.currencies {
            currencies.register(definition.to_currency());
        }
        info!(
            data_dir = %config.data_dir.display(),
            currencies = currencies.len(),
            background_saves = config.background_saves,
            "ledger configured"
        );

        Self::new(
            AccountServices::new(notifier, store).with_currencies(currencies),
        )
    }

    /// Like [`from_config`](Self::from_config) with a fresh [`EventBus`],
    /// returned so the caller can register listeners.
    pub fn from_config_with_bus(config: &LedgerConfig) -> (Self, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        (Self::from_config(config, bus.clone()), bus)
    }

    /// Returns the account for `id`, opening it on first access.
    pub fn account(&self, id: &AccountId) -> Arc<Account> {
        if let Some(account) = self.accounts.get(id) {
            return Arc::clone(account.value());
        }
        let account = self
            .accounts
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Account::new(id.clone(), Arc::clone(&self.services))));
        Arc::clone(account.value())
    }

    /// Returns the account for `id` if it has been opened.
    pub fn get_account(&self, id: &AccountId) -> Option<Arc<Account>> {
        self.accounts.get(id).map(|account| Arc::clone(account.value()))
    }

    pub fn has_account(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    /// Open accounts, sorted by id.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_by(|a, b| a.id().cmp(b.id()));
        accounts
    }

    pub fn currencies(&self) -> &CurrencyRegistry {
        &self.services.currencies
    }

    pub fn services(&self) -> &Arc<AccountServices> {
        &self.services
    }
}
