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

//! Currencies and their optional constraints.
//!
//! A currency is an opaque value to the ledger except for its identity and the
//! [`ConstrainedCurrency`] capability. Currencies that don't expose the
//! capability are unconstrained and default to a zero balance.
//!
//! # Example
//!
//! ```
//! use currency_ledger::{
//!     ConstrainedCurrency, Currency, CurrencyConstraints, ExtendedCurrency, PlainCurrency,
//! };
//! use rust_decimal_macros::dec;
//!
//! let coins = PlainCurrency::new("coins");
//! assert!(coins.constraints().is_none());
//!
//! let gems = ExtendedCurrency::new(
//!     "gems",
//!     CurrencyConstraints::default().no_negatives().with_maximum_balance(dec!(999)),
//! );
//! let constraints = gems.constraints().unwrap();
//! assert!(!constraints.supports_negatives());
//! assert_eq!(constraints.maximum_account_balance(), Some(dec!(999)));
//! ```

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a currency, also its key in balance tables and on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CurrencyId(pub String);

impl CurrencyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for CurrencyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A unit of account.
pub trait Currency: fmt::Debug + Send + Sync {
    fn id(&self) -> &CurrencyId;

    /// Returns the constraint capability, if this currency has one.
    fn constraints(&self) -> Option<&dyn ConstrainedCurrency> {
        None
    }
}

/// Per-currency balance rules.
pub trait ConstrainedCurrency: Send + Sync {
    /// Balance assumed for an account that has no stored entry.
    fn default_balance(&self) -> Decimal;

    fn supports_negatives(&self) -> bool;

    fn maximum_account_balance(&self) -> Option<Decimal>;
}

/// Default balance of `currency`, zero when it is unconstrained.
pub fn default_balance(currency: &dyn Currency) -> Decimal {
    currency
        .constraints()
        .map_or(Decimal::ZERO, |constraints| constraints.default_balance())
}

/// A currency without constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCurrency {
    id: CurrencyId,
}

impl PlainCurrency {
    pub fn new(id: impl Into<CurrencyId>) -> Self {
        Self { id: id.into() }
    }
}

impl Currency for PlainCurrency {
    fn id(&self) -> &CurrencyId {
        &self.id
    }
}

/// Constraint values carried by an [`ExtendedCurrency`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrencyConstraints {
    pub default_balance: Decimal,
    pub supports_negatives: bool,
    pub maximum_balance: Option<Decimal>,
}

impl Default for CurrencyConstraints {
    fn default() -> Self {
        Self {
            default_balance: Decimal::ZERO,
            supports_negatives: true,
            maximum_balance: None,
        }
    }
}

impl CurrencyConstraints {
    pub fn with_default_balance(mut self, default_balance: Decimal) -> Self {
        self.default_balance = default_balance;
        self
    }

    pub fn no_negatives(mut self) -> Self {
        self.supports_negatives = false;
        self
    }

    pub fn with_maximum_balance(mut self, maximum: Decimal) -> Self {
        self.maximum_balance = Some(maximum);
        self
    }
}

/// A currency exposing the [`ConstrainedCurrency`] capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedCurrency {
    id: CurrencyId,
    constraints: CurrencyConstraints,
}

impl ExtendedCurrency {
    pub fn new(id: impl Into<CurrencyId>, constraints: CurrencyConstraints) -> Self {
        Self {
            id: id.into(),
            constraints,
        }
    }
}

impl Currency for ExtendedCurrency {
    fn id(&self) -> &CurrencyId {
        &self.id
    }

    fn constraints(&self) -> Option<&dyn ConstrainedCurrency> {
        Some(self)
    }
}

impl ConstrainedCurrency for ExtendedCurrency {
    fn default_balance(&self) -> Decimal {
        self.constraints.default_balance
    }

    fn supports_negatives(&self) -> bool {
        self.constraints.supports_negatives
    }

    fn maximum_account_balance(&self) -> Option<Decimal> {
        self.constraints.maximum_balance
    }
}

/// Known currencies, indexed by id.
///
/// Balance tables only store [`CurrencyId`]s; the registry turns them back into
/// currencies when the engine needs constraints for an id it did not receive
/// from the caller (e.g. when resetting every balance of an account). Accounts
/// [`remember`](Self::remember) every currency they commit, so this works for
/// currencies that were never registered.
#[derive(Debug, Default)]
pub struct CurrencyRegistry {
    currencies: DashMap<CurrencyId, Arc<dyn Currency>>,
}

impl CurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a currency, replacing any previous one with the same id.
    pub fn register(&self, currency: Arc<dyn Currency>) {
        self.currencies.insert(currency.id().clone(), currency);
    }

    /// Registers a copy of `currency` unless its id is already known.
    ///
    /// The copy keeps the id and the constraint values, which is all the
    /// ledger reads from a currency.
    pub fn remember(&self, currency: &dyn Currency) {
        if self.currencies.contains_key(currency.id()) {
            return;
        }
        self.currencies
            .entry(currency.id().clone())
            .or_insert_with(|| detached_copy(currency));
    }

    pub fn get(&self, id: &CurrencyId) -> Option<Arc<dyn Currency>> {
        self.currencies.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`get`](Self::get), falling back to an unconstrained currency.
    pub fn resolve(&self, id: &CurrencyId) -> Arc<dyn Currency> {
        self.get(id)
            .unwrap_or_else(|| Arc::new(PlainCurrency::new(id.clone())))
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}

fn detached_copy(currency: &dyn Currency) -> Arc<dyn Currency> {
    let id = currency.id().clone();
    match currency.constraints() {
        Some(constraints) => Arc::new(ExtendedCurrency::new(
            id,
            CurrencyConstraints {
                default_balance: constraints.default_balance(),
                supports_negatives: constraints.supports_negatives(),
                maximum_balance: constraints.maximum_account_balance(),
            },
        )),
        None => Arc::new(PlainCurrency::new(id)),
    }
}
