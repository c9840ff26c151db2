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

//! Sparse per-account balance storage.
//!
//! Keyed by `(currency, context set)`. A missing entry means "no stored
//! balance", which is not the same thing as a stored zero.
//!
//! On disk the table is a nested structure, currency first:
//!
//! ```json
//! {
//!   "usd": [
//!     { "contexts": [], "amount": "10.50" },
//!     { "contexts": [{ "key": "world", "value": "nether" }], "amount": "-3" }
//!   ]
//! }
//! ```

use crate::base::ContextSet;
use crate::currency::CurrencyId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One stored amount inside a currency row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
struct BalanceEntry {
    contexts: ContextSet,
    amount: Decimal,
}

/// Serialized form: rows sorted by currency, entries sorted by context set.
type TableSnapshot = BTreeMap<CurrencyId, Vec<BalanceEntry>>;

/// Balances of a single account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "TableSnapshot", into = "TableSnapshot")]
pub struct BalanceTable {
    rows: HashMap<CurrencyId, HashMap<ContextSet, Decimal>>,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored amount, or `None` when nothing is stored for this pair.
    pub fn get(&self, currency: &CurrencyId, contexts: &ContextSet) -> Option<Decimal> {
        self.rows
            .get(currency)
            .and_then(|row| row.get(contexts))
            .copied()
    }

    pub fn contains(&self, currency: &CurrencyId, contexts: &ContextSet) -> bool {
        self.get(currency, contexts).is_some()
    }

    /// Stores `amount`, returning the previous value if any.
    pub fn put(
        &mut self,
        currency: CurrencyId,
        contexts: ContextSet,
        amount: Decimal,
    ) -> Option<Decimal> {
        self.rows.entry(currency).or_default().insert(contexts, amount)
    }

    /// Currencies that have at least one stored entry, sorted by id.
    pub fn currencies(&self) -> Vec<CurrencyId> {
        let mut currencies: Vec<CurrencyId> = self
            .rows
            .iter()
            .filter(|(_, row)| !row.is_empty())
            .map(|(currency, _)| currency.clone())
            .collect();
        currencies.sort();
        currencies
    }

    /// Every `currency -> amount` stored for exactly `contexts`.
    pub fn balances(&self, contexts: &ContextSet) -> HashMap<CurrencyId, Decimal> {
        self.rows
            .iter()
            .filter_map(|(currency, row)| {
                row.get(contexts).map(|amount| (currency.clone(), *amount))
            })
            .collect()
    }

    /// Every stored `(currency, contexts, amount)`, sorted by currency then contexts.
    pub fn entries(&self) -> Vec<(CurrencyId, ContextSet, Decimal)> {
        let mut entries: Vec<(CurrencyId, ContextSet, Decimal)> = self
            .rows
            .iter()
            .flat_map(|(currency, row)| {
                row.iter()
                    .map(move |(contexts, amount)| (currency.clone(), contexts.clone(), *amount))
            })
            .collect();
        entries.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        entries
    }

    /// Total number of stored entries across all currencies.
    pub fn len(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies every entry of `other` into this table, overwriting collisions.
    pub fn merge(&mut self, other: BalanceTable) {
        for (currency, row) in other.rows {
            self.rows.entry(currency).or_default().extend(row);
        }
    }
}

impl From<TableSnapshot> for BalanceTable {
    fn from(snapshot: TableSnapshot) -> Self {
        let mut table = BalanceTable::new();
        for (currency, entries) in snapshot {
            for entry in entries {
                table.put(currency.clone(), entry.contexts, entry.amount);
            }
        }
        table
    }
}

impl From<BalanceTable> for TableSnapshot {
    fn from(table: BalanceTable) -> Self {
        table
            .rows
            .into_iter()
            .filter(|(_, row)| !row.is_empty())
            .map(|(currency, row)| {
                let mut entries: Vec<BalanceEntry> = row
                    .into_iter()
                    .map(|(contexts, amount)| BalanceEntry { contexts, amount })
                    .collect();
                entries.sort_by(|a, b| a.contexts.cmp(&b.contexts));
                (currency, entries)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Context;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyId {
        CurrencyId::from("usd")
    }

    fn nether() -> ContextSet {
        [Context::new("world", "nether")].into_iter().collect()
    }

    #[test]
    fn absent_is_distinct_from_zero() {
        let mut table = BalanceTable::new();
        assert_eq!(table.get(&usd(), &ContextSet::empty()), None);
        assert!(!table.contains(&usd(), &ContextSet::empty()));

        table.put(usd(), ContextSet::empty(), Decimal::ZERO);
        assert_eq!(table.get(&usd(), &ContextSet::empty()), Some(Decimal::ZERO));
        assert!(table.contains(&usd(), &ContextSet::empty()));
    }

    #[test]
    fn context_sets_are_separate_keys() {
        let mut table = BalanceTable::new();
        table.put(usd(), ContextSet::empty(), dec!(10));
        table.put(usd(), nether(), dec!(-3));

        assert_eq!(table.get(&usd(), &ContextSet::empty()), Some(dec!(10)));
        assert_eq!(table.get(&usd(), &nether()), Some(dec!(-3)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn put_returns_previous_value() {
        let mut table = BalanceTable::new();
        assert_eq!(table.put(usd(), ContextSet::empty(), dec!(1)), None);
        assert_eq!(table.put(usd(), ContextSet::empty(), dec!(2)), Some(dec!(1)));
    }

    #[test]
    fn currencies_are_sorted_and_deduplicated() {
        let mut table = BalanceTable::new();
        table.put(CurrencyId::from("gems"), nether(), dec!(1));
        table.put(usd(), ContextSet::empty(), dec!(1));
        table.put(usd(), nether(), dec!(1));

        assert_eq!(table.currencies(), vec![CurrencyId::from("gems"), usd()]);
    }

    #[test]
    fn balances_filters_by_exact_context_set() {
        let mut table = BalanceTable::new();
        table.put(usd(), ContextSet::empty(), dec!(10));
        table.put(CurrencyId::from("gems"), nether(), dec!(4));

        let global = table.balances(&ContextSet::empty());
        assert_eq!(global.len(), 1);
        assert_eq!(global.get(&usd()), Some(&dec!(10)));

        let in_nether = table.balances(&nether());
        assert_eq!(in_nether.get(&CurrencyId::from("gems")), Some(&dec!(4)));
    }

    #[test]
    fn serializes_as_nested_rows_with_exact_amounts() {
        let mut table = BalanceTable::new();
        table.put(usd(), ContextSet::empty(), dec!(10.50));
        table.put(usd(), nether(), dec!(-3));

        let json = serde_json::to_value(&table).unwrap();
        let row = json["usd"].as_array().unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row[0]["amount"].as_str().unwrap(), "10.50");
        assert_eq!(row[1]["amount"].as_str().unwrap(), "-3");
        assert_eq!(row[1]["contexts"][0]["value"].as_str().unwrap(), "nether");

        let parsed: BalanceTable = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn entries_are_sorted() {
        let mut table = BalanceTable::new();
        table.put(usd(), nether(), dec!(2));
        table.put(CurrencyId::from("gems"), ContextSet::empty(), dec!(3));
        table.put(usd(), ContextSet::empty(), dec!(1));

        let entries = table.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (CurrencyId::from("gems"), ContextSet::empty(), dec!(3)));
        assert_eq!(entries[1], (usd(), ContextSet::empty(), dec!(1)));
        assert_eq!(entries[2], (usd(), nether(), dec!(2)));
    }

    #[test]
    fn merge_overwrites_collisions() {
        let mut table = BalanceTable::new();
        table.put(usd(), ContextSet::empty(), dec!(1));

        let mut other = BalanceTable::new();
        other.put(usd(), ContextSet::empty(), dec!(7));
        other.put(usd(), nether(), dec!(2));

        table.merge(other);
        assert_eq!(table.get(&usd(), &ContextSet::empty()), Some(dec!(7)));
        assert_eq!(table.len(), 2);
    }
}
