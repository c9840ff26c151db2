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

//! Balance persistence.
//!
//! A [`BalanceStore`] loads and saves one account's [`BalanceTable`] by account
//! id. The engine never propagates store errors: [`load_or_empty`] and
//! [`save_or_log`] log them and let the account keep working in memory.

use crate::balance_table::BalanceTable;
use crate::base::AccountId;
use crate::error::LedgerError;
use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error};

/// Key-value persistence for balance tables.
pub trait BalanceStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been stored for `account` yet.
    fn load(&self, account: &AccountId) -> Result<Option<BalanceTable>, LedgerError>;

    fn save(&self, account: &AccountId, table: &BalanceTable) -> Result<(), LedgerError>;
}

/// Loads `account`, falling back to an empty table on any error.
pub fn load_or_empty(store: &dyn BalanceStore, account: &AccountId) -> BalanceTable {
    match store.load(account) {
        Ok(Some(table)) => {
            debug!(%account, entries = table.len(), "loaded balances");
            table
        }
        Ok(None) => BalanceTable::new(),
        Err(e) => {
            error!(%account, error = %e, "couldn't load account");
            BalanceTable::new()
        }
    }
}

/// Saves `account`, logging failures instead of returning them.
///
/// Returns whether the store accepted the write.
pub fn save_or_log(store: &dyn BalanceStore, account: &AccountId, table: &BalanceTable) -> bool {
    match store.save(account, table) {
        Ok(()) => true,
        Err(e) => {
            error!(%account, error = %e, "couldn't save account");
            false
        }
    }
}

/// One JSON file per account under a data directory.
///
/// Writes go to a temporary sibling that is renamed over the target, so a
/// reader sees either the previous or the new snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    const EXTENSION: &'static str = "json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `account`'s balances.
    ///
    /// Ids made of ASCII letters, digits, `-`, `_` and non-leading `.` are used
    /// as is. Any other id is hex-encoded behind a `~` prefix, which a
    /// verbatim id can't start with. Only the empty id is rejected.
    pub fn path_for(&self, account: &AccountId) -> Result<PathBuf, LedgerError> {
        let id = account.as_str();
        if id.is_empty() {
            return Err(LedgerError::InvalidAccountId(id.to_string()));
        }
        let verbatim = !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        let stem = if verbatim {
            id.to_string()
        } else {
            format!("~{}", hex::encode(id))
        };
        Ok(self.dir.join(format!("{stem}.{}", Self::EXTENSION)))
    }
}

impl BalanceStore for JsonFileStore {
    fn load(&self, account: &AccountId) -> Result<Option<BalanceTable>, LedgerError> {
        let path = self.path_for(account)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, account: &AccountId, table: &BalanceTable) -> Result<(), LedgerError> {
        let path = self.path_for(account)?;
        fs::create_dir_all(&self.dir)?;

        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(table)?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory store. Counts saves, which makes it handy for asserting when
/// persistence happened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<AccountId, BalanceTable>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last saved snapshot for `account`.
    pub fn snapshot(&self, account: &AccountId) -> Option<BalanceTable> {
        self.tables.get(account).map(|table| table.value().clone())
    }

    /// Seeds stored state, as if saved by a previous run.
    pub fn insert(&self, account: AccountId, table: BalanceTable) {
        self.tables.insert(account, table);
    }
}

impl BalanceStore for MemoryStore {
    fn load(&self, account: &AccountId) -> Result<Option<BalanceTable>, LedgerError> {
        Ok(self.snapshot(account))
    }

    fn save(&self, account: &AccountId, table: &BalanceTable) -> Result<(), LedgerError> {
        self.tables.insert(account.clone(), table.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
