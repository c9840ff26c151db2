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

//! Ledger configuration.
//!
//! Read from a JSON file; every field has a default so a missing file or an
//! empty object are both valid:
//!
//! ```json
//! {
//!   "dataDir": "accounts",
//!   "backgroundSaves": false,
//!   "currencies": [
//!     { "id": "coins" },
//!     { "id": "gems", "constraints": { "supportsNegatives": false, "maximumBalance": "1000" } }
//!   ]
//! }
//! ```

use crate::currency::{Currency, CurrencyConstraints, CurrencyId, ExtendedCurrency, PlainCurrency};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A currency as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CurrencyDefinition {
    pub id: CurrencyId,
    /// Without constraints the currency is plain (unconstrained, zero default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<CurrencyConstraints>,
}

impl CurrencyDefinition {
    pub fn to_currency(&self) -> Arc<dyn Currency> {
        match &self.constraints {
            Some(constraints) => Arc::new(ExtendedCurrency::new(self.id.clone(), constraints.clone())),
            None => Arc::new(PlainCurrency::new(self.id.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    /// Directory holding one balance file per account.
    pub data_dir: PathBuf,
    /// Save on a background worker instead of the mutating thread.
    pub background_saves: bool,
    pub currencies: Vec<CurrencyDefinition>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("accounts"),
            background_saves: false,
            currencies: Vec::new(),
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        let mut seen = std::collections::HashSet::new();
        for definition in &self.currencies {
            if definition.id.as_str().is_empty() {
                return Err(LedgerError::Config("currency id must not be empty".to_string()));
            }
            if !seen.insert(&definition.id) {
                return Err(LedgerError::Config(format!(
                    "currency {} declared twice",
                    definition.id
                )));
            }
        }
        Ok(())
    }
}
