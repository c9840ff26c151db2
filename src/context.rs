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

//! Active-context resolution.
//!
//! Context calculators propose contexts for an account and judge whether a
//! context applies to it. The active set is every proposed context that at
//! least one calculator judges and that no judging calculator rejects.

use crate::base::{AccountId, Context, ContextSet};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A calculator's verdict on one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMatch {
    Matches,
    Rejects,
    /// The calculator does not judge this context.
    Abstains,
}

/// Source of contexts for accounts.
pub trait ContextCalculator: Send + Sync {
    /// Adds the contexts this calculator considers current for `account`.
    fn accumulate_contexts(&self, account: &AccountId, contexts: &mut BTreeSet<Context>);

    fn matches(&self, context: &Context, account: &AccountId) -> ContextMatch;
}

/// Registered context calculators.
#[derive(Default)]
pub struct ContextCalculators {
    calculators: RwLock<Vec<Arc<dyn ContextCalculator>>>,
}

impl ContextCalculators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, calculator: Arc<dyn ContextCalculator>) {
        self.calculators.write().push(calculator);
    }

    pub fn len(&self) -> usize {
        self.calculators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.read().is_empty()
    }

    /// Resolves the active context set of `account`.
    pub fn active_contexts(&self, account: &AccountId) -> ContextSet {
        let calculators = self.calculators.read();

        let mut candidates = BTreeSet::new();
        for calculator in calculators.iter() {
            calculator.accumulate_contexts(account, &mut candidates);
        }

        candidates
            .into_iter()
            .filter(|context| {
                let mut judged = false;
                for calculator in calculators.iter() {
                    match calculator.matches(context, account) {
                        ContextMatch::Matches => judged = true,
                        ContextMatch::Rejects => return false,
                        ContextMatch::Abstains => {}
                    }
                }
                judged
            })
            .collect()
    }
}

impl fmt::Debug for ContextCalculators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCalculators")
            .field("calculators", &self.len())
            .finish()
    }
}
