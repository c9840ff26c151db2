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

//! Transaction records and outcomes.
//!
//! A [`TransactionRecord`] is built once per mutation attempt and every
//! [`TransactionOutcome`] for that attempt (provisional, vetoed, committed) is
//! derived from it. Outcomes are values: business failures are reported through
//! [`ResultType`], never through `Err`.

use crate::base::{AccountId, ContextSet};
use crate::currency::CurrencyId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    /// `Withdraw` when the balance goes down, `Deposit` otherwise (ties included).
    pub fn between(from: Decimal, to: Decimal) -> Self {
        if from > to {
            Self::Withdraw
        } else {
            Self::Deposit
        }
    }
}

/// Result code of a mutation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Success,
    /// Generic failure, including a veto from the notifier.
    Failed,
    /// A no-negatives currency would go below zero.
    AccountNoFunds,
    /// A balance would exceed the currency maximum.
    AccountNoSpace,
    /// Reserved; no pipeline produces it today.
    ContextMismatch,
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::AccountNoFunds => "account_no_funds",
            Self::AccountNoSpace => "account_no_space",
            Self::ContextMismatch => "context_mismatch",
        };
        f.write_str(name)
    }
}

/// Parameters of one mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub account: AccountId,
    pub currency: CurrencyId,
    /// Signed delta applied to `account`, not the resulting balance.
    pub amount: Decimal,
    pub contexts: ContextSet,
    pub kind: TransactionKind,
}

impl TransactionRecord {
    pub fn new(
        account: AccountId,
        currency: CurrencyId,
        amount: Decimal,
        contexts: ContextSet,
        kind: TransactionKind,
    ) -> Self {
        Self {
            account,
            currency,
            amount,
            contexts,
            kind,
        }
    }
}

/// Whether an outcome belongs to a single-account mutation or a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutcomeKind {
    Transaction,
    Transfer { destination: AccountId },
}

/// Immutable result of a mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    record: TransactionRecord,
    result: ResultType,
    kind: OutcomeKind,
}

impl TransactionOutcome {
    pub fn new(record: TransactionRecord, result: ResultType) -> Self {
        Self {
            record,
            result,
            kind: OutcomeKind::Transaction,
        }
    }

    pub fn success(record: TransactionRecord) -> Self {
        Self::new(record, ResultType::Success)
    }

    pub fn failed(record: TransactionRecord) -> Self {
        Self::new(record, ResultType::Failed)
    }

    pub fn no_funds(record: TransactionRecord) -> Self {
        Self::new(record, ResultType::AccountNoFunds)
    }

    pub fn no_space(record: TransactionRecord) -> Self {
        Self::new(record, ResultType::AccountNoSpace)
    }

    pub fn context_mismatch(record: TransactionRecord) -> Self {
        Self::new(record, ResultType::ContextMismatch)
    }

    /// Tags this outcome as a transfer to `destination`.
    pub fn into_transfer(self, destination: AccountId) -> Self {
        Self {
            kind: OutcomeKind::Transfer { destination },
            ..self
        }
    }

    /// Same record, different result code.
    pub fn with_result(&self, result: ResultType) -> Self {
        Self {
            record: self.record.clone(),
            result,
            kind: self.kind.clone(),
        }
    }

    pub fn result(&self) -> ResultType {
        self.result
    }

    pub fn is_success(&self) -> bool {
        self.result == ResultType::Success
    }

    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    pub fn account(&self) -> &AccountId {
        &self.record.account
    }

    pub fn currency(&self) -> &CurrencyId {
        &self.record.currency
    }

    pub fn amount(&self) -> Decimal {
        self.record.amount
    }

    pub fn contexts(&self) -> &ContextSet {
        &self.record.contexts
    }

    pub fn transaction_kind(&self) -> TransactionKind {
        self.record.kind
    }

    pub fn outcome_kind(&self) -> &OutcomeKind {
        &self.kind
    }

    /// Destination account, for transfer outcomes only.
    pub fn destination(&self) -> Option<&AccountId> {
        match &self.kind {
            OutcomeKind::Transaction => None,
            OutcomeKind::Transfer { destination } => Some(destination),
        }
    }
}
