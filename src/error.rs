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

//! Error types for the I/O boundary.
//!
//! Business-rule failures are never errors; they are reported as
//! [`ResultType`](crate::ResultType) values on outcomes. [`LedgerError`] only
//! covers loading and saving balances and reading configuration.

use thiserror::Error;

/// Persistence and configuration errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Reading or writing a file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Account id cannot be used as a storage key
    #[error("invalid account id: {0:?}")]
    InvalidAccountId(String),

    /// The background save worker is gone
    #[error("balance store unavailable")]
    StoreUnavailable,

    /// Configuration file is malformed
    #[error("invalid configuration: {0}")]
    Config(String),
}
