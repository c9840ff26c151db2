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

//! Currency constraint policy.

use crate::currency::Currency;
use crate::transaction::ResultType;
use rust_decimal::Decimal;

/// Checks candidate post-balances against the constraints of `currency`.
///
/// All balances are checked for negatives before any is checked against the
/// maximum, so a transfer that both overdraws one side and overflows the other
/// reports [`ResultType::AccountNoFunds`]. Unconstrained currencies always pass.
pub fn check(currency: &dyn Currency, balances: &[Decimal]) -> ResultType {
    let Some(constraints) = currency.constraints() else {
        return ResultType::Success;
    };

    if !constraints.supports_negatives() && balances.iter().any(|b| *b < Decimal::ZERO) {
        return ResultType::AccountNoFunds;
    }

    let maximum = constraints.maximum_account_balance();
    if maximum.is_some_and(|max| balances.iter().any(|b| *b > max)) {
        return ResultType::AccountNoSpace;
    }

    ResultType::Success
}
