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

//! Transaction notification.
//!
//! Every mutation attempt is offered to a [`TransactionNotifier`] before it is
//! committed; the notifier may veto it. [`EventBus`] is the in-process
//! notifier: registered [`TransactionListener`]s see each attempt in
//! registration order and any of them can cancel it.
//!
//! # Example
//!
//! ```
//! use currency_ledger::{EventBus, TransactionEvent};
//!
//! let bus = EventBus::new();
//! bus.register(|event: &mut TransactionEvent| {
//!     if event.cause().as_str() == "blocked-plugin" {
//!         event.set_canceled(true);
//!     }
//! });
//! assert_eq!(bus.listener_count(), 1);
//! ```

use crate::transaction::TransactionOutcome;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why a mutation happened. Opaque to the ledger and handed to the notifier
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Cause(String);

impl Cause {
    pub fn new(cause: impl Into<String>) -> Self {
        Self(cause.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cause {
    fn from(cause: &str) -> Self {
        Self(cause.to_owned())
    }
}

/// Approves or vetoes provisional outcomes.
pub trait TransactionNotifier: Send + Sync {
    /// Called exactly once per attempt, before any commit.
    ///
    /// Returns `true` if the attempt was canceled.
    fn notify(&self, cause: &Cause, outcome: &TransactionOutcome) -> bool;
}

/// A provisional outcome as seen by listeners.
#[derive(Debug, Clone)]
pub struct TransactionEvent {
    cause: Cause,
    outcome: TransactionOutcome,
    canceled: bool,
}

impl TransactionEvent {
    pub fn new(cause: Cause, outcome: TransactionOutcome) -> Self {
        Self {
            cause,
            outcome,
            canceled: false,
        }
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    pub fn outcome(&self) -> &TransactionOutcome {
        &self.outcome
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn set_canceled(&mut self, canceled: bool) {
        self.canceled = canceled;
    }
}

/// Receives transaction events from an [`EventBus`].
pub trait TransactionListener: Send + Sync {
    fn on_transaction(&self, event: &mut TransactionEvent);
}

impl<F> TransactionListener for F
where
    F: Fn(&mut TransactionEvent) + Send + Sync,
{
    fn on_transaction(&self, event: &mut TransactionEvent) {
        self(event)
    }
}

/// In-process notifier fanning events out to listeners.
///
/// Listeners run synchronously on the mutating thread while the affected
/// accounts are locked. They may read those accounts' balances.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn TransactionListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<L>(&self, listener: L)
    where
        L: TransactionListener + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Posts an event to every listener; returns whether it ended up canceled.
    ///
    /// Later listeners see (and may revert) the cancellation state left by
    /// earlier ones.
    pub fn post(&self, event: &mut TransactionEvent) -> bool {
        // Snapshot so listeners can register further listeners without deadlocking.
        let listeners: Vec<Arc<dyn TransactionListener>> = self.listeners.read().clone();
        for listener in listeners {
            listener.on_transaction(event);
        }
        event.is_canceled()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl TransactionNotifier for EventBus {
    fn notify(&self, cause: &Cause, outcome: &TransactionOutcome) -> bool {
        let mut event = TransactionEvent::new(cause.clone(), outcome.clone());
        self.post(&mut event)
    }
}
