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

//! Ordered background persistence.
//!
//! [`BackgroundStore`] wraps another [`BalanceStore`] and moves saves onto a
//! single worker thread fed by a FIFO channel, so saves for the same account
//! reach the inner store in the order they were issued.

use crate::balance_table::BalanceTable;
use crate::base::AccountId;
use crate::error::LedgerError;
use crate::store::{BalanceStore, save_or_log};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

enum SaveRequest {
    Save {
        account: AccountId,
        table: BalanceTable,
    },
    /// Acknowledged once every earlier request has been handled.
    Flush(Sender<()>),
}

/// A [`BalanceStore`] that performs saves on a background thread.
///
/// `save` returns as soon as the snapshot is queued. Failures of the inner
/// store are logged by the worker. `load` drains the queue first, so a load
/// always observes earlier saves.
pub struct BackgroundStore {
    inner: Arc<dyn BalanceStore>,
    sender: Option<Sender<SaveRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundStore {
    pub fn new(inner: Arc<dyn BalanceStore>) -> Self {
        let (sender, receiver) = channel::unbounded();
        let worker_store = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name("ledger-save".to_string())
            .spawn(move || run_worker(worker_store.as_ref(), receiver));

        match worker {
            Ok(handle) => Self {
                inner,
                sender: Some(sender),
                worker: Some(handle),
            },
            Err(e) => {
                // Without a worker every save goes straight to the inner store.
                warn!(error = %e, "couldn't start save worker, saving synchronously");
                Self {
                    inner,
                    sender: None,
                    worker: None,
                }
            }
        }
    }

    /// Blocks until every save queued so far has reached the inner store.
    pub fn flush(&self) -> Result<(), LedgerError> {
        let Some(sender) = &self.sender else {
            return Ok(());
        };
        let (ack, done) = channel::bounded(1);
        sender
            .send(SaveRequest::Flush(ack))
            .map_err(|_| LedgerError::StoreUnavailable)?;
        done.recv().map_err(|_| LedgerError::StoreUnavailable)
    }
}

fn run_worker(store: &dyn BalanceStore, receiver: Receiver<SaveRequest>) {
    for request in receiver {
        match request {
            SaveRequest::Save { account, table } => {
                save_or_log(store, &account, &table);
            }
            SaveRequest::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("save worker stopped");
}

impl BalanceStore for BackgroundStore {
    fn load(&self, account: &AccountId) -> Result<Option<BalanceTable>, LedgerError> {
        self.flush()?;
        self.inner.load(account)
    }

    fn save(&self, account: &AccountId, table: &BalanceTable) -> Result<(), LedgerError> {
        let Some(sender) = &self.sender else {
            return self.inner.save(account, table);
        };
        sender
            .send(SaveRequest::Save {
                account: account.clone(),
                table: table.clone(),
            })
            .map_err(|_| LedgerError::StoreUnavailable)
    }
}

impl Drop for BackgroundStore {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("save worker panicked");
            }
        }
    }
}
