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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use currency_ledger::{
    AccountId, Cause, Context, ContextSet, Ledger, LedgerConfig, TransactionOutcome,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Currency Ledger - Apply balance operations from a CSV file
///
/// Reads operations from a CSV file, applies them to the persisted ledger and
/// writes the resulting balances of every touched account to stdout.
#[derive(Parser, Debug)]
#[command(name = "currency-ledger")]
#[command(about = "Applies ledger operations from a CSV file", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,account,currency,amount,target,contexts
    /// Example: cargo run -- operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Ledger configuration file (JSON)
    #[arg(short, long, default_value = "ledger.json")]
    config: PathBuf,

    /// Overrides the configured account data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Cause reported to transaction listeners
    #[arg(long, default_value = "cli")]
    cause: String,
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let mut config = match LedgerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config '{}': {}", args.config.display(), e);
            process::exit(1);
        }
    };
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let (ledger, _bus) = Ledger::from_config_with_bus(&config);
    let cause = Cause::new(args.cause);
    if let Err(e) = process_operations(BufReader::new(file), &ledger, &cause) {
        eprintln!("Error processing operations: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_balances(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, account, currency, amount, target, contexts`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    account: String,
    currency: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    contexts: Option<String>,
}

/// A parsed ledger operation.
#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Deposit(Decimal),
    Withdraw(Decimal),
    Set(Decimal),
    Reset,
    ResetAll,
    Transfer { target: AccountId, amount: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
struct Request {
    account: AccountId,
    currency: String,
    contexts: ContextSet,
    operation: Operation,
}

impl CsvRecord {
    /// Converts a CSV record into a request.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_request(self) -> Option<Request> {
        let contexts = parse_contexts(self.contexts.as_deref().unwrap_or(""))?;
        let target = self.target.filter(|t| !t.is_empty());

        let operation = match self.op.to_lowercase().as_str() {
            "deposit" => Operation::Deposit(self.amount?),
            "withdraw" | "withdrawal" => Operation::Withdraw(self.amount?),
            "set" => Operation::Set(self.amount?),
            "reset" => Operation::Reset,
            "reset_all" => Operation::ResetAll,
            "transfer" => Operation::Transfer {
                target: AccountId::new(target?),
                amount: self.amount?,
            },
            _ => return None,
        };

        Some(Request {
            account: AccountId::new(self.account),
            currency: self.currency,
            contexts,
            operation,
        })
    }
}

/// Parses `key=value;key=value`. Empty input is the global scope.
fn parse_contexts(raw: &str) -> Option<ContextSet> {
    let mut contexts = BTreeSet::new();
    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once('=')?;
        contexts.insert(Context::new(key.trim(), value.trim()));
    }
    Some(contexts.into())
}

/// Applies operations from a CSV reader to `ledger`.
///
/// Rows are streamed. Malformed rows are skipped; rejected operations are
/// logged with their result code and do not stop processing.
///
/// # CSV Format
///
/// Expected columns: `op, account, currency, amount, target, contexts`
/// - `op`: deposit, withdraw, set, reset, reset_all or transfer
/// - `amount`: decimal amount (unused by reset and reset_all)
/// - `target`: destination account, transfers only
/// - `contexts`: `key=value` pairs separated by `;`, empty for global
///
/// # Example
///
/// ```csv
/// op,account,currency,amount,target,contexts
/// deposit,alex,gold,100.0,,
/// transfer,alex,gold,25,blake,world=nether
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
fn process_operations<R: Read>(reader: R, ledger: &Ledger, cause: &Cause) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                continue;
            }
        };
        let Some(request) = record.into_request() else {
            warn!("skipping invalid operation record");
            continue;
        };

        match apply(ledger, cause, &request) {
            Some(outcome) if outcome.is_success() => {
                debug!(account = %request.account, operation = ?request.operation, "applied");
            }
            Some(outcome) => {
                info!(
                    account = %request.account,
                    operation = ?request.operation,
                    result = %outcome.result(),
                    "operation rejected"
                );
            }
            None => debug!(account = %request.account, "nothing to reset"),
        }
    }

    Ok(())
}

fn apply(ledger: &Ledger, cause: &Cause, request: &Request) -> Option<TransactionOutcome> {
    let account = ledger.account(&request.account);
    let contexts = &request.contexts;
    let currency = || ledger.currencies().resolve(&request.currency.as_str().into());

    let outcome = match &request.operation {
        Operation::Deposit(amount) => {
            account.deposit(currency().as_ref(), *amount, cause, contexts)
        }
        Operation::Withdraw(amount) => {
            account.withdraw(currency().as_ref(), *amount, cause, contexts)
        }
        Operation::Set(amount) => {
            account.set_balance(currency().as_ref(), *amount, cause, contexts)
        }
        Operation::Reset => account.reset_balance(currency().as_ref(), cause, contexts),
        Operation::ResetAll => return account.reset_balances(cause, contexts),
        Operation::Transfer { target, amount } => {
            let target = ledger.account(target);
            account.transfer(target.as_ref(), currency().as_ref(), *amount, cause, contexts)
        }
    };
    Some(outcome)
}

/// One output row.
#[derive(Debug, Serialize)]
struct BalanceRow {
    account: String,
    currency: String,
    contexts: String,
    balance: Decimal,
}

/// Writes every stored balance of the open accounts as CSV.
///
/// # CSV Format
///
/// Columns: `account, currency, contexts, balance`, sorted by account, then
/// currency, then context set.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_balances<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in ledger.accounts() {
        for (currency, contexts, balance) in account.snapshot().entries() {
            wtr.serialize(BalanceRow {
                account: account.id().to_string(),
                currency: currency.to_string(),
                contexts: contexts.to_string(),
                balance,
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}
