//! The balance ledger
//!
//! [`BalanceLedger::apply`] is the single place balances change. It
//! validates a requested mutation, serializes it against other mutations of
//! the same account, and commits one transaction record plus the updated
//! balance as an all-or-nothing unit.
//!
//! # Concurrency
//!
//! Writes are serialized per account through a lock registry keyed by
//! account id: two concurrent taps on one card are applied one after the
//! other and chain their before/after balances, while mutations of
//! different accounts proceed fully in parallel. Lock acquisition is a
//! bounded try-lock loop; when an account is contended past the configured
//! wait, `apply` fails with a retryable busy error instead of blocking
//! indefinitely.
//!
//! # Atomicity
//!
//! Under the account lock, the transaction is appended to the log first
//! (the only fallible step) and the balance is written second. A log
//! failure therefore leaves the balance exactly as it was, and a caller
//! that gave up waiting never observes a half-applied mutation.

use crate::core::directory::UserDirectory;
use crate::core::transaction_store::TransactionStore;
use crate::types::{AccountId, LedgerError, Source, Transaction, TransactionKind};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Polling interval of the bounded try-lock loop
const LOCK_RETRY_INTERVAL: Duration = Duration::from_micros(250);

/// Validates and atomically applies balance mutations
#[derive(Debug)]
pub struct BalanceLedger {
    directory: Arc<UserDirectory>,
    store: Arc<TransactionStore>,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    lock_wait: Duration,
}

impl BalanceLedger {
    /// Create a ledger over the given directory and transaction log
    ///
    /// `lock_wait` bounds how long one `apply` call may wait for a
    /// contended account before failing with [`LedgerError::Busy`].
    pub fn new(
        directory: Arc<UserDirectory>,
        store: Arc<TransactionStore>,
        lock_wait: Duration,
    ) -> Self {
        BalanceLedger {
            directory,
            store,
            locks: DashMap::new(),
            lock_wait,
        }
    }

    /// Apply one balance mutation and return the committed transaction
    ///
    /// The returned transaction carries the assigned id, sequence number,
    /// timestamp and the before/after balances, so callers can display the
    /// result without a second read.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - the amount is not strictly positive
    /// * `NotFound` - no account with this id exists
    /// * `InactiveAccount` - the account is deactivated
    /// * `InsufficientBalance` - a debit exceeds the current balance
    /// * `Busy` - the account stayed contended past the configured wait
    /// * `Storage` - the atomic commit failed; no state was changed
    pub fn apply(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        source: Source,
        description: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                amount,
                "amount must be strictly positive",
            ));
        }

        let lock = self.lock_handle(account_id);
        let _guard = self.acquire(&lock, account_id)?;

        // Everything below runs under the account's write lock: the balance
        // read, the log append and the balance write form one serialized,
        // all-or-nothing unit.
        let account = self.directory.get(account_id)?;
        if !account.is_active {
            warn!(account = %account_id, "mutation rejected: account inactive");
            return Err(LedgerError::InactiveAccount {
                account: account_id,
            });
        }

        let balance_before = account.balance;
        let balance_after = if kind.is_additive() {
            balance_before
                .checked_add(amount)
                .ok_or_else(|| LedgerError::storage("balance overflow"))?
        } else {
            if balance_before < amount {
                warn!(
                    account = %account_id,
                    %balance_before,
                    requested = %amount,
                    "debit rejected: insufficient balance"
                );
                return Err(LedgerError::InsufficientBalance {
                    account: account_id,
                    balance: balance_before,
                    requested: amount,
                });
            }
            balance_before - amount
        };

        let committed = self.store.append(Transaction {
            id: Uuid::new_v4(),
            seq: 0, // assigned by the log
            account_id,
            kind,
            amount,
            balance_before,
            balance_after,
            source,
            description,
            created_at: Utc::now(),
        })?;

        // Accounts are never removed, so this cannot miss after the get
        // above; a failure here would mean the directory itself is gone.
        self.directory.write_balance(account_id, balance_after)?;

        info!(
            account = %account_id,
            transaction = %committed.id,
            ?kind,
            %amount,
            %balance_after,
            "transaction committed"
        );
        Ok(committed)
    }

    fn lock_handle(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn acquire<'a>(
        &self,
        lock: &'a Mutex<()>,
        account_id: AccountId,
    ) -> Result<std::sync::MutexGuard<'a, ()>, LedgerError> {
        let deadline = Instant::now() + self.lock_wait;
        loop {
            match lock.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        warn!(account = %account_id, "apply gave up: account contended");
                        return Err(LedgerError::Busy {
                            account: account_id,
                            waited_ms: self.lock_wait.as_millis() as u64,
                        });
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(TryLockError::Poisoned(_)) => {
                    return Err(LedgerError::storage("account lock poisoned"));
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn test_lock(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.lock_handle(account_id)
    }
}
