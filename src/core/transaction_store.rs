//! Append-only transaction log
//!
//! The log is the audit trail: committed transactions go in, nothing ever
//! comes back out or changes. There is deliberately no update or delete
//! API. Appending is reserved for the ledger (`pub(crate)`), which calls it
//! inside its atomic commit.
//!
//! Queries run under the log's read lock, so a page is computed against a
//! consistent snapshot: it never shows a transaction committed after the
//! query began and never omits one committed before it.

use crate::types::{
    AccountId, LedgerError, Page, SourceKind, Transaction, TransactionId, TransactionKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Filters for the transaction list surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub source: Option<SourceKind>,
    pub account_id: Option<AccountId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    fn matches(&self, tx: &Transaction) -> bool {
        self.kind.map_or(true, |kind| tx.kind == kind)
            && self.source.map_or(true, |source| tx.source.kind() == source)
            && self
                .account_id
                .map_or(true, |account| tx.account_id == account)
            && self.from.map_or(true, |from| tx.created_at >= from)
            && self.to.map_or(true, |to| tx.created_at <= to)
    }
}

/// One page of transactions plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total: usize,
}

/// Append-only, queryable log of committed transactions
#[derive(Debug, Default)]
pub struct TransactionStore {
    log: RwLock<Vec<Transaction>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a transaction to the log, assigning its sequence number
    ///
    /// Called only by the ledger, while it holds the account's write lock.
    /// A poisoned log lock surfaces as a retryable storage error; the
    /// caller treats that as "nothing was committed".
    pub(crate) fn append(&self, mut tx: Transaction) -> Result<Transaction, LedgerError> {
        let mut log = self
            .log
            .write()
            .map_err(|_| LedgerError::storage("transaction log lock poisoned"))?;
        tx.seq = log.len() as u64;
        log.push(tx.clone());
        Ok(tx)
    }

    /// Query committed transactions, newest first
    pub fn query(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<TransactionPage, LedgerError> {
        let log = self
            .log
            .read()
            .map_err(|_| LedgerError::storage("transaction log lock poisoned"))?;

        let total = log.iter().filter(|tx| filter.matches(tx)).count();
        let transactions = log
            .iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        Ok(TransactionPage {
            transactions,
            total,
        })
    }

    /// Fetch one committed transaction by id
    pub fn get(&self, transaction_id: TransactionId) -> Result<Transaction, LedgerError> {
        let log = self
            .log
            .read()
            .map_err(|_| LedgerError::storage("transaction log lock poisoned"))?;
        log.iter()
            .find(|tx| tx.id == transaction_id)
            .cloned()
            .ok_or_else(|| LedgerError::transaction_not_found(transaction_id))
    }

    /// The most recent transactions of one account, newest first
    pub fn account_history(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let log = self
            .log
            .read()
            .map_err(|_| LedgerError::storage("transaction log lock poisoned"))?;
        Ok(log
            .iter()
            .rev()
            .filter(|tx| tx.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Number of committed transactions
    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
