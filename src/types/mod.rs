//! Core data types shared across the ledger
//!
//! - [`account`] - Account state and creation/update inputs
//! - [`transaction`] - Committed transactions, kinds and sources
//! - [`error`] - The crate-wide error enum

pub mod account;
pub mod error;
pub mod transaction;

pub use account::{Account, NewAccount, ProfileUpdate};
pub use error::LedgerError;
pub use transaction::{
    AccountId, AdminId, Source, SourceKind, Transaction, TransactionId, TransactionKind,
};

use serde::{Deserialize, Serialize};

/// Pagination window for list queries
///
/// `limit` is clamped by the configured maximum page size at the query
/// site; a zero limit falls back to the configured default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    /// Number of items to skip, newest-first
    pub offset: usize,

    /// Maximum number of items to return
    pub limit: usize,
}

impl Page {
    /// First page with the given limit
    pub fn first(limit: usize) -> Self {
        Page { offset: 0, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            offset: 0,
            limit: 50,
        }
    }
}
