//! Error types for the RFID balance ledger
//!
//! All validation errors are detected before any write and never leave a
//! partial transaction behind. [`LedgerError::is_retryable`] classifies the
//! kinds a physical reader may safely resubmit: everything else is terminal
//! for that request and must be reported, not retried, to avoid duplicate
//! physical-world effects.

use crate::types::{AccountId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the balance ledger and its entry points
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error")]
pub enum LedgerError {
    /// No account matches the given id or card identifier
    #[error("no account found for {reference}")]
    NotFound {
        /// Human-readable description of the failed lookup
        reference: String,
    },

    /// The card identifier is already registered to another account
    #[error("card '{card_id}' is already registered")]
    DuplicateCard { card_id: String },

    /// Mutation attempted against a deactivated account
    #[error("account {account} is inactive")]
    InactiveAccount { account: AccountId },

    /// A debit would push the balance below zero
    #[error(
        "insufficient balance for account {account}: balance {balance}, requested {requested}"
    )]
    InsufficientBalance {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Non-positive or otherwise malformed amount
    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    /// Admin-only operation invoked without an admin context
    #[error("operation '{operation}' requires an admin context")]
    Unauthorized { operation: String },

    /// Per-account lock could not be acquired within the configured bound
    ///
    /// Retry-eligible: the account was heavily contended and no state was
    /// touched.
    #[error("account {account} is busy, gave up after {waited_ms}ms")]
    Busy { account: AccountId, waited_ms: u64 },

    /// The atomic commit failed; state is exactly as before the call
    ///
    /// Retry-eligible.
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl LedgerError {
    /// Create a `NotFound` for an account-id lookup
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::NotFound {
            reference: format!("account {account}"),
        }
    }

    /// Create a `NotFound` for a card lookup
    pub fn card_not_found(card_id: &str) -> Self {
        LedgerError::NotFound {
            reference: format!("card '{card_id}'"),
        }
    }

    /// Create a `NotFound` for a transaction-id lookup
    pub fn transaction_not_found(transaction: TransactionId) -> Self {
        LedgerError::NotFound {
            reference: format!("transaction {transaction}"),
        }
    }

    /// Create an `InvalidAmount` error
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    /// Create a `Storage` error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the exact same request
    ///
    /// True only for contention timeouts and storage failures, both of
    /// which are guaranteed to have left no trace. Validation rejections
    /// are terminal: retrying them would at best repeat the rejection and
    /// at worst double-apply a physical-world effect.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Busy { .. } | LedgerError::Storage { .. }
        )
    }
}
