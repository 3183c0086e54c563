//! Transaction-related types for the RFID balance ledger
//!
//! A [`Transaction`] is the immutable record of one committed balance
//! mutation. Once appended to the log it is never updated or deleted;
//! corrections are expressed as new transactions (typically refunds).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account identifier
pub type AccountId = Uuid;

/// Transaction identifier
pub type TransactionId = Uuid;

/// Administrator identifier
pub type AdminId = Uuid;

/// The arithmetic direction of a balance mutation
///
/// Credits and refunds add to the balance, debits subtract from it.
/// A refund is kept distinct from a credit so the audit trail records
/// why funds were returned, even though the arithmetic is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Funds added to an account
    Credit,

    /// Funds removed from an account
    ///
    /// Requires the current balance to cover the amount; the ledger
    /// never lets a balance go negative.
    Debit,

    /// Funds returned to an account
    Refund,
}

impl TransactionKind {
    /// Whether this kind increases the balance
    pub fn is_additive(self) -> bool {
        matches!(self, TransactionKind::Credit | TransactionKind::Refund)
    }
}

/// What triggered a transaction
///
/// A closed set: new sources require a code change rather than accepting
/// arbitrary strings. Admin-sourced mutations carry the initiating
/// administrator, so an admin transaction without an admin id is
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "source", content = "admin_id")]
pub enum Source {
    /// Initiated by an administrator through the management surface
    Admin(AdminId),

    /// Triggered by an RFID tap on a physical reader
    Automation,

    /// Produced by a system-internal process
    System,
}

impl Source {
    /// The source classification without the admin payload, for filtering
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Admin(_) => SourceKind::Admin,
            Source::Automation => SourceKind::Automation,
            Source::System => SourceKind::System,
        }
    }

    /// The initiating administrator, if this is an admin-sourced mutation
    pub fn admin_id(&self) -> Option<AdminId> {
        match self {
            Source::Admin(id) => Some(*id),
            _ => None,
        }
    }
}

/// Source classification used in query filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Admin,
    Automation,
    System,
}

/// An immutable, committed balance mutation
///
/// `balance_before` and `balance_after` capture the account balance around
/// this mutation, so for any account the transactions chain: the
/// `balance_before` of transaction N equals the `balance_after` of
/// transaction N-1. `seq` is the global commit order assigned by the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id
    pub id: TransactionId,

    /// Global commit sequence, assigned by the transaction log
    pub seq: u64,

    /// The account this mutation applied to
    pub account_id: AccountId,

    /// Credit, debit or refund
    pub kind: TransactionKind,

    /// Strictly positive mutation amount
    pub amount: Decimal,

    /// Account balance immediately before this mutation
    pub balance_before: Decimal,

    /// Account balance immediately after this mutation
    pub balance_after: Decimal,

    /// What triggered the mutation
    pub source: Source,

    /// Free-text note supplied by the caller
    pub description: Option<String>,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::credit(TransactionKind::Credit, true)]
    #[case::debit(TransactionKind::Debit, false)]
    #[case::refund(TransactionKind::Refund, true)]
    fn kind_sign_rule(#[case] kind: TransactionKind, #[case] additive: bool) {
        assert_eq!(kind.is_additive(), additive);
    }

    #[test]
    fn source_kind_strips_admin_payload() {
        let admin = Uuid::new_v4();
        assert_eq!(Source::Admin(admin).kind(), SourceKind::Admin);
        assert_eq!(Source::Admin(admin).admin_id(), Some(admin));
        assert_eq!(Source::Automation.kind(), SourceKind::Automation);
        assert_eq!(Source::Automation.admin_id(), None);
        assert_eq!(Source::System.kind(), SourceKind::System);
    }
}
