//! RFID Ledger Library
//! # Overview
//!
//! This library keeps account balances for RFID-tagged card holders: an
//! in-memory directory of accounts, an append-only transaction log, an
//! atomic balance engine, and an automated intake path for physical card
//! scans.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transaction, LedgerError, etc.)
//! - [`config`] - Runtime configuration and the automation scan policy
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - Atomic balance mutation under per-account locks
//!   - [`core::directory`] - Card-to-account registry with race-safe
//!     card uniqueness
//!   - [`core::transaction_store`] - Append-only, queryable transaction log
//! - [`automation`] - RFID intake: dedup, policy evaluation, receipts
//! - [`service`] - Request-facing surface with per-request attribution
//!
//! # Transaction Kinds
//!
//! The ledger supports three transaction kinds:
//!
//! - **Credit**: Add funds to an account
//! - **Debit**: Remove funds (requires sufficient balance, never overdrafts)
//! - **Refund**: Return previously debited funds (additive, like credit)
//!
//! # Invariants
//!
//! Every committed transaction records the balance before and after its own
//! effect, and consecutive transactions of one account chain: each
//! `balance_before` equals the previous `balance_after`. Balances never go
//! negative, and replaying an account's history reconstructs its balance
//! exactly.

// Module declarations
pub mod automation;
pub mod config;
pub mod core;
pub mod service;
pub mod types;

pub use automation::{AutomationGateway, BalanceCheck, ScanEvent, ScanOutcome, ScanReceipt};
pub use config::{AutomationPolicy, LedgerConfig};
pub use core::{
    AccountPage, AccountQuery, BalanceLedger, TransactionFilter, TransactionPage, TransactionStore,
    UserDirectory,
};
pub use service::{BalanceStatement, CreateTransactionRequest, Ledger, RequestContext};
pub use types::{
    Account, AccountId, AdminId, LedgerError, NewAccount, Page, ProfileUpdate, Source, SourceKind,
    Transaction, TransactionId, TransactionKind,
};
