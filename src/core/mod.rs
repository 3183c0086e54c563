//! Core ledger components
//!
//! - [`directory`] - Account directory and card uniqueness index
//! - [`ledger`] - The balance ledger: the only writer of balances
//! - [`transaction_store`] - Append-only, queryable transaction log

pub mod directory;
pub mod ledger;
pub mod transaction_store;

pub use directory::{AccountPage, AccountQuery, UserDirectory};
pub use ledger::BalanceLedger;
pub use transaction_store::{TransactionFilter, TransactionPage, TransactionStore};
