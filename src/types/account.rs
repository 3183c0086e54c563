//! Account-related types for the RFID balance ledger
//!
//! An [`Account`] ties a physical RFID card to a balance. Accounts are
//! created by an administrative action and deactivated rather than deleted,
//! so the transaction log always has a valid account to point at.

use super::transaction::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A balance-carrying account mapped one-to-one to an RFID card
///
/// The balance is non-negative at all times and is mutated exclusively by
/// the ledger; every other component treats it as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account id
    pub id: AccountId,

    /// Case-sensitive opaque RFID card identifier, unique across accounts
    pub card_id: String,

    /// Display name
    pub name: String,

    /// Optional contact email
    pub email: Option<String>,

    /// Optional contact phone
    pub phone: Option<String>,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Whether the account may receive new transactions
    ///
    /// Inactive accounts stay readable; both the admin and the automation
    /// paths reject mutations against them.
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// RFID card identifier; must not already be registered
    pub card_id: String,

    /// Display name
    pub name: String,

    pub email: Option<String>,

    pub phone: Option<String>,

    /// Opening balance, must be zero or positive
    #[serde(default)]
    pub opening_balance: Decimal,
}

/// Editable profile fields of an account
///
/// The card id and the balance are deliberately absent: the card binding is
/// fixed at creation and the balance only moves through the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}
