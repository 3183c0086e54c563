//! Account directory keyed by RFID card
//!
//! The directory owns the account map and the card-id uniqueness index.
//! Both are `DashMap`s, so lookups and creations from concurrent requests
//! need no external locking; uniqueness is enforced through the card
//! index's entry API, which makes the second of two concurrent creates
//! with the same card fail instead of silently overwriting the first.
//!
//! The directory never moves money: `write_balance` is crate-private and
//! called only by the ledger.

use crate::types::{Account, AccountId, LedgerError, NewAccount, Page, ProfileUpdate};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Filters for the account list/search surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountQuery {
    /// Substring match against name or card id
    pub search: Option<String>,

    /// Restrict to active or inactive accounts
    pub is_active: Option<bool>,
}

/// One page of accounts plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPage {
    pub accounts: Vec<Account>,
    pub total: usize,
}

/// Resolves cards to accounts and enforces card uniqueness
#[derive(Debug, Default)]
pub struct UserDirectory {
    accounts: DashMap<AccountId, Account>,
    by_card: DashMap<String, AccountId>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new account
    ///
    /// Fails with [`LedgerError::DuplicateCard`] if the card id is already
    /// registered, including when two creations race: the card index entry
    /// is claimed atomically, so exactly one of the racers wins.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - the opening balance is negative
    /// * `DuplicateCard` - the card id is already registered
    pub fn create(&self, new: NewAccount) -> Result<Account, LedgerError> {
        if new.opening_balance < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                new.opening_balance,
                "opening balance must not be negative",
            ));
        }

        let account = Account {
            id: Uuid::new_v4(),
            card_id: new.card_id.clone(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            balance: new.opening_balance,
            is_active: true,
            created_at: Utc::now(),
        };

        match self.by_card.entry(new.card_id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateCard {
                card_id: account.card_id,
            }),
            Entry::Vacant(slot) => {
                // The account must be resolvable the instant the card index
                // points at it, so it is inserted while the index entry is
                // still held.
                self.accounts.insert(account.id, account.clone());
                slot.insert(account.id);
                info!(account = %account.id, card = %account.card_id, "account created");
                Ok(account)
            }
        }
    }

    /// Look up an account by its RFID card identifier
    ///
    /// Card identifiers are case-sensitive opaque strings. Inactive
    /// accounts resolve normally; rejecting mutations against them is the
    /// ledger's job, not the directory's.
    pub fn resolve_by_card(&self, card_id: &str) -> Result<Account, LedgerError> {
        let account_id = self
            .by_card
            .get(card_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::card_not_found(card_id))?;
        self.get(account_id)
    }

    /// Look up an account by id
    pub fn get(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get(&account_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    /// List accounts matching the query, newest first
    pub fn search(&self, query: &AccountQuery, page: Page) -> AccountPage {
        let needle = query.search.as_deref().unwrap_or("");
        let mut matches: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| {
                let account = entry.value();
                let text_hit =
                    needle.is_empty() || account.name.contains(needle) || account.card_id.contains(needle);
                let active_hit = query
                    .is_active
                    .map(|wanted| account.is_active == wanted)
                    .unwrap_or(true);
                text_hit && active_hit
            })
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matches.len();
        let accounts = matches
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        AccountPage { accounts, total }
    }

    /// Update the editable profile fields of an account
    pub fn update_profile(
        &self,
        account_id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, LedgerError> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        let account = entry.value_mut();
        if let Some(name) = update.name {
            account.name = name;
        }
        if let Some(email) = update.email {
            account.email = Some(email);
        }
        if let Some(phone) = update.phone {
            account.phone = Some(phone);
        }
        Ok(account.clone())
    }

    /// Activate or deactivate an account
    ///
    /// Deactivation replaces deletion: the account and its transaction
    /// history stay queryable, it just stops accepting mutations.
    pub fn set_active(&self, account_id: AccountId, active: bool) -> Result<Account, LedgerError> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        let account = entry.value_mut();
        account.is_active = active;
        info!(account = %account_id, active, "account active flag changed");
        Ok(account.clone())
    }

    /// Overwrite the stored balance
    ///
    /// Crate-private on purpose: the ledger is the only component allowed
    /// to move money, and it calls this while holding the per-account
    /// write lock.
    pub(crate) fn write_balance(
        &self,
        account_id: AccountId,
        balance: Decimal,
    ) -> Result<(), LedgerError> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        entry.value_mut().balance = balance;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(card: &str, name: &str) -> NewAccount {
        NewAccount {
            card_id: card.to_string(),
            name: name.to_string(),
            email: None,
            phone: None,
            opening_balance: Decimal::ZERO,
        }
    }

    #[test]
    fn create_and_resolve_by_card() {
        let directory = UserDirectory::new();
        let created = directory.create(new_account("CARD-1", "Alice")).unwrap();

        let resolved = directory.resolve_by_card("CARD-1").unwrap();
        assert_eq!(resolved, created);
        assert!(resolved.is_active);
        assert_eq!(resolved.balance, Decimal::ZERO);
    }

    #[test]
    fn card_ids_are_case_sensitive() {
        let directory = UserDirectory::new();
        directory.create(new_account("Card-1", "Alice")).unwrap();

        assert!(matches!(
            directory.resolve_by_card("card-1"),
            Err(LedgerError::NotFound { .. })
        ));
        // Different casing is a different card, so this create succeeds.
        assert!(directory.create(new_account("card-1", "Bob")).is_ok());
    }

    #[test]
    fn duplicate_card_is_rejected() {
        let directory = UserDirectory::new();
        directory.create(new_account("CARD-1", "Alice")).unwrap();

        let result = directory.create(new_account("CARD-1", "Bob"));
        assert_eq!(
            result.unwrap_err(),
            LedgerError::DuplicateCard {
                card_id: "CARD-1".to_string()
            }
        );

        // The original registration is untouched.
        assert_eq!(directory.resolve_by_card("CARD-1").unwrap().name, "Alice");
    }

    #[test]
    fn negative_opening_balance_is_rejected() {
        let directory = UserDirectory::new();
        let mut new = new_account("CARD-1", "Alice");
        new.opening_balance = Decimal::new(-100, 2);

        assert!(matches!(
            directory.create(new),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(directory.resolve_by_card("CARD-1").is_err());
    }

    #[test]
    fn concurrent_creates_same_card_exactly_one_wins() {
        use std::sync::Arc;
        use std::thread;

        let directory = Arc::new(UserDirectory::new());
        let mut handles = vec![];

        for i in 0..10 {
            let directory = Arc::clone(&directory);
            handles.push(thread::spawn(move || {
                directory.create(NewAccount {
                    card_id: "CARD-RACE".to_string(),
                    name: format!("racer-{i}"),
                    email: None,
                    phone: None,
                    opening_balance: Decimal::ZERO,
                })
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::DuplicateCard { .. })))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, 9);

        // The winner is the account the card resolves to.
        let resolved = directory.resolve_by_card("CARD-RACE").unwrap();
        let winner = results.into_iter().find_map(|r| r.ok()).unwrap();
        assert_eq!(resolved.id, winner.id);
    }

    #[test]
    fn search_filters_on_name_card_and_active() {
        let directory = UserDirectory::new();
        directory.create(new_account("A-100", "Alice")).unwrap();
        directory.create(new_account("B-200", "Bob")).unwrap();
        let carol = directory.create(new_account("C-300", "Carol")).unwrap();
        directory.set_active(carol.id, false).unwrap();

        let all = directory.search(&AccountQuery::default(), Page::default());
        assert_eq!(all.total, 3);

        let by_name = directory.search(
            &AccountQuery {
                search: Some("Ali".to_string()),
                is_active: None,
            },
            Page::default(),
        );
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.accounts[0].name, "Alice");

        let by_card = directory.search(
            &AccountQuery {
                search: Some("B-2".to_string()),
                is_active: None,
            },
            Page::default(),
        );
        assert_eq!(by_card.total, 1);
        assert_eq!(by_card.accounts[0].card_id, "B-200");

        let inactive = directory.search(
            &AccountQuery {
                search: None,
                is_active: Some(false),
            },
            Page::default(),
        );
        assert_eq!(inactive.total, 1);
        assert_eq!(inactive.accounts[0].id, carol.id);
    }

    #[test]
    fn search_is_paginated() {
        let directory = UserDirectory::new();
        for i in 0..5 {
            directory
                .create(new_account(&format!("CARD-{i}"), &format!("user-{i}")))
                .unwrap();
        }

        let page = directory.search(&AccountQuery::default(), Page { offset: 0, limit: 2 });
        assert_eq!(page.total, 5);
        assert_eq!(page.accounts.len(), 2);

        let rest = directory.search(&AccountQuery::default(), Page { offset: 4, limit: 2 });
        assert_eq!(rest.accounts.len(), 1);
    }

    #[test]
    fn update_profile_leaves_card_and_balance_alone() {
        let directory = UserDirectory::new();
        let account = directory.create(new_account("CARD-1", "Alice")).unwrap();

        let updated = directory
            .update_profile(
                account.id,
                ProfileUpdate {
                    name: Some("Alice B".to_string()),
                    email: Some("alice@example.org".to_string()),
                    phone: None,
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Alice B");
        assert_eq!(updated.email.as_deref(), Some("alice@example.org"));
        assert_eq!(updated.card_id, "CARD-1");
        assert_eq!(updated.balance, account.balance);
    }

    #[test]
    fn write_balance_requires_existing_account() {
        let directory = UserDirectory::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            directory.write_balance(missing, Decimal::ONE),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
