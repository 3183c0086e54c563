//! Request-facing service surface
//!
//! [`Ledger`] wires the directory, log, balance engine, and automation
//! gateway together from one [`LedgerConfig`] and exposes them as typed
//! methods. Every call that mutates state takes a [`RequestContext`]
//! identifying who is asking; there is no ambient session state, so the
//! admin identity that ends up on a transaction is exactly the one the
//! caller passed in.

use crate::automation::AutomationGateway;
use crate::config::LedgerConfig;
use crate::core::{
    AccountPage, AccountQuery, BalanceLedger, TransactionFilter, TransactionPage, TransactionStore,
    UserDirectory,
};
use crate::types::{
    Account, AccountId, AdminId, LedgerError, NewAccount, Page, ProfileUpdate, Source, Transaction,
    TransactionId, TransactionKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Who is making a request
///
/// Carried per call rather than held in shared state, so concurrent
/// requests by different admins cannot bleed into each other's
/// attributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "context", content = "admin_id")]
pub enum RequestContext {
    /// An authenticated administrator
    Admin { admin_id: AdminId },

    /// The RFID intake path
    Automation,

    /// No established identity
    Anonymous,
}

impl RequestContext {
    /// The admin identity, or `Unauthorized` naming the refused operation
    pub fn require_admin(&self, operation: &str) -> Result<AdminId, LedgerError> {
        match self {
            RequestContext::Admin { admin_id } => Ok(*admin_id),
            _ => Err(LedgerError::Unauthorized {
                operation: operation.to_string(),
            }),
        }
    }
}

/// Admin request to post a transaction against an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// An account together with its recent activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceStatement {
    pub account: Account,
    pub balance: Decimal,
    pub recent: Vec<Transaction>,
}

/// The assembled ledger service
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    directory: Arc<UserDirectory>,
    store: Arc<TransactionStore>,
    ledger: Arc<BalanceLedger>,
    gateway: AutomationGateway,
}

impl Ledger {
    /// Assemble all components from one configuration
    pub fn new(config: LedgerConfig) -> Self {
        let directory = Arc::new(UserDirectory::new());
        let store = Arc::new(TransactionStore::new());
        let ledger = Arc::new(BalanceLedger::new(
            Arc::clone(&directory),
            Arc::clone(&store),
            config.lock_wait,
        ));
        let gateway = AutomationGateway::new(
            Arc::clone(&directory),
            Arc::clone(&ledger),
            Arc::clone(&store),
            config.scan_policy.clone(),
            config.dedup_window,
        );
        Ledger {
            config,
            directory,
            store,
            ledger,
            gateway,
        }
    }

    /// The RFID-facing surface
    pub fn gateway(&self) -> &AutomationGateway {
        &self.gateway
    }

    /// Register a new account (admin only)
    pub fn create_account(
        &self,
        ctx: &RequestContext,
        new: NewAccount,
    ) -> Result<Account, LedgerError> {
        let admin_id = ctx.require_admin("create_account")?;
        let account = self.directory.create(new)?;
        info!(account = %account.id, admin = %admin_id, "account created");
        Ok(account)
    }

    /// Search accounts, newest first
    pub fn list_accounts(
        &self,
        query: &AccountQuery,
        page: Page,
    ) -> Result<AccountPage, LedgerError> {
        Ok(self.directory.search(query, self.clamp(page)))
    }

    /// An account, its balance, and its most recent transactions
    pub fn balance_statement(&self, account_id: AccountId) -> Result<BalanceStatement, LedgerError> {
        let account = self.directory.get(account_id)?;
        let recent = self
            .store
            .account_history(account_id, self.config.default_page_size)?;
        let balance = account.balance;
        Ok(BalanceStatement {
            account,
            balance,
            recent,
        })
    }

    /// Post a credit, debit, or refund against an account (admin only)
    ///
    /// The committed transaction is attributed to the requesting admin.
    pub fn create_transaction(
        &self,
        ctx: &RequestContext,
        request: CreateTransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        let admin_id = ctx.require_admin("create_transaction")?;
        self.ledger.apply(
            request.account_id,
            request.kind,
            request.amount,
            Source::Admin(admin_id),
            request.description,
        )
    }

    /// Fetch the exact transaction a receipt or statement names
    pub fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.store.get(transaction_id)
    }

    /// Query the transaction log, newest first
    pub fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<TransactionPage, LedgerError> {
        self.store.query(filter, self.clamp(page))
    }

    /// Edit an account's contact fields (admin only)
    ///
    /// Card and balance are not editable here: the card binding is fixed at
    /// registration and balances change only through transactions.
    pub fn update_profile(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, LedgerError> {
        ctx.require_admin("update_profile")?;
        self.directory.update_profile(account_id, update)
    }

    /// Activate or deactivate an account (admin only)
    pub fn set_account_active(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        active: bool,
    ) -> Result<Account, LedgerError> {
        ctx.require_admin("set_account_active")?;
        self.directory.set_active(account_id, active)
    }

    fn clamp(&self, page: Page) -> Page {
        Page {
            offset: page.offset,
            limit: self.config.clamp_limit(page.limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn admin() -> RequestContext {
        RequestContext::Admin {
            admin_id: Uuid::new_v4(),
        }
    }

    fn new_account(card: &str, balance: i64) -> NewAccount {
        NewAccount {
            card_id: card.to_string(),
            name: "holder".to_string(),
            email: None,
            phone: None,
            opening_balance: Decimal::new(balance, 2),
        }
    }

    #[test]
    fn mutations_require_an_admin_context() {
        let service = Ledger::new(LedgerConfig::default());
        let account = service
            .create_account(&admin(), new_account("CARD-1", 0))
            .unwrap();

        for ctx in [RequestContext::Anonymous, RequestContext::Automation] {
            assert!(matches!(
                service.create_account(&ctx, new_account("CARD-2", 0)),
                Err(LedgerError::Unauthorized { .. })
            ));
            assert!(matches!(
                service.set_account_active(&ctx, account.id, false),
                Err(LedgerError::Unauthorized { .. })
            ));
            let result = service.create_transaction(
                &ctx,
                CreateTransactionRequest {
                    account_id: account.id,
                    kind: TransactionKind::Credit,
                    amount: Decimal::new(100, 2),
                    description: None,
                },
            );
            assert_eq!(
                result.unwrap_err(),
                LedgerError::Unauthorized {
                    operation: "create_transaction".to_string()
                }
            );
        }
    }

    #[test]
    fn admin_transactions_are_attributed_to_the_caller() {
        let service = Ledger::new(LedgerConfig::default());
        let admin_id = Uuid::new_v4();
        let ctx = RequestContext::Admin { admin_id };
        let account = service
            .create_account(&ctx, new_account("CARD-1", 0))
            .unwrap();

        let tx = service
            .create_transaction(
                &ctx,
                CreateTransactionRequest {
                    account_id: account.id,
                    kind: TransactionKind::Credit,
                    amount: Decimal::new(2500, 2),
                    description: Some("top-up".to_string()),
                },
            )
            .unwrap();

        assert_eq!(tx.source, Source::Admin(admin_id));
        assert_eq!(tx.balance_after, Decimal::new(2500, 2));
    }

    #[test]
    fn committed_transactions_are_fetchable_by_id() {
        let service = Ledger::new(LedgerConfig::default());
        let ctx = admin();
        let account = service
            .create_account(&ctx, new_account("CARD-1", 10000))
            .unwrap();

        let committed = service
            .create_transaction(
                &ctx,
                CreateTransactionRequest {
                    account_id: account.id,
                    kind: TransactionKind::Debit,
                    amount: Decimal::new(750, 2),
                    description: Some("kiosk purchase".to_string()),
                },
            )
            .unwrap();

        let fetched = service.get_transaction(committed.id).unwrap();
        assert_eq!(fetched, committed);

        assert!(matches!(
            service.get_transaction(Uuid::new_v4()),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn balance_statement_includes_recent_activity() {
        let service = Ledger::new(LedgerConfig::default());
        let ctx = admin();
        let account = service
            .create_account(&ctx, new_account("CARD-1", 10000))
            .unwrap();

        for amount in [100, 200, 300] {
            service
                .create_transaction(
                    &ctx,
                    CreateTransactionRequest {
                        account_id: account.id,
                        kind: TransactionKind::Debit,
                        amount: Decimal::new(amount, 2),
                        description: None,
                    },
                )
                .unwrap();
        }

        let statement = service.balance_statement(account.id).unwrap();
        assert_eq!(statement.balance, Decimal::new(9400, 2));
        assert_eq!(statement.recent.len(), 3);
        // Newest first.
        assert_eq!(statement.recent[0].amount, Decimal::new(300, 2));
    }

    #[test]
    fn listing_clamps_the_requested_page_size() {
        let service = Ledger::new(LedgerConfig::default());
        let ctx = admin();
        for i in 0..5 {
            service
                .create_account(&ctx, new_account(&format!("CARD-{i}"), 0))
                .unwrap();
        }

        // A zero limit falls back to the default page size.
        let page = service
            .list_accounts(&AccountQuery::default(), Page { offset: 0, limit: 0 })
            .unwrap();
        assert_eq!(page.accounts.len(), 5);
        assert_eq!(page.total, 5);

        let page = service
            .list_accounts(&AccountQuery::default(), Page { offset: 0, limit: 2 })
            .unwrap();
        assert_eq!(page.accounts.len(), 2);
        assert_eq!(page.total, 5);
    }

    #[test]
    fn profile_updates_leave_card_and_balance_alone() {
        let service = Ledger::new(LedgerConfig::default());
        let ctx = admin();
        let account = service
            .create_account(&ctx, new_account("CARD-1", 5000))
            .unwrap();

        let updated = service
            .update_profile(
                &ctx,
                account.id,
                ProfileUpdate {
                    name: Some("renamed".to_string()),
                    email: Some("holder@example.com".to_string()),
                    phone: None,
                },
            )
            .unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.card_id, "CARD-1");
        assert_eq!(updated.balance, Decimal::new(5000, 2));
    }
}
