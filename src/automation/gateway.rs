//! RFID-facing entry point
//!
//! The gateway is what the physical readers talk to: read-only balance
//! checks and tap intake. A tap flows through card read, account
//! resolution and policy evaluation into one of three terminal states
//! (a committed mutation, a balance-only report, or a rejection), and
//! the terminal state is what gets reported back to the reader.
//!
//! # Retry safety
//!
//! Every scan event carries a dedup key assigned by the hardware. A
//! repeated key within the configured recency window returns the original
//! receipt without touching the ledger. Only retry-eligible failures
//! (contention, storage) surface as `Err`; those are never cached, so the
//! reader can resubmit the same key. Terminal rejections come back inside
//! an `Ok` receipt and are cached like any other outcome.

use crate::automation::dedup::{Claim, DedupCache};
use crate::config::AutomationPolicy;
use crate::core::{BalanceLedger, TransactionFilter, TransactionPage, TransactionStore, UserDirectory};
use crate::types::{
    AccountId, LedgerError, Page, Source, SourceKind, Transaction, TransactionKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One physical presentation of a card to a reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    /// The card that was read
    pub card_id: String,

    /// Hardware-assigned key distinguishing this tap from its retries
    pub event_key: String,

    /// Optional note forwarded into the transaction description
    pub description: Option<String>,
}

/// Read-only balance report for a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub account_id: AccountId,
    pub name: String,
    pub balance: Decimal,
    pub is_active: bool,
}

/// Terminal state of one scan event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum ScanOutcome {
    /// The tap produced a committed transaction
    Mutated { transaction: Transaction },

    /// The tap was a presence check; nothing was committed
    Informational,

    /// The tap was refused for a terminal reason
    ///
    /// Reported to the operator rather than retried: re-sending a rejected
    /// tap could double a physical-world effect.
    Rejected { error: LedgerError },
}

/// What the reader gets back for a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReceipt {
    pub outcome: ScanOutcome,

    /// The resolved account, when card resolution succeeded
    pub account_id: Option<AccountId>,

    /// The balance after this scan's effect, when an account was resolved
    pub balance: Option<Decimal>,
}

impl ScanReceipt {
    /// Whether this scan committed a transaction
    pub fn mutated(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Mutated { .. })
    }
}

/// RFID intake: balance checks and tap-triggered mutations
#[derive(Debug)]
pub struct AutomationGateway {
    directory: Arc<UserDirectory>,
    ledger: Arc<BalanceLedger>,
    store: Arc<TransactionStore>,
    policy: AutomationPolicy,
    dedup: DedupCache<ScanReceipt>,
}

impl AutomationGateway {
    pub fn new(
        directory: Arc<UserDirectory>,
        ledger: Arc<BalanceLedger>,
        store: Arc<TransactionStore>,
        policy: AutomationPolicy,
        dedup_window: Duration,
    ) -> Self {
        AutomationGateway {
            directory,
            ledger,
            store,
            policy,
            dedup: DedupCache::new(dedup_window),
        }
    }

    /// Report the balance behind a card without producing a transaction
    ///
    /// Safe to call arbitrarily often; succeeds for inactive accounts and
    /// reports the active flag so the reader can show why taps would be
    /// refused.
    pub fn check_balance(&self, card_id: &str) -> Result<BalanceCheck, LedgerError> {
        let account = self.directory.resolve_by_card(card_id)?;
        debug!(account = %account.id, "balance check");
        Ok(BalanceCheck {
            account_id: account.id,
            name: account.name,
            balance: account.balance,
            is_active: account.is_active,
        })
    }

    /// Process one scan event
    ///
    /// Idempotent per event key within the dedup window: a repeat returns
    /// the original receipt, and a concurrent re-submission waits for the
    /// first one's receipt instead of being applied again. `Err` is
    /// reserved for retry-eligible failures ([`LedgerError::Busy`],
    /// [`LedgerError::Storage`]); terminal rejections are part of the
    /// receipt.
    pub fn intake(&self, scan: ScanEvent) -> Result<ScanReceipt, LedgerError> {
        loop {
            match self.dedup.claim(&scan.event_key) {
                Claim::Completed(previous) => {
                    debug!(event_key = %scan.event_key, "duplicate scan suppressed");
                    return Ok(previous);
                }
                Claim::Wait(slot) => {
                    if let Some(receipt) = slot.wait(self.dedup.window()) {
                        debug!(event_key = %scan.event_key, "concurrent duplicate scan suppressed");
                        return Ok(receipt);
                    }
                    // The holder gave up on a retry-eligible failure;
                    // contend for the key again.
                }
                Claim::Owner => {
                    return match self.evaluate(&scan) {
                        Ok(receipt) => {
                            self.dedup.complete(&scan.event_key, receipt.clone());
                            Ok(receipt)
                        }
                        // Nothing was committed; free the key so the
                        // reader's resubmission is applied, not suppressed.
                        Err(error) => {
                            self.dedup.release(&scan.event_key);
                            Err(error)
                        }
                    };
                }
            }
        }
    }

    fn evaluate(&self, scan: &ScanEvent) -> Result<ScanReceipt, LedgerError> {
        let account = match self.directory.resolve_by_card(&scan.card_id) {
            Ok(account) => account,
            Err(error) => {
                info!(card = %scan.card_id, %error, "scan rejected: unknown card");
                return Ok(ScanReceipt {
                    outcome: ScanOutcome::Rejected { error },
                    account_id: None,
                    balance: None,
                });
            }
        };

        match &self.policy {
            AutomationPolicy::PresenceCheck => Ok(ScanReceipt {
                outcome: ScanOutcome::Informational,
                account_id: Some(account.id),
                balance: Some(account.balance),
            }),
            AutomationPolicy::FixedFee(fee) => {
                match self.ledger.apply(
                    account.id,
                    TransactionKind::Debit,
                    *fee,
                    Source::Automation,
                    scan.description.clone(),
                ) {
                    Ok(transaction) => {
                        let balance = transaction.balance_after;
                        Ok(ScanReceipt {
                            outcome: ScanOutcome::Mutated { transaction },
                            account_id: Some(account.id),
                            balance: Some(balance),
                        })
                    }
                    Err(error) if error.is_retryable() => Err(error),
                    Err(error) => {
                        info!(account = %account.id, %error, "scan rejected");
                        Ok(ScanReceipt {
                            outcome: ScanOutcome::Rejected { error },
                            account_id: Some(account.id),
                            balance: Some(account.balance),
                        })
                    }
                }
            }
        }
    }

    /// Automation-sourced transactions, newest first
    ///
    /// The source filter is forced to automation regardless of what the
    /// caller put in the filter.
    pub fn history(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<TransactionPage, LedgerError> {
        let filter = TransactionFilter {
            source: Some(SourceKind::Automation),
            ..filter.clone()
        };
        self.store.query(&filter, page)
    }
}
