//! Automated RFID intake: dedup, policy evaluation, and receipts

mod dedup;
mod gateway;

pub use gateway::{AutomationGateway, BalanceCheck, ScanEvent, ScanOutcome, ScanReceipt};
