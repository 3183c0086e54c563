//! Runtime configuration
//!
//! The source material leaves two behaviors as deployment policy rather
//! than code: what a tap does (the automation mutation policy) and how long
//! a dedup key shields a scan from being re-applied. Both live here, next
//! to the bounded-wait and pagination knobs, so they are configured
//! explicitly instead of being guessed at the call sites.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// What a physical tap triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "amount")]
pub enum AutomationPolicy {
    /// Every accepted tap debits a fixed fee from the account
    FixedFee(Decimal),

    /// Taps only report the balance; no transaction is produced
    PresenceCheck,
}

/// Ledger-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Bounded wait for the per-account write lock before `apply` gives up
    /// with a busy error
    pub lock_wait: Duration,

    /// How long a scan event key suppresses re-application of the same tap
    pub dedup_window: Duration,

    /// Mutation policy for automation intake
    pub scan_policy: AutomationPolicy,

    /// Page size used when a caller passes a zero limit
    pub default_page_size: usize,

    /// Hard ceiling on page size
    pub max_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            lock_wait: Duration::from_millis(250),
            dedup_window: Duration::from_secs(120),
            // The non-mutating choice: deployments that charge per tap must
            // opt in with an explicit fee.
            scan_policy: AutomationPolicy::PresenceCheck,
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

impl LedgerConfig {
    /// Read configuration from `LEDGER_*` environment variables
    ///
    /// Unset or unparseable variables fall back to the defaults. Recognized
    /// variables:
    ///
    /// - `LEDGER_LOCK_WAIT_MS`
    /// - `LEDGER_DEDUP_WINDOW_SECS`
    /// - `LEDGER_SCAN_POLICY` (`presence_check` or `fixed_fee`)
    /// - `LEDGER_SCAN_FEE` (decimal, used when the policy is `fixed_fee`)
    /// - `LEDGER_DEFAULT_PAGE_SIZE`
    /// - `LEDGER_MAX_PAGE_SIZE`
    pub fn from_env() -> Self {
        let defaults = LedgerConfig::default();

        let scan_policy = match get_env("LEDGER_SCAN_POLICY").as_deref() {
            Some("fixed_fee") => get_env("LEDGER_SCAN_FEE")
                .and_then(|raw| raw.parse::<Decimal>().ok())
                .map(AutomationPolicy::FixedFee)
                .unwrap_or(defaults.scan_policy.clone()),
            Some("presence_check") => AutomationPolicy::PresenceCheck,
            _ => defaults.scan_policy.clone(),
        };

        LedgerConfig {
            lock_wait: get_env("LEDGER_LOCK_WAIT_MS")
                .and_then(|raw| raw.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_wait),
            dedup_window: get_env("LEDGER_DEDUP_WINDOW_SECS")
                .and_then(|raw| raw.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dedup_window),
            scan_policy,
            default_page_size: get_env("LEDGER_DEFAULT_PAGE_SIZE")
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.default_page_size),
            max_page_size: get_env("LEDGER_MAX_PAGE_SIZE")
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.max_page_size),
        }
    }

    /// Clamp a requested page limit to the configured bounds
    pub fn clamp_limit(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_page_size
        } else {
            requested.min(self.max_page_size)
        }
    }
}

fn get_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_do_not_mutate_on_tap() {
        let config = LedgerConfig::default();
        assert_eq!(config.scan_policy, AutomationPolicy::PresenceCheck);
        assert_eq!(config.lock_wait, Duration::from_millis(250));
        assert_eq!(config.dedup_window, Duration::from_secs(120));
    }

    #[rstest]
    #[case::zero_falls_back(0, 50)]
    #[case::within_bounds(20, 20)]
    #[case::clamped_to_max(1000, 200)]
    fn limit_clamping(#[case] requested: usize, #[case] expected: usize) {
        let config = LedgerConfig::default();
        assert_eq!(config.clamp_limit(requested), expected);
    }
}
