//! Spending limits for L402 payments.
//!
//! [`BudgetController`] enforces a per-request ceiling and two sliding windows
//! (trailing hour, trailing day) over the payments it has been told about.
//! Window entries older than a day are pruned lazily before each check.
//!
//! # Concurrency
//!
//! Each call is atomic, but [`BudgetController::check`] and
//! [`BudgetController::record_payment`] are separate calls around the actual
//! payment. Two requests sharing one controller may both pass `check` before
//! either records, so their combined spend can exceed a ceiling. Callers that
//! need hard limits under concurrency must serialize payments themselves.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use l402_types::config::BudgetConfig;
use l402_types::error::{BudgetLimit, L402Error};
use l402_types::timestamp::UnixTimestamp;

const HOUR_SECS: u64 = 3_600;
const DAY_SECS: u64 = 86_400;

/// A successful payment counted against the sliding windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BudgetWindowEntry {
    timestamp: UnixTimestamp,
    amount_sats: u64,
}

/// Configurable spending limits for L402 payments.
#[derive(Debug)]
pub struct BudgetController {
    max_sats_per_request: u64,
    max_sats_per_hour: u64,
    max_sats_per_day: u64,
    /// Lowercased hosts; `None` allows every origin.
    allowed_domains: Option<HashSet<String>>,
    payments: Mutex<VecDeque<BudgetWindowEntry>>,
}

impl Default for BudgetController {
    fn default() -> Self {
        Self::new(BudgetConfig::default())
    }
}

impl From<BudgetConfig> for BudgetController {
    fn from(config: BudgetConfig) -> Self {
        Self::new(config)
    }
}

impl BudgetController {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            max_sats_per_request: config.max_sats_per_request,
            max_sats_per_hour: config.max_sats_per_hour,
            max_sats_per_day: config.max_sats_per_day,
            allowed_domains: config
                .allowed_domains
                .map(|domains| domains.iter().map(|d| d.trim().to_lowercase()).collect()),
            payments: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_sats_per_request(&self) -> u64 {
        self.max_sats_per_request
    }

    pub fn max_sats_per_hour(&self) -> u64 {
        self.max_sats_per_hour
    }

    pub fn max_sats_per_day(&self) -> u64 {
        self.max_sats_per_day
    }

    /// Verifies a payment of `amount_sats` to `origin` is within budget.
    ///
    /// The allow-list is only consulted for a non-empty `origin`. A payment
    /// that lands exactly on a ceiling is allowed.
    ///
    /// # Errors
    ///
    /// [`L402Error::DomainNotAllowed`] if the origin is not allowed,
    /// [`L402Error::BudgetExceeded`] if any ceiling would be exceeded.
    pub fn check(&self, amount_sats: u64, origin: &str) -> Result<(), L402Error> {
        self.check_at(amount_sats, origin, UnixTimestamp::now())
    }

    fn check_at(&self, amount_sats: u64, origin: &str, now: UnixTimestamp) -> Result<(), L402Error> {
        if let Some(allowed) = &self.allowed_domains {
            if !origin.is_empty() && !allowed.contains(&origin.to_lowercase()) {
                return Err(L402Error::DomainNotAllowed {
                    origin: origin.to_string(),
                });
            }
        }

        if amount_sats > self.max_sats_per_request {
            return Err(L402Error::BudgetExceeded {
                kind: BudgetLimit::PerRequest,
                limit: self.max_sats_per_request,
                current: 0,
                requested: amount_sats,
            });
        }

        let mut payments = self.payments();
        prune(&mut payments, now);

        let spent_hour = window_sum(&payments, now - HOUR_SECS);
        if spent_hour.saturating_add(amount_sats) > self.max_sats_per_hour {
            return Err(L402Error::BudgetExceeded {
                kind: BudgetLimit::PerHour,
                limit: self.max_sats_per_hour,
                current: spent_hour,
                requested: amount_sats,
            });
        }

        let spent_day = window_sum(&payments, now - DAY_SECS);
        if spent_day.saturating_add(amount_sats) > self.max_sats_per_day {
            return Err(L402Error::BudgetExceeded {
                kind: BudgetLimit::PerDay,
                limit: self.max_sats_per_day,
                current: spent_day,
                requested: amount_sats,
            });
        }

        Ok(())
    }

    /// Records a successful payment. Call only after the payment went through.
    pub fn record_payment(&self, amount_sats: u64) {
        self.record_payment_at(amount_sats, UnixTimestamp::now());
    }

    fn record_payment_at(&self, amount_sats: u64, timestamp: UnixTimestamp) {
        self.payments().push_back(BudgetWindowEntry {
            timestamp,
            amount_sats,
        });
    }

    /// Total sats spent in the trailing hour.
    pub fn spent_last_hour(&self) -> u64 {
        self.spent_within(UnixTimestamp::now(), HOUR_SECS)
    }

    /// Total sats spent in the trailing 24 hours.
    pub fn spent_last_day(&self) -> u64 {
        self.spent_within(UnixTimestamp::now(), DAY_SECS)
    }

    fn spent_within(&self, now: UnixTimestamp, window_secs: u64) -> u64 {
        let mut payments = self.payments();
        prune(&mut payments, now);
        window_sum(&payments, now - window_secs)
    }

    fn payments(&self) -> MutexGuard<'_, VecDeque<BudgetWindowEntry>> {
        // Poisoning is ignored: every critical section leaves the deque consistent.
        self.payments.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drops entries older than the longest window.
fn prune(payments: &mut VecDeque<BudgetWindowEntry>, now: UnixTimestamp) {
    let cutoff = now - DAY_SECS;
    while payments.front().is_some_and(|entry| entry.timestamp < cutoff) {
        payments.pop_front();
    }
}

fn window_sum(payments: &VecDeque<BudgetWindowEntry>, since: UnixTimestamp) -> u64 {
    payments
        .iter()
        .filter(|entry| entry.timestamp >= since)
        .map(|entry| entry.amount_sats)
        .fold(0u64, u64::saturating_add)
}
