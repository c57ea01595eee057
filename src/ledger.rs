//! Append-only record of L402 payment attempts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use l402_types::timestamp::UnixTimestamp;

/// A single L402 payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub origin: String,
    pub path: String,
    pub amount_sats: u64,
    /// Empty for failed attempts.
    pub preimage: String,
    pub timestamp: UnixTimestamp,
    pub success: bool,
}

/// Records every payment attempt for introspection and auditing.
///
/// Entries are never mutated or removed.
#[derive(Debug, Default)]
pub struct SpendingLedger {
    records: Mutex<Vec<PaymentRecord>>,
}

impl SpendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a payment attempt stamped with the current time.
    pub fn record(
        &self,
        origin: &str,
        path: &str,
        amount_sats: u64,
        preimage: &str,
        success: bool,
    ) -> PaymentRecord {
        let entry = PaymentRecord {
            origin: origin.to_string(),
            path: path.to_string(),
            amount_sats,
            preimage: preimage.to_string(),
            timestamp: UnixTimestamp::now(),
            success,
        };
        self.push(entry.clone());
        entry
    }

    fn push(&self, entry: PaymentRecord) {
        self.lock().push(entry);
    }

    /// A snapshot of all records, oldest first.
    pub fn records(&self) -> Vec<PaymentRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total sats across all successful payments.
    pub fn total_spent(&self) -> u64 {
        self.spent_since(UnixTimestamp::from_secs(0))
    }

    /// Total sats successfully spent in the last hour.
    pub fn spent_last_hour(&self) -> u64 {
        self.spent_since(UnixTimestamp::now() - 3_600)
    }

    /// Total sats successfully spent in the last 24 hours.
    pub fn spent_today(&self) -> u64 {
        self.spent_since(UnixTimestamp::now() - 86_400)
    }

    fn spent_since(&self, since: UnixTimestamp) -> u64 {
        self.lock()
            .iter()
            .filter(|r| r.success && r.timestamp >= since)
            .map(|r| r.amount_sats)
            .fold(0u64, u64::saturating_add)
    }

    /// Successful spend grouped by origin.
    pub fn by_origin(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for record in self.lock().iter().filter(|r| r.success) {
            let total: &mut u64 = totals.entry(record.origin.clone()).or_default();
            *total = total.saturating_add(record.amount_sats);
        }
        totals
    }

    /// All records as a pretty-printed JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PaymentRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(ledger: &SpendingLedger, origin: &str, amount: u64, secs_ago: u64, success: bool) {
        ledger.push(PaymentRecord {
            origin: origin.to_string(),
            path: "/api".to_string(),
            amount_sats: amount,
            preimage: if success { "ab".to_string() } else { String::new() },
            timestamp: UnixTimestamp::now() - secs_ago,
            success,
        });
    }

    #[test]
    fn test_record_returns_entry() {
        let ledger = SpendingLedger::new();
        let entry = ledger.record("api.example.com", "/v1/data", 1_000, "00ff", true);
        assert_eq!(entry.origin, "api.example.com");
        assert_eq!(entry.amount_sats, 1_000);
        assert!(entry.success);
        assert_eq!(ledger.records(), vec![entry]);
    }

    #[test]
    fn test_totals_skip_failures() {
        let ledger = SpendingLedger::new();
        ledger.record("a.com", "/x", 100, "aa", true);
        ledger.record("a.com", "/x", 50, "", false);
        ledger.record("b.com", "/y", 25, "bb", true);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.total_spent(), 125);
    }

    #[test]
    fn test_time_windows() {
        let ledger = SpendingLedger::new();
        record_at(&ledger, "a.com", 10, 60, true);
        record_at(&ledger, "a.com", 20, 2 * 3_600, true);
        record_at(&ledger, "a.com", 40, 2 * 86_400, true);
        record_at(&ledger, "a.com", 80, 60, false);
        assert_eq!(ledger.spent_last_hour(), 10);
        assert_eq!(ledger.spent_today(), 30);
        assert_eq!(ledger.total_spent(), 70);
    }

    #[test]
    fn test_by_origin() {
        let ledger = SpendingLedger::new();
        ledger.record("a.com", "/x", 100, "aa", true);
        ledger.record("b.com", "/y", 25, "bb", true);
        ledger.record("a.com", "/z", 5, "cc", true);
        ledger.record("c.com", "/z", 7, "", false);
        let totals = ledger.by_origin();
        assert_eq!(totals.get("a.com"), Some(&105));
        assert_eq!(totals.get("b.com"), Some(&25));
        assert_eq!(totals.get("c.com"), None);
    }

    #[test]
    fn test_to_json() {
        let ledger = SpendingLedger::new();
        ledger.record("a.com", "/x", 100, "aa", true);
        ledger.record("a.com", "/x", 100, "", false);
        let json = ledger.to_json().unwrap();
        let parsed: Vec<PaymentRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ledger.records());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["amountSats"], 100);
        assert_eq!(value[1]["success"], false);
    }
}
