//! Deduplicates kiosk submissions using client-supplied idempotency keys.
//!
//! A kiosk that retries a submission after an ambiguous failure sends the
//! same `Idempotency-Key`; the retry maps to the record already stored
//! instead of appending a second one. Submissions without a key are never
//! deduplicated. Keys are remembered in-process only, so a retry that lands on
//! another instance, or arrives concurrently with the first attempt, can still
//! produce a duplicate.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::CheckInRecord;

pub const HEADER: &str = "idempotency-key";

/// Longest key accepted; longer values are ignored.
const MAX_KEY_LEN: usize = 255;

struct Entry {
    record: CheckInRecord,
    expires_at: Instant,
}

pub struct SubmissionLedger {
    seen: DashMap<String, Entry>,
    ttl: Duration,
}

/// Trimmed key, or `None` when the header value is unusable.
pub fn normalize_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return None;
    }
    Some(key.to_string())
}

impl SubmissionLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
        }
    }

    pub fn lookup(&self, key: &str) -> Option<CheckInRecord> {
        if let Some(entry) = self.seen.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.record.clone());
            }
            // expired; drop the ref before removing
            drop(entry);
            self.seen.remove(key);
        }
        None
    }

    pub fn remember(&self, key: &str, record: &CheckInRecord) {
        self.seen.insert(
            key.to_string(),
            Entry {
                record: record.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Remove all expired keys. Called periodically by the refresh job.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen.retain(|_, entry| entry.expires_at > now);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record() -> CheckInRecord {
        CheckInRecord {
            id: Uuid::new_v4(),
            trainee: "Alice".into(),
            answers: Default::default(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  abc "), Some("abc".to_string()));
        assert_eq!(normalize_key("   "), None);
        assert_eq!(normalize_key(&"k".repeat(MAX_KEY_LEN + 1)), None);
    }

    #[test]
    fn test_lookup_returns_remembered_record() {
        let ledger = SubmissionLedger::new(Duration::from_secs(60));
        let r = record();
        assert!(ledger.lookup("k1").is_none());
        ledger.remember("k1", &r);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.lookup("k1"), Some(r));
        assert!(ledger.lookup("k2").is_none());
    }

    #[test]
    fn test_expired_keys_are_forgotten() {
        let ledger = SubmissionLedger::new(Duration::ZERO);
        ledger.remember("k1", &record());
        ledger.remember("k2", &record());
        assert_eq!(ledger.len(), 2);
        assert!(ledger.lookup("k1").is_none());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.evict_expired(), 1);
        assert!(ledger.is_empty());
    }
}
