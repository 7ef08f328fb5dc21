//! Document store backends.
//!
//! Three logical collections live behind [`DocumentStore`]: the singleton
//! security token, the form `fields` (ascending `created_at`) and the check-in
//! `records` (descending `submitted_at`). Every write touches exactly one
//! document; there are no cross-collection transactions.

pub mod memory;
pub mod postgres;

#[cfg(test)]
pub(crate) mod lagging;

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use crate::models::{CheckInRecord, Field, SecurityToken};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt document in {collection}: {reason}")]
    Corrupt {
        collection: &'static str,
        reason: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Abstraction over the persistence collaborator.
/// Implementations: MemoryStore (single process), PgStore (shared Postgres).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Server-assigned timestamp for new documents. Strictly increasing per store.
    fn now(&self) -> DateTime<Utc>;

    async fn load_token(&self) -> Result<Option<SecurityToken>, StoreError>;

    /// Atomically replaces the singleton token document.
    async fn save_token(&self, token: &SecurityToken) -> Result<(), StoreError>;

    /// Fields ordered by ascending `created_at`.
    async fn list_fields(&self) -> Result<Vec<Field>, StoreError>;

    async fn get_field(&self, id: Uuid) -> Result<Option<Field>, StoreError>;

    async fn insert_field(&self, field: &Field) -> Result<(), StoreError>;

    /// Full-document replace. Returns false if no field has that id.
    async fn replace_field(&self, field: &Field) -> Result<bool, StoreError>;

    async fn delete_field(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Records ordered by descending `submitted_at`.
    async fn list_records(&self) -> Result<Vec<CheckInRecord>, StoreError>;

    async fn insert_record(&self, record: &CheckInRecord) -> Result<(), StoreError>;

    async fn delete_record(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Microsecond-resolution clock that never hands out the same instant twice.
///
/// Postgres stores `timestamptz` at microsecond precision, so timestamps are
/// truncated before they are compared or persisted.
pub struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = Utc::now().trunc_subsecs(6);
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = MonotonicClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev, "{} should be after {}", next, prev);
            prev = next;
        }
    }

    #[test]
    fn test_clock_truncates_to_micros() {
        let clock = MonotonicClock::new();
        let t = clock.now();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000, 0);
    }
}
