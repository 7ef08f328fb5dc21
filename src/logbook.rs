use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::errors::AppError;
use crate::feed::Feed;
use crate::models::{Answers, CheckInRecord};
use crate::store::DocumentStore;

/// Append-only log of check-ins, newest first.
///
/// `append` does not validate. Callers run the submission through
/// `validation::check` first; anything reaching this point is stored as-is.
pub struct LogStore {
    store: Arc<dyn DocumentStore>,
    feed: Feed<Vec<CheckInRecord>>,
    publish_lock: Mutex<()>,
}

impl LogStore {
    pub async fn load(store: Arc<dyn DocumentStore>) -> Result<Self, AppError> {
        let records = store.list_records().await?;
        Ok(Self {
            store,
            feed: Feed::new(records),
            publish_lock: Mutex::new(()),
        })
    }

    pub fn list(&self) -> Vec<CheckInRecord> {
        self.feed.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CheckInRecord>> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> &Feed<Vec<CheckInRecord>> {
        &self.feed
    }

    /// Not idempotent: retrying after an ambiguous failure may store the
    /// submission twice.
    pub async fn append(&self, trainee: &str, answers: Answers) -> Result<CheckInRecord, AppError> {
        let record = CheckInRecord {
            id: Uuid::new_v4(),
            trainee: trainee.to_string(),
            answers,
            submitted_at: self.store.now(),
        };
        self.store.insert_record(&record).await?;
        tracing::info!(record_id = %record.id, answers = record.answers.len(), "check-in logged");
        self.refresh().await?;
        Ok(record)
    }

    /// Irreversible purge of one record.
    pub async fn remove(&self, record_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_record(record_id).await? {
            return Err(AppError::NotFound("record"));
        }
        tracing::warn!(record_id = %record_id, "check-in record purged");
        self.refresh().await?;
        Ok(())
    }

    /// Re-list the collection and publish it. Listings are serialized, so
    /// the last snapshot published is always the most recent read.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        let _guard = self.publish_lock.lock().await;
        let records = self.store.list_records().await?;
        Ok(self.feed.publish(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::lagging::LaggingStore;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    async fn logbook() -> LogStore {
        LogStore::load(Arc::new(MemoryStore::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_lists_newest_first() {
        let log = logbook().await;
        let first = log.append("Alice", Answers::new()).await.unwrap();
        let second = log.append("Bob", Answers::new()).await.unwrap();
        assert!(second.submitted_at > first.submitted_at);
        let ids: Vec<Uuid> = log.list().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_append_trusts_caller() {
        // the log store itself accepts what validation would reject
        let log = logbook().await;
        let record = log.append("", Answers::new()).await.unwrap();
        assert_eq!(record.trainee, "");
    }

    #[tokio::test]
    async fn test_remove_is_final() {
        let log = logbook().await;
        let record = log.append("Alice", Answers::new()).await.unwrap();
        let mut rx = log.subscribe();
        rx.borrow_and_update();

        log.remove(record.id).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(log.list().is_empty());
        assert!(matches!(log.remove(record.id).await, Err(AppError::NotFound("record"))));
    }

    #[tokio::test]
    async fn test_concurrent_appends_publish_latest_listing() {
        // list #1 is the initial load; list #2 (after Alice's append) replies late
        let store = Arc::new(LaggingStore::new(Duration::from_millis(200)).late_record_list(2));
        let log = LogStore::load(store.clone()).await.unwrap();

        let (alice, bob) = tokio::join!(
            log.append("Alice", Answers::new()),
            log.append("Bob", Answers::new())
        );
        alice.unwrap();
        bob.unwrap();

        assert_eq!(store.inner.list_records().await.unwrap().len(), 2);
        assert_eq!(log.list().len(), 2);
    }
}
