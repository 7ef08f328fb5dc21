//! Test backend that answers one chosen call late.
//!
//! Writes land in the inner store immediately; only the reply is held back.
//! Reads are taken immediately too, so a late list reply carries a snapshot
//! that may already be stale by the time it returns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::memory::MemoryStore;
use super::{DocumentStore, StoreError};
use crate::models::{CheckInRecord, Field, SecurityToken};

#[derive(Default)]
struct Lag {
    calls: AtomicUsize,
    /// 1-based index of the call to hold back.
    late_call: Option<usize>,
}

impl Lag {
    async fn wait(&self, delay: Duration) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.late_call == Some(call) {
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Default)]
pub struct LaggingStore {
    pub inner: MemoryStore,
    delay: Duration,
    token_saves: Lag,
    field_lists: Lag,
    record_lists: Lag,
}

impl LaggingStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn late_token_save(mut self, call: usize) -> Self {
        self.token_saves.late_call = Some(call);
        self
    }

    pub fn late_field_list(mut self, call: usize) -> Self {
        self.field_lists.late_call = Some(call);
        self
    }

    pub fn late_record_list(mut self, call: usize) -> Self {
        self.record_lists.late_call = Some(call);
        self
    }
}

#[async_trait]
impl DocumentStore for LaggingStore {
    fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }

    async fn load_token(&self) -> Result<Option<SecurityToken>, StoreError> {
        self.inner.load_token().await
    }

    async fn save_token(&self, token: &SecurityToken) -> Result<(), StoreError> {
        self.inner.save_token(token).await?;
        self.token_saves.wait(self.delay).await;
        Ok(())
    }

    async fn list_fields(&self) -> Result<Vec<Field>, StoreError> {
        let fields = self.inner.list_fields().await?;
        self.field_lists.wait(self.delay).await;
        Ok(fields)
    }

    async fn get_field(&self, id: Uuid) -> Result<Option<Field>, StoreError> {
        self.inner.get_field(id).await
    }

    async fn insert_field(&self, field: &Field) -> Result<(), StoreError> {
        self.inner.insert_field(field).await
    }

    async fn replace_field(&self, field: &Field) -> Result<bool, StoreError> {
        self.inner.replace_field(field).await
    }

    async fn delete_field(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_field(id).await
    }

    async fn list_records(&self) -> Result<Vec<CheckInRecord>, StoreError> {
        let records = self.inner.list_records().await?;
        self.record_lists.wait(self.delay).await;
        Ok(records)
    }

    async fn insert_record(&self, record: &CheckInRecord) -> Result<(), StoreError> {
        self.inner.insert_record(record).await
    }

    async fn delete_record(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_record(id).await
    }
}
