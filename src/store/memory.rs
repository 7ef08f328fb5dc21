use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, MonotonicClock, StoreError};
use crate::models::{CheckInRecord, Field, SecurityToken};

/// In-process store. Used for single-kiosk deployments and in tests.
///
/// Collections are kept in insertion order; listing sorts stably so equal
/// timestamps keep the order they were written in.
#[derive(Default)]
pub struct MemoryStore {
    token: RwLock<Option<SecurityToken>>,
    fields: RwLock<Vec<Field>>,
    records: RwLock<Vec<CheckInRecord>>,
    clock: MonotonicClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load_token(&self) -> Result<Option<SecurityToken>, StoreError> {
        Ok(self.token.read().await.clone())
    }

    async fn save_token(&self, token: &SecurityToken) -> Result<(), StoreError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }

    async fn list_fields(&self) -> Result<Vec<Field>, StoreError> {
        let mut fields = self.fields.read().await.clone();
        fields.sort_by_key(|f| f.created_at);
        Ok(fields)
    }

    async fn get_field(&self, id: Uuid) -> Result<Option<Field>, StoreError> {
        Ok(self.fields.read().await.iter().find(|f| f.id == id).cloned())
    }

    async fn insert_field(&self, field: &Field) -> Result<(), StoreError> {
        self.fields.write().await.push(field.clone());
        Ok(())
    }

    async fn replace_field(&self, field: &Field) -> Result<bool, StoreError> {
        let mut fields = self.fields.write().await;
        match fields.iter_mut().find(|f| f.id == field.id) {
            Some(slot) => {
                *slot = field.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_field(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut fields = self.fields.write().await;
        let before = fields.len();
        fields.retain(|f| f.id != id);
        Ok(fields.len() < before)
    }

    async fn list_records(&self) -> Result<Vec<CheckInRecord>, StoreError> {
        // newest write first, then a stable sort keeps that order on ties
        let mut records: Vec<CheckInRecord> =
            self.records.read().await.iter().rev().cloned().collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }

    async fn insert_record(&self, record: &CheckInRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < before)
    }
}
