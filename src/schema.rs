use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::errors::{AppError, FieldDraftError};
use crate::feed::Feed;
use crate::models::{Field, FieldDraft, FieldType};
use crate::store::DocumentStore;

/// Admin-editable form definition, kept in display order (ascending
/// `created_at`) and published on every change.
pub struct SchemaStore {
    store: Arc<dyn DocumentStore>,
    feed: Feed<Vec<Field>>,
    publish_lock: Mutex<()>,
}

/// Validated, normalized attributes of a draft.
struct FieldAttrs {
    text: String,
    kind: FieldType,
    options: Vec<String>,
    required: bool,
}

fn normalize(draft: FieldDraft) -> Result<FieldAttrs, FieldDraftError> {
    let text = draft.text.trim().to_string();
    if text.is_empty() {
        return Err(FieldDraftError::EmptyText);
    }
    let options = match draft.kind {
        FieldType::Choice => {
            let options = draft.parsed_options();
            if options.is_empty() {
                return Err(FieldDraftError::NoOptions);
            }
            options
        }
        FieldType::Binary | FieldType::FreeText => Vec::new(),
    };
    Ok(FieldAttrs {
        text,
        kind: draft.kind,
        options,
        required: draft.required,
    })
}

impl SchemaStore {
    pub async fn load(store: Arc<dyn DocumentStore>) -> Result<Self, AppError> {
        let fields = store.list_fields().await?;
        Ok(Self {
            store,
            feed: Feed::new(fields),
            publish_lock: Mutex::new(()),
        })
    }

    pub fn list(&self) -> Vec<Field> {
        self.feed.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Field>> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> &Feed<Vec<Field>> {
        &self.feed
    }

    /// Create a field, or replace the mutable attributes of `editing_id`.
    /// An edit keeps the field's id and creation time, so its position in
    /// the form does not move.
    pub async fn upsert(&self, draft: FieldDraft, editing_id: Option<Uuid>) -> Result<Field, AppError> {
        let attrs = normalize(draft)?;

        let field = match editing_id {
            None => {
                let field = Field {
                    id: Uuid::new_v4(),
                    text: attrs.text,
                    kind: attrs.kind,
                    options: attrs.options,
                    required: attrs.required,
                    created_at: self.store.now(),
                };
                self.store.insert_field(&field).await?;
                tracing::info!(field_id = %field.id, kind = %field.kind, "field created");
                field
            }
            Some(id) => {
                let existing = self
                    .store
                    .get_field(id)
                    .await?
                    .ok_or(AppError::NotFound("field"))?;
                let field = Field {
                    id: existing.id,
                    text: attrs.text,
                    kind: attrs.kind,
                    options: attrs.options,
                    required: attrs.required,
                    created_at: existing.created_at,
                };
                // deleted between the read and the write
                if !self.store.replace_field(&field).await? {
                    return Err(AppError::NotFound("field"));
                }
                tracing::info!(field_id = %field.id, kind = %field.kind, "field updated");
                field
            }
        };

        self.refresh().await?;
        Ok(field)
    }

    /// Delete a field. Answers already stored under its id are left alone.
    pub async fn remove(&self, field_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_field(field_id).await? {
            return Err(AppError::NotFound("field"));
        }
        tracing::info!(field_id = %field_id, "field removed");
        self.refresh().await?;
        Ok(())
    }

    /// Re-list the collection and publish it. Listings are serialized, so
    /// the last snapshot published is always the most recent read.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        let _guard = self.publish_lock.lock().await;
        let fields = self.store.list_fields().await?;
        Ok(self.feed.publish(fields))
    }
}
