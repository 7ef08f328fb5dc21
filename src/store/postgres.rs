use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DocumentStore, MonotonicClock, StoreError};
use crate::models::{Answers, CheckInRecord, Field, FieldType, SecurityToken};

/// Postgres-backed document store. Several service instances may share one
/// database; they converge through the refresh job.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    clock: std::sync::Arc<MonotonicClock>,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            clock: std::sync::Arc::new(MonotonicClock::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct FieldRow {
    id: Uuid,
    text: String,
    kind: String,
    options: Vec<String>,
    required: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<FieldRow> for Field {
    type Error = StoreError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        let kind = FieldType::parse(&row.kind).ok_or_else(|| StoreError::Corrupt {
            collection: "fields",
            reason: format!("unknown field type '{}' on {}", row.kind, row.id),
        })?;
        Ok(Field {
            id: row.id,
            text: row.text,
            kind,
            options: row.options,
            required: row.required,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    trainee: String,
    answers: Json<Answers>,
    submitted_at: DateTime<Utc>,
}

impl From<RecordRow> for CheckInRecord {
    fn from(row: RecordRow) -> Self {
        CheckInRecord {
            id: row.id,
            trainee: row.trainee,
            answers: row.answers.0,
            submitted_at: row.submitted_at,
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -- Security Token --

    async fn load_token(&self) -> Result<Option<SecurityToken>, StoreError> {
        let row = sqlx::query_as::<_, SecurityToken>(
            "SELECT value, rotated_at FROM security_token WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save_token(&self, token: &SecurityToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO security_token (id, value, rotated_at)
               VALUES (1, $1, $2)
               ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value, rotated_at = EXCLUDED.rotated_at"#,
        )
        .bind(&token.value)
        .bind(token.rotated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- Fields --

    async fn list_fields(&self) -> Result<Vec<Field>, StoreError> {
        let rows = sqlx::query_as::<_, FieldRow>(
            "SELECT id, text, kind, options, required, created_at FROM fields ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Field::try_from).collect()
    }

    async fn get_field(&self, id: Uuid) -> Result<Option<Field>, StoreError> {
        let row = sqlx::query_as::<_, FieldRow>(
            "SELECT id, text, kind, options, required, created_at FROM fields WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Field::try_from).transpose()
    }

    async fn insert_field(&self, field: &Field) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO fields (id, text, kind, options, required, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(field.id)
        .bind(&field.text)
        .bind(field.kind.as_str())
        .bind(&field.options)
        .bind(field.required)
        .bind(field.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_field(&self, field: &Field) -> Result<bool, StoreError> {
        // created_at is never rewritten; position in the form is fixed at creation
        let result = sqlx::query(
            "UPDATE fields SET text = $2, kind = $3, options = $4, required = $5 WHERE id = $1",
        )
        .bind(field.id)
        .bind(&field.text)
        .bind(field.kind.as_str())
        .bind(&field.options)
        .bind(field.required)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_field(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM fields WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- Records --

    async fn list_records(&self) -> Result<Vec<CheckInRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT id, trainee, answers, submitted_at FROM records ORDER BY submitted_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CheckInRecord::from).collect())
    }

    async fn insert_record(&self, record: &CheckInRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO records (id, trainee, answers, submitted_at)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(record.id)
        .bind(&record.trainee)
        .bind(Json(&record.answers))
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
