use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CheckInRecord, Field, FieldDraft, SecurityToken};
use crate::report::{self, ExportTable};
use crate::rotation::distributable_url;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

impl SearchParams {
    fn term(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub rotated_at: DateTime<Utc>,
    /// Payload for the scannable code.
    pub url: String,
}

impl TokenResponse {
    fn new(public_url: &str, token: &SecurityToken) -> Self {
        Self {
            token: token.value.clone(),
            rotated_at: token.rotated_at,
            url: distributable_url(public_url, token),
        }
    }
}

// ── Security Token ───────────────────────────────────────────

/// GET /api/v1/token: active token and the URL to encode
pub async fn get_token(State(state): State<Arc<AppState>>) -> Result<Json<TokenResponse>, AppError> {
    let token = state
        .tokens
        .current()
        .ok_or(AppError::NotFound("security token"))?;
    Ok(Json(TokenResponse::new(&state.config.public_url, &token)))
}

/// POST /api/v1/token/rotate: void every distributed code
pub async fn rotate_token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.tokens.rotate().await?;
    Ok(Json(TokenResponse::new(&state.config.public_url, &token)))
}

// ── Fields ───────────────────────────────────────────────────

/// GET /api/v1/fields: form definition in display order
pub async fn list_fields(State(state): State<Arc<AppState>>) -> Json<Vec<Field>> {
    Json(state.schema.list())
}

/// POST /api/v1/fields: add a field at the end of the form
pub async fn create_field(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<FieldDraft>,
) -> Result<(StatusCode, Json<Field>), AppError> {
    let field = state.schema.upsert(draft, None).await?;
    Ok((StatusCode::CREATED, Json(field)))
}

/// PUT /api/v1/fields/:id: replace a field's attributes in place
pub async fn update_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(draft): Json<FieldDraft>,
) -> Result<Json<Field>, AppError> {
    let field = state.schema.upsert(draft, Some(id)).await?;
    Ok(Json(field))
}

/// DELETE /api/v1/fields/:id
pub async fn delete_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.schema.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Records ──────────────────────────────────────────────────

/// GET /api/v1/records?search=: newest first, optionally filtered
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<CheckInRecord>> {
    let logs = state.logbook.list();
    Json(
        report::filter(&logs, params.term())
            .into_iter()
            .cloned()
            .collect(),
    )
}

/// DELETE /api/v1/records/:id: irreversible; the client confirms first
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.logbook.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/export?search=: tabular projection of the filtered log
pub async fn export_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<ExportTable> {
    let logs = state.logbook.list();
    let schema = state.schema.list();
    let filtered = report::filter(&logs, params.term());
    Json(report::export_table(filtered, &schema))
}

// ── Live stream ──────────────────────────────────────────────

fn json_event<T: Serialize>(name: &'static str, value: &T) -> Event {
    let data = serde_json::to_string(value).unwrap_or_default();
    Event::default().event(name).data(data)
}

/// GET /api/v1/stream: SSE with one event per schema, log or token change.
/// Each feed starts with its current snapshot. Feeds are not ordered
/// relative to each other.
pub async fn stream_changes(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let public_url = state.config.public_url.clone();

    let schema = state
        .schema
        .feed()
        .stream()
        .map(|fields| json_event("schema", &fields));
    let records = state
        .logbook
        .feed()
        .stream()
        .map(|records| json_event("records", &records));
    let tokens = state.tokens.feed().stream().map(move |token| {
        let body = token.map(|t| TokenResponse::new(&public_url, &t));
        json_event("token", &body)
    });

    let merged = stream::select(schema, stream::select(records, tokens)).map(Ok);
    Sse::new(merged).keep_alive(KeepAlive::default())
}
