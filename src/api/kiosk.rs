use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::errors::AppError;
use crate::middleware::idempotency;
use crate::models::{Answers, CheckInRecord};
use crate::session::{authorize_token, Authorization, KioskSession, SessionView};
use crate::validation::{self, FormState};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct KioskParams {
    /// Token read from the scanned code. Missing means unauthorized.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    pub trainee: String,
    #[serde(default)]
    pub answers: Answers,
}

fn authorization(state: &AppState, presented: &str) -> Authorization {
    authorize_token(presented, state.tokens.current().as_ref())
}

fn require_authorized(state: &AppState, presented: &str) -> Result<(), AppError> {
    if authorization(state, presented).is_authorized() {
        Ok(())
    } else {
        tracing::info!("kiosk request rejected: stale or unknown token");
        Err(AppError::Unauthorized)
    }
}

/// GET /kiosk/session: form to render, or the rescan message.
/// Always 200; the body carries the verdict.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Query(params): Query<KioskParams>,
) -> Json<SessionView> {
    let verdict = authorization(&state, &params.token);
    Json(SessionView::build(verdict, &state.schema.list()))
}

fn session_event(session: &KioskSession) -> Event {
    let data = serde_json::to_string(&session.view()).unwrap_or_default();
    Event::default().event("session").data(data)
}

/// GET /kiosk/session/stream: SSE of the session view, re-sent on
/// every rotation or schema change. A rotation flips it to unauthorized.
pub async fn stream_session(
    State(state): State<Arc<AppState>>,
    Query(params): Query<KioskParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.open_session(params.token);

    let events = stream::unfold((session, true), |(mut session, first)| async move {
        if !first {
            session.next_event().await?;
        }
        let event = session_event(&session);
        Some((Ok(event), (session, false)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /kiosk/validate: submit-button state for a partial draft.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<KioskParams>,
    Json(draft): Json<SubmissionRequest>,
) -> Result<Json<FormState>, AppError> {
    require_authorized(&state, &params.token)?;
    Ok(Json(FormState::evaluate(
        &draft.trainee,
        &draft.answers,
        &state.schema.list(),
    )))
}

/// POST /kiosk/check-ins: validate and log a submission.
///
/// With an `Idempotency-Key` header, a retry of an already-stored
/// submission returns the stored record with 200 instead of appending.
pub async fn submit_check_in(
    State(state): State<Arc<AppState>>,
    Query(params): Query<KioskParams>,
    headers: HeaderMap,
    Json(req): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<CheckInRecord>), AppError> {
    require_authorized(&state, &params.token)?;

    let key = headers
        .get(idempotency::HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(idempotency::normalize_key);

    // A stored submission is answered as stored, even if the schema changed since
    if let Some(ref key) = key {
        if let Some(existing) = state.submissions.lookup(key) {
            tracing::debug!(record_id = %existing.id, "duplicate submission, returning stored record");
            return Ok((StatusCode::OK, Json(existing)));
        }
    }

    let trainee = req.trainee.trim();
    validation::check(trainee, &req.answers, &state.schema.list())?;

    let record = state.logbook.append(trainee, req.answers).await?;

    if let Some(ref key) = key {
        state.submissions.remember(key, &record);
    }

    Ok((StatusCode::CREATED, Json(record)))
}
