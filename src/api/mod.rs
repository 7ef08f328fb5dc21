use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use subtle::ConstantTimeEq;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::AppState;

pub mod handlers;
pub mod kiosk;

/// Build the full application: health checks, the admin API under
/// `/api/v1` and the kiosk endpoints under `/kiosk`.
pub fn app(state: Arc<AppState>) -> Router {
    let kiosk_origin = state.config.kiosk_origin.clone();

    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .nest("/api/v1", api_router(state.clone()))
        .nest("/kiosk", kiosk_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(kiosk_origin))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

/// Build the Management API router.
/// All routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/token", get(handlers::get_token))
        .route("/token/rotate", post(handlers::rotate_token))
        .route(
            "/fields",
            get(handlers::list_fields).post(handlers::create_field),
        )
        .route(
            "/fields/:id",
            put(handlers::update_field).delete(handlers::delete_field),
        )
        .route("/records", get(handlers::list_records))
        .route("/records/:id", delete(handlers::delete_record))
        .route("/export", get(handlers::export_records))
        .route("/stream", get(handlers::stream_changes))
        .layer(middleware::from_fn_with_state(state, admin_auth))
        .fallback(fallback_404)
}

/// Kiosk-facing routes. Every request carries the scanned `?token=`.
pub fn kiosk_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(kiosk::get_session))
        .route("/session/stream", get(kiosk::stream_session))
        .route("/validate", post(kiosk::validate))
        .route("/check-ins", post(kiosk::submit_check_in))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.tokens.current().is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Middleware: validates `X-Admin-Key` (or a bearer token) against the
/// configured admin key. Nothing behind it runs on failure.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    let expected = state.config.admin_key.as_bytes();

    match provided_key {
        Some(k) if bool::from(k.as_bytes().ct_eq(expected)) => Ok(next.run(req).await),
        Some(k) => {
            // SECURITY: Never log the expected key or the full provided key
            let masked = if k.len() > 8 {
                format!("{}…{}", &k[..4], &k[k.len() - 4..])
            } else {
                "****".to_string()
            };
            tracing::warn!("admin API: invalid key (provided: '{}')", masked);
            Err(AppError::AuthenticationFailed)
        }
        None => {
            tracing::warn!("admin API: missing X-Admin-Key header");
            Err(AppError::AuthenticationFailed)
        }
    }
}

fn cors_layer(kiosk_origin: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == kiosk_origin
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-admin-key"),
            HeaderName::from_static("idempotency-key"),
            HeaderName::from_static("x-request-id"),
        ])
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));

    // Kiosk URLs carry the token in the query string
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    headers.remove("Server");

    resp
}
