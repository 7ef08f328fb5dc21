//! Kiosk check-in service library crate.
//!
//! Re-exports the modules used by the binary and by integration tests in `tests/`.

use std::sync::Arc;
use std::time::Duration;

pub mod api;
pub mod config;
pub mod errors;
pub mod feed;
pub mod jobs;
pub mod logbook;
pub mod middleware;
pub mod models;
pub mod report;
pub mod rotation;
pub mod schema;
pub mod session;
pub mod store;
pub mod validation;

use errors::AppError;
use logbook::LogStore;
use middleware::idempotency::SubmissionLedger;
use rotation::TokenManager;
use schema::SchemaStore;
use session::KioskSession;
use store::DocumentStore;

/// Shared application state passed to handlers and background jobs.
pub struct AppState {
    pub tokens: TokenManager,
    pub schema: SchemaStore,
    pub logbook: LogStore,
    pub submissions: SubmissionLedger,
    pub config: config::Config,
}

impl AppState {
    /// Load all three collections and make sure an active token exists.
    pub async fn bootstrap(
        store: Arc<dyn DocumentStore>,
        config: config::Config,
    ) -> Result<Arc<Self>, AppError> {
        let tokens = TokenManager::new(store.clone());
        tokens.bootstrap().await?;
        let schema = SchemaStore::load(store.clone()).await?;
        let logbook = LogStore::load(store).await?;
        let submissions =
            SubmissionLedger::new(Duration::from_secs(config.idempotency_ttl_secs));

        Ok(Arc::new(Self {
            tokens,
            schema,
            logbook,
            submissions,
            config,
        }))
    }

    /// URL the code-image renderer encodes for the current token.
    pub fn distributable_url(&self) -> Option<String> {
        self.tokens
            .current()
            .map(|t| rotation::distributable_url(&self.config.public_url, &t))
    }

    pub fn open_session(&self, presented: impl Into<String>) -> KioskSession {
        KioskSession::open(presented, self.tokens.subscribe(), self.schema.subscribe())
    }
}
