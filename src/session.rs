//! Kiosk session authorization.
//!
//! A kiosk is authorized while the token it was opened with equals the active
//! security token. Sessions hold no cached verdict: every token emission is
//! re-evaluated, and a session that loses authorization drops its unsaved
//! draft so the trainee has to start again from a fresh scan.

use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::AppError;
use crate::logbook::LogStore;
use crate::models::{Answers, CheckInRecord, Field, FieldType, SecurityToken};
use crate::validation::{self, FormState};

const UNAUTHORIZED_MESSAGE: &str = "Invalid or expired QR code. Request a current scan.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Authorized,
    Unauthorized,
}

impl Authorization {
    pub fn is_authorized(self) -> bool {
        matches!(self, Authorization::Authorized)
    }
}

/// Exact, case-sensitive comparison. An empty active token authorizes nobody.
pub fn authorize(presented: &str, active: &str) -> Authorization {
    if active.is_empty() {
        return Authorization::Unauthorized;
    }
    if bool::from(presented.as_bytes().ct_eq(active.as_bytes())) {
        Authorization::Authorized
    } else {
        Authorization::Unauthorized
    }
}

pub fn authorize_token(presented: &str, active: Option<&SecurityToken>) -> Authorization {
    authorize(presented, active.map_or("", |t| t.value.as_str()))
}

/// A field as the kiosk renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    /// Buttons to offer; absent for free text entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl From<&Field> for FormField {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id,
            text: field.text.clone(),
            kind: field.kind,
            required: field.required,
            choices: field.choices(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub authorization: Authorization,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub fields: Vec<FormField>,
}

impl SessionView {
    pub fn build(authorization: Authorization, schema: &[Field]) -> Self {
        if authorization.is_authorized() {
            Self {
                authorization,
                message: None,
                fields: schema.iter().map(FormField::from).collect(),
            }
        } else {
            Self {
                authorization,
                message: Some(UNAUTHORIZED_MESSAGE),
                fields: Vec::new(),
            }
        }
    }
}

/// Unsaved input on the kiosk form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub trainee: String,
    pub answers: Answers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Token(Authorization),
    Schema,
}

pub struct KioskSession {
    presented: String,
    tokens: watch::Receiver<Option<SecurityToken>>,
    schema: watch::Receiver<Vec<Field>>,
    authorization: Authorization,
    draft: Draft,
}

impl KioskSession {
    pub fn open(
        presented: impl Into<String>,
        mut tokens: watch::Receiver<Option<SecurityToken>>,
        mut schema: watch::Receiver<Vec<Field>>,
    ) -> Self {
        let presented = presented.into();
        let authorization = authorize_token(&presented, tokens.borrow_and_update().as_ref());
        schema.borrow_and_update();
        Self {
            presented,
            tokens,
            schema,
            authorization,
            draft: Draft::default(),
        }
    }

    pub fn authorization(&self) -> Authorization {
        self.authorization
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    fn reevaluate(&mut self) -> Authorization {
        let next = authorize_token(&self.presented, self.tokens.borrow_and_update().as_ref());
        if self.authorization.is_authorized() && !next.is_authorized() {
            tracing::info!(
                discarded_answers = self.draft.answers.len(),
                "kiosk session revoked by token rotation"
            );
            self.draft = Draft::default();
        }
        self.authorization = next;
        next
    }

    /// Apply a pending token emission without waiting.
    pub fn sync(&mut self) -> Authorization {
        if self.tokens.has_changed().unwrap_or(false) {
            self.reevaluate()
        } else {
            self.authorization
        }
    }

    /// Wait for the next token or schema emission and recompute.
    /// Returns `None` once the feeds are gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            changed = self.tokens.changed() => {
                changed.ok()?;
                Some(SessionEvent::Token(self.reevaluate()))
            }
            changed = self.schema.changed() => {
                changed.ok()?;
                self.schema.borrow_and_update();
                Some(SessionEvent::Schema)
            }
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView::build(self.authorization, &self.schema.borrow())
    }

    pub fn form_state(&self) -> FormState {
        FormState::evaluate(&self.draft.trainee, &self.draft.answers, &self.schema.borrow())
    }

    fn require_authorized(&mut self) -> Result<(), AppError> {
        if self.sync().is_authorized() {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }

    pub fn set_trainee(&mut self, name: impl Into<String>) -> Result<FormState, AppError> {
        self.require_authorized()?;
        self.draft.trainee = name.into();
        Ok(self.form_state())
    }

    pub fn set_answer(&mut self, field_id: Uuid, value: impl Into<String>) -> Result<FormState, AppError> {
        self.require_authorized()?;
        self.draft.answers.insert(field_id.to_string(), value.into());
        Ok(self.form_state())
    }

    /// Validate the draft against the current schema, append it, and reset
    /// the form. The draft is kept if validation or the append fails.
    pub async fn submit(&mut self, logbook: &LogStore) -> Result<CheckInRecord, AppError> {
        self.require_authorized()?;
        validation::check(&self.draft.trainee, &self.draft.answers, &self.schema.borrow())?;
        let record = logbook
            .append(&self.draft.trainee, self.draft.answers.clone())
            .await?;
        self.draft = Draft::default();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn token(value: &str) -> SecurityToken {
        SecurityToken {
            value: value.into(),
            rotated_at: Utc::now(),
        }
    }

    #[test]
    fn test_authorize_exactness() {
        assert_eq!(authorize("", "X"), Authorization::Unauthorized);
        assert_eq!(authorize("abc", "abc"), Authorization::Authorized);
        assert_eq!(authorize("abc", "abcd"), Authorization::Unauthorized);
        assert_eq!(authorize("ABC", "abc"), Authorization::Unauthorized);
        assert_eq!(authorize("", ""), Authorization::Unauthorized);
        assert_eq!(authorize("abc", ""), Authorization::Unauthorized);
    }

    #[test]
    fn test_authorize_without_active_token() {
        assert_eq!(authorize_token("abc", None), Authorization::Unauthorized);
        assert_eq!(
            authorize_token("abc", Some(&token("abc"))),
            Authorization::Authorized
        );
    }

    #[test]
    fn test_view_hides_form_when_unauthorized() {
        let field = Field {
            id: Uuid::new_v4(),
            text: "Q".into(),
            kind: FieldType::Binary,
            options: vec![],
            required: true,
            created_at: Utc::now(),
        };
        let view = SessionView::build(Authorization::Unauthorized, &[field.clone()]);
        assert!(view.fields.is_empty());
        assert!(view.message.is_some());

        let view = SessionView::build(Authorization::Authorized, &[field]);
        assert_eq!(view.fields.len(), 1);
        assert_eq!(view.fields[0].choices.as_ref().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rotation_revokes_and_discards_draft() {
        let (token_tx, token_rx) = watch::channel(Some(token("T1")));
        let (_schema_tx, schema_rx) = watch::channel(Vec::<Field>::new());
        let mut session = KioskSession::open("T1", token_rx, schema_rx);
        assert_eq!(session.authorization(), Authorization::Authorized);

        session.set_trainee("Alice").unwrap();
        session.set_answer(Uuid::new_v4(), "Yes").unwrap();
        assert_eq!(session.draft().answers.len(), 1);

        token_tx.send_replace(Some(token("T2")));
        assert_eq!(
            session.next_event().await,
            Some(SessionEvent::Token(Authorization::Unauthorized))
        );
        assert_eq!(session.draft(), &Draft::default());
        assert!(matches!(session.set_trainee("Alice"), Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_sync_applies_pending_rotation() {
        let (token_tx, token_rx) = watch::channel(Some(token("T1")));
        let (_schema_tx, schema_rx) = watch::channel(Vec::<Field>::new());
        let mut session = KioskSession::open("T1", token_rx, schema_rx);
        token_tx.send_replace(Some(token("T2")));
        assert_eq!(session.sync(), Authorization::Unauthorized);
    }

    #[test]
    fn test_next_event_waits_for_rotation() {
        use tokio_test::{assert_pending, assert_ready};

        let (token_tx, token_rx) = watch::channel(Some(token("T1")));
        let (_schema_tx, schema_rx) = watch::channel(Vec::<Field>::new());
        let mut session = KioskSession::open("T1", token_rx, schema_rx);

        let mut next = tokio_test::task::spawn(session.next_event());
        assert_pending!(next.poll());

        token_tx.send_replace(Some(token("T2")));
        assert!(next.is_woken());
        let event = assert_ready!(next.poll());
        assert_eq!(event, Some(SessionEvent::Token(Authorization::Unauthorized)));
    }

    #[tokio::test]
    async fn test_schema_change_recomputes_form_state() {
        let (_token_tx, token_rx) = watch::channel(Some(token("T1")));
        let (schema_tx, schema_rx) = watch::channel(Vec::<Field>::new());
        let mut session = KioskSession::open("T1", token_rx, schema_rx);
        assert!(session.set_trainee("Alice").unwrap().can_submit);

        let required = Field {
            id: Uuid::new_v4(),
            text: "Badge number".into(),
            kind: FieldType::FreeText,
            options: vec![],
            required: true,
            created_at: Utc::now(),
        };
        schema_tx.send_replace(vec![required]);
        assert_eq!(session.next_event().await, Some(SessionEvent::Schema));
        assert!(!session.form_state().can_submit);
    }

    #[tokio::test]
    async fn test_next_event_ends_when_feeds_close() {
        let (token_tx, token_rx) = watch::channel(Some(token("T1")));
        let (schema_tx, schema_rx) = watch::channel(Vec::<Field>::new());
        let mut session = KioskSession::open("T1", token_rx, schema_rx);
        drop(token_tx);
        drop(schema_tx);
        assert_eq!(session.next_event().await, None);
    }
}
