use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single shared secret currently embedded in the kiosk code.
///
/// Exactly one is active at a time; rotation replaces the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecurityToken {
    pub value: String,
    pub rotated_at: DateTime<Utc>,
}
