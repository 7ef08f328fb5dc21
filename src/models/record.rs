use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Answers keyed by field id. Keys of deleted fields are kept as-is.
pub type Answers = BTreeMap<String, String>;

/// One completed trainee submission. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub id: Uuid,
    pub trainee: String,
    #[serde(default)]
    pub answers: Answers,
    pub submitted_at: DateTime<Utc>,
}
