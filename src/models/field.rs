use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed answer set offered for `Binary` fields.
pub const BINARY_ANSWERS: [&str; 3] = ["Yes", "No", "N/A"];

/// How a field is answered on the kiosk form.
///
/// The aliases accept the labels used by older exports of the form data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[serde(alias = "yesno")]
    Binary,
    #[serde(alias = "radio")]
    Choice,
    #[serde(alias = "input")]
    FreeText,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Binary => "binary",
            FieldType::Choice => "choice",
            FieldType::FreeText => "free_text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "yesno" => Some(FieldType::Binary),
            "choice" | "radio" => Some(FieldType::Choice),
            "free_text" | "freetext" | "text" | "input" => Some(FieldType::FreeText),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prompt on the check-in form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Non-empty iff `kind` is `Choice`.
    pub options: Vec<String>,
    pub required: bool,
    pub created_at: DateTime<Utc>,
}

impl Field {
    /// Key under which this field's answer is stored in a record.
    pub fn answer_key(&self) -> String {
        self.id.to_string()
    }

    /// The answers a kiosk offers for this field, or `None` for free entry.
    pub fn choices(&self) -> Option<Vec<String>> {
        match self.kind {
            FieldType::Binary => Some(BINARY_ANSWERS.iter().map(|s| s.to_string()).collect()),
            FieldType::Choice => Some(self.options.clone()),
            FieldType::FreeText => None,
        }
    }
}

/// Administrator input for creating or editing a field.
///
/// `options` is the raw comma-separated list typed into the admin form.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDraft {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub required: bool,
}

impl FieldDraft {
    pub fn parsed_options(&self) -> Vec<String> {
        self.options
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect()
    }
}
