//! Form validation engine.
//!
//! Decides whether a (trainee, answers) pair may be submitted against the
//! current schema. Everything here is pure; callers re-run it on every change
//! to the draft or the schema instead of caching a verdict.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Answers, Field};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("trainee name is required")]
    MissingTrainee,

    #[error("{} required field(s) unanswered", .0.len())]
    MissingAnswers(Vec<Uuid>),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingTrainee => "missing_trainee",
            ValidationError::MissingAnswers(_) => "missing_required_answers",
        }
    }
}

fn is_blank(value: Option<&String>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Required fields in `schema` with no non-blank answer, in schema order.
pub fn missing_required(answers: &Answers, schema: &[Field]) -> Vec<Uuid> {
    schema
        .iter()
        .filter(|f| f.required && is_blank(answers.get(&f.answer_key())))
        .map(|f| f.id)
        .collect()
}

pub fn check(trainee: &str, answers: &Answers, schema: &[Field]) -> Result<(), ValidationError> {
    if trainee.trim().is_empty() {
        return Err(ValidationError::MissingTrainee);
    }
    let missing = missing_required(answers, schema);
    if !missing.is_empty() {
        return Err(ValidationError::MissingAnswers(missing));
    }
    Ok(())
}

pub fn is_valid(trainee: &str, answers: &Answers, schema: &[Field]) -> bool {
    check(trainee, answers, schema).is_ok()
}

/// What the kiosk form shows for the current draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormState {
    pub can_submit: bool,
    pub label: &'static str,
    pub missing_trainee: bool,
    pub missing_fields: Vec<Uuid>,
}

impl FormState {
    pub fn evaluate(trainee: &str, answers: &Answers, schema: &[Field]) -> Self {
        let missing_trainee = trainee.trim().is_empty();
        let missing_fields = missing_required(answers, schema);
        let can_submit = !missing_trainee && missing_fields.is_empty();
        let label = if can_submit {
            "SUBMIT CHECK IN"
        } else if missing_trainee {
            "ENTER TRAINEE NAME"
        } else {
            "COMPLETE REQUIRED FIELDS"
        };
        Self {
            can_submit,
            label,
            missing_trainee,
            missing_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use chrono::Utc;

    fn field(required: bool) -> Field {
        Field {
            id: Uuid::new_v4(),
            text: "PPE worn?".into(),
            kind: FieldType::Binary,
            options: vec![],
            required,
            created_at: Utc::now(),
        }
    }

    fn answers(pairs: &[(&Field, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(f, v)| (f.answer_key(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_required_field_enforced() {
        let f1 = field(true);
        let schema = vec![f1.clone()];
        assert!(!is_valid("Alice", &Answers::new(), &schema));
        assert!(is_valid("Alice", &answers(&[(&f1, "Yes")]), &schema));
    }

    #[test]
    fn test_blank_answer_counts_as_missing() {
        let f1 = field(true);
        let schema = vec![f1.clone()];
        assert_eq!(
            check("Alice", &answers(&[(&f1, "   ")]), &schema),
            Err(ValidationError::MissingAnswers(vec![f1.id]))
        );
    }

    #[test]
    fn test_blank_trainee_always_invalid() {
        let f1 = field(false);
        let schema = vec![f1.clone()];
        let full = answers(&[(&f1, "Yes")]);
        for name in ["", " ", "\t\n"] {
            assert!(!is_valid(name, &full, &schema));
            assert_eq!(check(name, &full, &schema), Err(ValidationError::MissingTrainee));
        }
    }

    #[test]
    fn test_optional_fields_may_be_skipped() {
        let schema = vec![field(false), field(false)];
        assert!(is_valid("Bob", &Answers::new(), &schema));
    }

    #[test]
    fn test_empty_schema_needs_only_trainee() {
        assert!(is_valid("Bob", &Answers::new(), &[]));
    }

    #[test]
    fn test_missing_reported_in_schema_order() {
        let (a, b, c) = (field(true), field(false), field(true));
        let schema = vec![a.clone(), b, c.clone()];
        assert_eq!(missing_required(&Answers::new(), &schema), vec![a.id, c.id]);
    }

    #[test]
    fn test_form_state_labels() {
        let f1 = field(true);
        let schema = vec![f1.clone()];

        let state = FormState::evaluate("", &Answers::new(), &schema);
        assert!(!state.can_submit);
        assert_eq!(state.label, "ENTER TRAINEE NAME");

        let state = FormState::evaluate("Alice", &Answers::new(), &schema);
        assert_eq!(state.label, "COMPLETE REQUIRED FIELDS");
        assert_eq!(state.missing_fields, vec![f1.id]);

        let state = FormState::evaluate("Alice", &answers(&[(&f1, "No")]), &schema);
        assert!(state.can_submit);
        assert_eq!(state.label, "SUBMIT CHECK IN");
    }
}
