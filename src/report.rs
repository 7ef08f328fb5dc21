//! Report views over the check-in log: search filtering and the tabular
//! projection handed to the export renderer.

use serde::Serialize;

use crate::models::{CheckInRecord, Field};

/// Rendered for a field the record has no answer for.
pub const MISSING_ANSWER: &str = "-";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn matches(record: &CheckInRecord, needle: &str) -> bool {
    record.trainee.to_lowercase().contains(needle)
        || record
            .answers
            .values()
            .any(|v| v.to_lowercase().contains(needle))
}

/// Case-insensitive search over trainee names and every answer value,
/// including answers to fields that no longer exist. Keeps input order.
pub fn filter<'a, I>(logs: I, search_term: &str) -> Vec<&'a CheckInRecord>
where
    I: IntoIterator<Item = &'a CheckInRecord>,
{
    let needle = search_term.to_lowercase();
    logs.into_iter().filter(|r| matches(r, &needle)).collect()
}

fn columns(schema: &[Field]) -> Vec<&Field> {
    let mut columns: Vec<&Field> = schema.iter().collect();
    columns.sort_by_key(|f| f.created_at);
    columns
}

/// One row per record: trainee, submission date, then one answer per field
/// in form order.
pub fn project_for_export<'a, I>(logs: I, schema: &[Field]) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = &'a CheckInRecord>,
{
    let columns = columns(schema);
    logs.into_iter()
        .map(|record| {
            let mut row = Vec::with_capacity(columns.len() + 2);
            row.push(record.trainee.clone());
            row.push(record.submitted_at.format(DATE_FORMAT).to_string());
            for field in &columns {
                let answer = record
                    .answers
                    .get(&field.answer_key())
                    .filter(|v| !v.is_empty())
                    .map(String::as_str)
                    .unwrap_or(MISSING_ANSWER);
                row.push(answer.to_string());
            }
            row
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn export_table<'a, I>(logs: I, schema: &[Field]) -> ExportTable
where
    I: IntoIterator<Item = &'a CheckInRecord>,
{
    let mut headers = vec!["TRAINEE".to_string(), "DATE".to_string()];
    headers.extend(columns(schema).iter().map(|f| f.text.to_uppercase()));
    ExportTable {
        headers,
        rows: project_for_export(logs, schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answers, FieldType};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn field(text: &str, offset_secs: i64) -> Field {
        Field {
            id: Uuid::new_v4(),
            text: text.into(),
            kind: FieldType::Binary,
            options: vec![],
            required: false,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
        }
    }

    fn record(trainee: &str, answers: &[(&str, &str)]) -> CheckInRecord {
        CheckInRecord {
            id: Uuid::new_v4(),
            trainee: trainee.into(),
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Answers>(),
            submitted_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_filter_matches_answer_values() {
        let logs = vec![record("Alice", &[("f1", "Yes")]), record("Bob", &[("f1", "No")])];
        let hits = filter(&logs, "yes");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].trainee, "Alice");
    }

    #[test]
    fn test_filter_matches_trainee_case_insensitive() {
        let logs = vec![record("Alice", &[]), record("Bob", &[])];
        let hits = filter(&logs, "BO");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].trainee, "Bob");
    }

    #[test]
    fn test_empty_term_keeps_everything_in_order() {
        let logs = vec![record("C", &[]), record("A", &[]), record("B", &[])];
        let names: Vec<&str> = filter(&logs, "").iter().map(|r| r.trainee.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_filter_searches_orphaned_answers() {
        let logs = vec![record("Alice", &[("deleted-field", "forklift")])];
        assert_eq!(filter(&logs, "fork").len(), 1);
    }

    #[test]
    fn test_projection_orders_columns_by_creation() {
        let later = field("Gloves", 20);
        let earlier = field("Helmet", 10);
        let schema = vec![later.clone(), earlier.clone()];
        let (earlier_key, later_key) = (earlier.id.to_string(), later.id.to_string());
        let logs = vec![record("Alice", &[(earlier_key.as_str(), "Yes"), (later_key.as_str(), "No")])];
        assert_eq!(
            project_for_export(&logs, &schema),
            vec![vec!["Alice", "2026-03-14", "Yes", "No"]]
        );
    }

    #[test]
    fn test_projection_placeholder_for_missing() {
        let f = field("Helmet", 0);
        let key = f.id.to_string();
        let logs = vec![record("Alice", &[]), record("Bob", &[(key.as_str(), "")])];
        let rows = project_for_export(&logs, &[f]);
        assert_eq!(rows[0][2], MISSING_ANSWER);
        assert_eq!(rows[1][2], MISSING_ANSWER);
    }

    #[test]
    fn test_export_table_headers() {
        let schema = vec![field("gloves on?", 2), field("helmet", 1)];
        let table = export_table(&Vec::<CheckInRecord>::new(), &schema);
        assert_eq!(table.headers, vec!["TRAINEE", "DATE", "HELMET", "GLOVES ON?"]);
        assert!(table.rows.is_empty());
    }
}
