use crate::metrics_defs::ANSWERS_SKIPPED;
use crate::payload::{Answer, AnswerValue};
use indexmap::IndexMap;
use serde_json::Number;
use std::fmt;

/// Scalar forwarded for one answer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(Number),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Field key to value, in first-insertion order.
pub type NormalizedRecord = IndexMap<String, FieldValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub record: NormalizedRecord,
    /// Value of the last non-empty email answer
    pub submitter_email: Option<String>,
    /// Answers that produced no entry
    pub skipped: usize,
}

/// Flattens answers into a record keyed by field ref (or id).
///
/// Answers whose value is missing or empty, and answers of unsupported kinds,
/// are dropped. A later answer with the same key replaces the earlier value.
pub fn normalize(answers: &[Answer]) -> Normalized {
    let mut normalized = Normalized::default();

    for answer in answers {
        let key = answer.field.key();

        let value = match &answer.value {
            AnswerValue::Email(email) => non_empty(email).map(|email| {
                normalized.submitter_email = Some(email.to_string());
                FieldValue::String(email.to_string())
            }),
            AnswerValue::Text(text) => non_empty(text).map(|s| FieldValue::String(s.to_string())),
            AnswerValue::Choice(label) => {
                non_empty(label).map(|s| FieldValue::String(s.to_string()))
            }
            AnswerValue::Url(url) => non_empty(url).map(|s| FieldValue::String(s.to_string())),
            AnswerValue::Number(number) => number.clone().map(FieldValue::Number),
            AnswerValue::Boolean(boolean) => boolean.map(FieldValue::Boolean),
            AnswerValue::Unsupported(_) => None,
        };

        match value {
            Some(value) => {
                normalized.record.insert(key.to_string(), value);
            }
            None => {
                tracing::debug!(field = key, kind = answer.value.kind(), "Skipping answer");
                normalized.skipped += 1;
            }
        }
    }

    if normalized.skipped > 0 {
        shared::counter!(ANSWERS_SKIPPED).increment(normalized.skipped as u64);
    }

    normalized
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
