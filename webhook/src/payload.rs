//! Typeform webhook payload model.
//!
//! Only the parts of the submission event the relay reads are modelled. Unknown
//! keys are ignored and metadata may be null. Answer values with the wrong JSON
//! type fail deserialization.
//!
//! ```json
//! {
//!   "event_id": "01H...",
//!   "event_type": "form_response",
//!   "form_response": {
//!     "form_id": "F1",
//!     "token": "T1",
//!     "landed_at": "2024-01-01T00:00:00Z",
//!     "submitted_at": "2024-01-01T00:00:00Z",
//!     "answers": [
//!       {"field": {"id": "q1", "ref": "email_field", "type": "email"}, "type": "email", "email": "user@co.com"}
//!     ]
//!   }
//! }
//! ```

use crate::errors::WebhookError;
use serde::Deserialize;
use serde_json::Number;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(default)]
    pub form_response: Option<FormResponse>,
}

impl SubmissionEvent {
    /// Parses a raw request body and returns the event with its form response.
    pub fn parse(body: &[u8]) -> Result<(Self, FormResponse), WebhookError> {
        let mut event: SubmissionEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        match event.form_response.take() {
            Some(form_response) => Ok((event, form_response)),
            None => Err(WebhookError::MalformedPayload(
                "missing form_response".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub form_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    #[serde(default)]
    pub landed_at: Option<String>,
    pub submitted_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answers: Vec<Answer>,
    /// Field definitions sent along with the answers. Not used for processing.
    #[serde(default)]
    pub definition: Option<Definition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Definition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Identifies the question an answer belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldRef {
    pub id: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl FieldRef {
    /// The stable `ref` when the form defines one, the provider id otherwise.
    pub fn key(&self) -> &str {
        match self.reference.as_deref() {
            Some(reference) if !reference.is_empty() => reference,
            _ => &self.id,
        }
    }
}

/// One answer, discriminated by the provider's `type` tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAnswer")]
pub struct Answer {
    pub field: FieldRef,
    pub value: AnswerValue,
}

/// Value carried by an answer. `None` means the tag was present but its value field was not.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Email(Option<String>),
    Text(Option<String>),
    Number(Option<Number>),
    Boolean(Option<bool>),
    Choice(Option<String>),
    Url(Option<String>),
    /// Any tag the relay does not forward (dates, file uploads, multi-choice...).
    /// Empty when the answer carried no tag at all.
    Unsupported(String),
}

impl AnswerValue {
    pub fn kind(&self) -> &str {
        match self {
            AnswerValue::Email(_) => "email",
            AnswerValue::Text(_) => "text",
            AnswerValue::Number(_) => "number",
            AnswerValue::Boolean(_) => "boolean",
            AnswerValue::Choice(_) => "choice",
            AnswerValue::Url(_) => "url",
            AnswerValue::Unsupported(tag) => tag,
        }
    }
}

#[derive(Deserialize)]
struct RawAnswer {
    field: FieldRef,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    number: Option<Number>,
    #[serde(default)]
    boolean: Option<bool>,
    #[serde(default)]
    choice: Option<RawChoice>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawChoice {
    #[serde(default)]
    label: Option<String>,
}

impl From<RawAnswer> for Answer {
    fn from(raw: RawAnswer) -> Self {
        let kind = raw.kind.unwrap_or_default();
        let value = match kind.as_str() {
            "email" => AnswerValue::Email(raw.email),
            "text" => AnswerValue::Text(raw.text),
            "number" => AnswerValue::Number(raw.number),
            "boolean" => AnswerValue::Boolean(raw.boolean),
            "choice" => AnswerValue::Choice(raw.choice.and_then(|choice| choice.label)),
            "url" => AnswerValue::Url(raw.url),
            _ => AnswerValue::Unsupported(kind),
        };

        Answer {
            field: raw.field,
            value,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_answer(value: serde_json::Value) -> Answer {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_full_event() {
        let body = json!({
            "event_id": "evt-1",
            "event_type": "form_response",
            "form_response": {
                "form_id": "F1",
                "token": "T1",
                "landed_at": "2024-01-01T00:00:00Z",
                "submitted_at": "2024-01-01T00:01:00Z",
                "answers": [
                    {"field": {"id": "q1", "ref": "email_field", "type": "email"}, "type": "email", "email": "user@co.com"},
                    {"field": {"id": "q2", "type": "number"}, "type": "number", "number": 42}
                ],
                "definition": {
                    "fields": [{"id": "q1", "title": "Your email", "type": "email", "ref": "email_field"}]
                }
            }
        });

        let (event, form_response) = SubmissionEvent::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.event_id, "evt-1");
        assert_eq!(form_response.form_id, "F1");
        assert_eq!(form_response.submitted_at, "2024-01-01T00:01:00Z");
        assert_eq!(form_response.answers.len(), 2);
        assert_eq!(form_response.answers[0].field.key(), "email_field");
        assert_eq!(
            form_response.answers[0].value,
            AnswerValue::Email(Some("user@co.com".into()))
        );
        assert_eq!(
            form_response.answers[1].value,
            AnswerValue::Number(Some(Number::from(42)))
        );
        assert_eq!(form_response.definition.unwrap().fields[0].title, "Your email");
    }

    #[test]
    fn test_missing_form_response() {
        let err = SubmissionEvent::parse(br#"{"event_id": "evt-1"}"#).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));

        let err = SubmissionEvent::parse(br#"{"form_response": null}"#).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn test_not_json() {
        let err = SubmissionEvent::parse(b"form_response=1").unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn test_wrong_value_type_rejected() {
        let body = json!({
            "form_response": {
                "submitted_at": "2024-01-01T00:00:00Z",
                "answers": [{"field": {"id": "q1"}, "type": "number", "number": "seven"}]
            }
        });
        let err = SubmissionEvent::parse(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn test_null_or_missing_answers() {
        let body = br#"{"form_response": {"submitted_at": "2024-01-01T00:00:00Z", "answers": null}}"#;
        let (_, form_response) = SubmissionEvent::parse(body).unwrap();
        assert!(form_response.answers.is_empty());

        let body = br#"{"form_response": {"submitted_at": "2024-01-01T00:00:00Z"}}"#;
        let (_, form_response) = SubmissionEvent::parse(body).unwrap();
        assert!(form_response.answers.is_empty());
    }

    #[test]
    fn test_answer_kinds() {
        let answer = parse_answer(json!({"field": {"id": "q"}, "type": "choice", "choice": {"label": "Blue"}}));
        assert_eq!(answer.value, AnswerValue::Choice(Some("Blue".into())));

        let answer = parse_answer(json!({"field": {"id": "q"}, "type": "boolean", "boolean": false}));
        assert_eq!(answer.value, AnswerValue::Boolean(Some(false)));

        let answer = parse_answer(json!({"field": {"id": "q"}, "type": "url", "url": "https://x.io"}));
        assert_eq!(answer.value, AnswerValue::Url(Some("https://x.io".into())));

        // Tag present, value field absent
        let answer = parse_answer(json!({"field": {"id": "q"}, "type": "text"}));
        assert_eq!(answer.value, AnswerValue::Text(None));
    }

    #[test]
    fn test_unsupported_kind() {
        let answer = parse_answer(json!({"field": {"id": "q"}, "type": "date", "date": "2024-01-01"}));
        assert_eq!(answer.value, AnswerValue::Unsupported("date".into()));
        assert_eq!(answer.value.kind(), "date");
    }

    #[test]
    fn test_untagged_answer_is_unsupported() {
        let answer = parse_answer(json!({"field": {"id": "q"}, "text": "x"}));
        assert_eq!(answer.value, AnswerValue::Unsupported(String::new()));

        let answer = parse_answer(json!({"field": {"id": "q"}, "type": null, "text": "x"}));
        assert_eq!(answer.value, AnswerValue::Unsupported(String::new()));
    }

    #[test]
    fn test_null_metadata_accepted() {
        let body = json!({
            "event_id": null,
            "event_type": null,
            "form_response": {
                "form_id": null,
                "token": null,
                "submitted_at": "2024-01-01T00:00:00Z",
                "answers": [{"field": {"id": "q1"}, "type": "text", "text": "hi"}],
                "definition": {"fields": null}
            }
        });
        let (event, form_response) = SubmissionEvent::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.event_id, "");
        assert_eq!(event.event_type, "");
        assert_eq!(form_response.form_id, "");
        assert_eq!(form_response.token, "");
        assert!(form_response.definition.unwrap().fields.is_empty());
        assert_eq!(form_response.answers[0].value, AnswerValue::Text(Some("hi".into())));

        let body = json!({
            "form_response": {
                "submitted_at": "2024-01-01T00:00:00Z",
                "definition": {"fields": [{"id": null, "title": null, "type": null}]}
            }
        });
        let (_, form_response) = SubmissionEvent::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(form_response.definition.unwrap().fields[0].title, "");
    }

    #[test]
    fn test_field_key_falls_back_to_id() {
        let field = FieldRef {
            id: "q1".into(),
            reference: None,
            kind: None,
        };
        assert_eq!(field.key(), "q1");

        let field = FieldRef {
            id: "q1".into(),
            reference: Some(String::new()),
            kind: None,
        };
        assert_eq!(field.key(), "q1");
    }
}
