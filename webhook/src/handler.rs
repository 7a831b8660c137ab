//! Form submission handler.
//!
//! One delivery runs: signature check (when a secret is configured), payload
//! validation, normalization, notes store write, notification emails. The store
//! write always happens before any email. A failure at any step ends the
//! request; earlier side effects are not rolled back.

use crate::config::Config;
use crate::email::{EmailSender, Templates, notify};
use crate::errors::WebhookError;
use crate::normalize::normalize;
use crate::notes_store::{NotesStore, StoreOutcome, persist};
use crate::payload::SubmissionEvent;
use crate::signature::{self, SIGNATURE_HEADER};
use hyper::StatusCode;
use hyper::header::HeaderMap;
use serde_json::{Value, json};
use std::sync::Arc;

const SUCCESS_MESSAGE: &str = "Form response processed successfully";

/// Side effects of one successful delivery
#[derive(Debug)]
pub struct Receipt {
    pub store: StoreOutcome,
    pub emails_sent: usize,
}

pub struct WebhookHandler {
    store: Arc<dyn NotesStore>,
    sender: Arc<dyn EmailSender>,
    templates: Templates,
    database_id: Option<String>,
    notification_email: Option<String>,
    signing_secret: Option<String>,
    redact_error_details: bool,
}

impl WebhookHandler {
    pub fn new(config: &Config, store: Arc<dyn NotesStore>, sender: Arc<dyn EmailSender>) -> Self {
        WebhookHandler {
            store,
            sender,
            templates: Templates::new(&config.email.site_name),
            database_id: config.notes_store.database_id.clone(),
            notification_email: config.email.notification_email.clone(),
            signing_secret: config.signing_secret.clone(),
            redact_error_details: config.redact_error_details,
        }
    }

    /// Runs the delivery and returns what it did.
    pub async fn process(&self, headers: &HeaderMap, body: &[u8]) -> Result<Receipt, WebhookError> {
        if let Some(secret) = &self.signing_secret {
            let header = headers
                .get(SIGNATURE_HEADER)
                .and_then(|value| value.to_str().ok());
            signature::verify(secret, body, header)?;
        }

        let (event, form_response) = SubmissionEvent::parse(body)?;
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            form_id = %form_response.form_id,
            token = %form_response.token,
            answers = form_response.answers.len(),
            "Received form submission"
        );

        let normalized = normalize(&form_response.answers);

        let store = persist(
            self.store.as_ref(),
            self.database_id.as_deref(),
            &normalized.record,
            &form_response.submitted_at,
        )
        .await?;

        let emails_sent = notify(
            self.sender.as_ref(),
            &self.templates,
            self.notification_email.as_deref(),
            &normalized.record,
            normalized.submitter_email.as_deref(),
        )
        .await?;

        Ok(Receipt { store, emails_sent })
    }

    /// Runs the delivery and renders the JSON reply.
    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> (StatusCode, Value) {
        match self.process(headers, body).await {
            Ok(receipt) => {
                tracing::debug!(?receipt, "Form submission processed");
                (
                    StatusCode::OK,
                    json!({ "success": true, "message": SUCCESS_MESSAGE }),
                )
            }
            Err(e) => self.error_reply(&e),
        }
    }

    pub fn error_reply(&self, error: &WebhookError) -> (StatusCode, Value) {
        let status = error.status_code();
        let body = match error {
            WebhookError::MalformedPayload(reason) => {
                tracing::warn!(reason = %reason, "Rejected webhook payload");
                json!({ "error": "Invalid webhook payload" })
            }
            WebhookError::InvalidSignature(e) => {
                tracing::warn!(error = %e, "Rejected webhook signature");
                json!({ "error": "Invalid webhook signature" })
            }
            WebhookError::PayloadTooLarge(_) => json!({ "error": "Payload too large" }),
            WebhookError::RequestBodyError(_) => json!({ "error": "Invalid webhook payload" }),
            _ => {
                tracing::error!(error = %error, "Error processing form submission");
                let details = if self.redact_error_details {
                    "Internal error".to_string()
                } else {
                    error.to_string()
                };
                json!({ "error": "Failed to process webhook", "details": details })
            }
        };

        (status, body)
    }
}
