use crate::config::EmailConfig;
use crate::metrics_defs::EMAIL_SENDS;
use crate::normalize::NormalizedRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Email request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email API rejected message ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Email endpoint is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Posts messages as JSON (`{"to", "subject", "text"}`) to an email API endpoint.
pub struct HttpEmailSender {
    client: reqwest::Client,
    endpoint: Option<Url>,
    auth_token: Option<String>,
}

impl HttpEmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpEmailSender {
            client,
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let endpoint = self.endpoint.as_ref().ok_or(EmailError::NotConfigured)?;

        let mut request = self.client.post(endpoint.clone()).json(message);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmailError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

/// Subjects and bodies of the two notification emails.
#[derive(Debug, Clone)]
pub struct Templates {
    site_name: String,
}

impl Templates {
    pub fn new(site_name: &str) -> Self {
        Templates {
            site_name: site_name.to_string(),
        }
    }

    pub fn operator_notice(
        &self,
        to: &str,
        record: &NormalizedRecord,
        submitter: Option<&str>,
    ) -> EmailMessage {
        let details = record
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");

        // The submitter paragraph stays in place, empty, when there is no address.
        let sections = [
            format!("New form submission received from {} website!", self.site_name),
            format!("Form Details:\n{details}"),
            submitter
                .map(|submitter| format!("Submitted by: {submitter}"))
                .unwrap_or_default(),
            format!(
                "---\nThis is an automated notification from your {} integration.",
                self.site_name
            ),
        ];

        EmailMessage {
            to: to.to_string(),
            subject: format!("New Form Submission - {}", self.site_name),
            text: sections.join("\n\n"),
        }
    }

    pub fn thank_you(&self, to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("Thank you for your submission - {}", self.site_name),
            text: format!(
                "Thank you for submitting the form! We've received your information and will get back to you soon.\n\nBest regards,\n{} Team",
                self.site_name
            ),
        }
    }
}

/// Sends the operator notice and, when the submitter is a different address, a thank-you.
///
/// Nothing is sent without an operator address, even if the submitter is known.
/// Returns the number of messages sent.
pub async fn notify(
    sender: &dyn EmailSender,
    templates: &Templates,
    operator: Option<&str>,
    record: &NormalizedRecord,
    submitter: Option<&str>,
) -> Result<usize, EmailError> {
    if submitter.is_none() && operator.is_none() {
        return Ok(0);
    }

    let Some(operator) = operator else {
        tracing::warn!("Notification email not set, skipping email notification");
        return Ok(0);
    };

    send_counted(
        sender,
        "operator",
        &templates.operator_notice(operator, record, submitter),
    )
    .await?;
    let mut sent = 1;

    if let Some(submitter) = submitter.filter(|address| *address != operator) {
        send_counted(sender, "thank_you", &templates.thank_you(submitter)).await?;
        sent += 1;
    }

    Ok(sent)
}

async fn send_counted(
    sender: &dyn EmailSender,
    kind: &'static str,
    message: &EmailMessage,
) -> Result<(), EmailError> {
    match sender.send(message).await {
        Ok(()) => {
            tracing::info!(kind, "Sent notification email");
            shared::counter!(EMAIL_SENDS, "kind" => kind, "outcome" => "sent").increment(1);
            Ok(())
        }
        Err(e) => {
            shared::counter!(EMAIL_SENDS, "kind" => kind, "outcome" => "failed").increment(1);
            Err(e)
        }
    }
}
