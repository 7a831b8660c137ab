use crate::config::ValidationError;
use crate::email::EmailError;
use crate::notes_store::NotesStoreError;
use crate::signature::SignatureError;
use hyper::StatusCode;
use thiserror::Error;

/// Errors that can occur while relaying a form submission
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Body missing `form_response` or not matching the submission model
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error(transparent)]
    NotesStore(#[from] NotesStoreError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MalformedPayload(_) | WebhookError::RequestBodyError(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::NotesStore(_)
            | WebhookError::Email(_)
            | WebhookError::Config(_)
            | WebhookError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Failures of an outbound collaborator, as opposed to a bad request.
    pub fn is_downstream(&self) -> bool {
        matches!(self, WebhookError::NotesStore(_) | WebhookError::Email(_))
    }
}
