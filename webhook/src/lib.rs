pub mod config;
pub mod email;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod normalize;
pub mod notes_store;
pub mod payload;
pub mod service;
pub mod signature;

#[cfg(test)]
mod testutils;

use crate::email::HttpEmailSender;
use crate::errors::WebhookError;
use crate::handler::WebhookHandler;
use crate::notes_store::NotionClient;
use crate::service::RelayService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Builds the outbound clients from `config` and serves the relay until the listener fails.
pub async fn run(config: config::Config) -> Result<(), WebhookError> {
    config.validate()?;

    if config.notes_store.database_id.is_none() {
        tracing::warn!("No notes store database configured, submissions will not be stored");
    }
    if config.email.notification_email.is_none() {
        tracing::warn!("No notification email configured, no emails will be sent");
    }
    if config.signing_secret.is_none() {
        tracing::warn!("No signing secret configured, webhook signatures are not verified");
    }

    let store = Arc::new(NotionClient::new(&config.notes_store)?);
    let sender = Arc::new(HttpEmailSender::new(&config.email)?);
    let handler = WebhookHandler::new(&config, store, sender);
    let service = RelayService::new(handler, config.listener.max_body_bytes);

    run_http_service(&config.listener.host, config.listener.port, service).await
}
