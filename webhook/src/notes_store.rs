//! Notes store client (Notion database pages) and the store dispatch step.
//!
//! Each submission becomes one page in the configured database. Properties are
//! the fixed `Submitted At` date plus one property per normalized answer:
//!
//! | value   | property    |
//! |---------|-------------|
//! | String  | `rich_text` |
//! | Number  | `number`    |
//! | Boolean | `checkbox`  |

use crate::config::NotesStoreConfig;
use crate::metrics_defs::NOTES_STORE_WRITES;
use crate::normalize::{FieldValue, NormalizedRecord};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const SUBMITTED_AT: &str = "Submitted At";

/// Notion rejects rich text segments longer than this many characters.
const RICH_TEXT_SEGMENT_CHARS: usize = 2000;

#[derive(Error, Debug)]
pub enum NotesStoreError {
    #[error("Notes store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notes store rejected record ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid notes store URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Date { start: String },
    RichText(Vec<RichText>),
    Number(Number),
    Checkbox(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichText {
    pub text: TextContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub content: String,
}

pub type Properties = IndexMap<String, PropertyValue>;

/// Handle of a created record
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordHandle {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait NotesStore: Send + Sync {
    async fn create_record(
        &self,
        database_id: &str,
        properties: &Properties,
    ) -> Result<RecordHandle, NotesStoreError>;
}

/// Builds the page properties for one submission.
///
/// A record key equal to [`SUBMITTED_AT`] replaces the date property.
pub fn build_properties(record: &NormalizedRecord, submitted_at: &str) -> Properties {
    let mut properties = Properties::with_capacity(record.len() + 1);
    properties.insert(
        SUBMITTED_AT.to_string(),
        PropertyValue::Date {
            start: submitted_at.to_string(),
        },
    );

    for (key, value) in record {
        let property = match value {
            FieldValue::String(s) => PropertyValue::RichText(rich_text(s)),
            FieldValue::Number(n) => PropertyValue::Number(n.clone()),
            FieldValue::Boolean(b) => PropertyValue::Checkbox(*b),
        };
        properties.insert(key.clone(), property);
    }

    properties
}

fn rich_text(value: &str) -> Vec<RichText> {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return vec![text_segment(String::new())];
    }

    chars
        .chunks(RICH_TEXT_SEGMENT_CHARS)
        .map(|chunk| text_segment(chunk.iter().collect()))
        .collect()
}

fn text_segment(content: String) -> RichText {
    RichText {
        text: TextContent { content },
    }
}

#[derive(Debug)]
pub enum StoreOutcome {
    Created(RecordHandle),
    /// No database configured
    Skipped,
}

/// Writes the record to the notes store, or skips when no database is configured.
///
/// Failures are returned as-is; nothing is retried.
pub async fn persist(
    store: &dyn NotesStore,
    database_id: Option<&str>,
    record: &NormalizedRecord,
    submitted_at: &str,
) -> Result<StoreOutcome, NotesStoreError> {
    let Some(database_id) = database_id else {
        tracing::warn!("Notes store database id not set, skipping record creation");
        shared::counter!(NOTES_STORE_WRITES, "outcome" => "skipped").increment(1);
        return Ok(StoreOutcome::Skipped);
    };

    let properties = build_properties(record, submitted_at);

    match store.create_record(database_id, &properties).await {
        Ok(handle) => {
            tracing::info!(record_id = %handle.id, "Created notes store record");
            shared::counter!(NOTES_STORE_WRITES, "outcome" => "created").increment(1);
            Ok(StoreOutcome::Created(handle))
        }
        Err(e) => {
            shared::counter!(NOTES_STORE_WRITES, "outcome" => "failed").increment(1);
            Err(e)
        }
    }
}

#[derive(Serialize)]
struct CreatePageRequest<'a> {
    parent: Parent<'a>,
    properties: &'a Properties,
}

#[derive(Serialize)]
struct Parent<'a> {
    database_id: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Notion REST client creating database pages.
pub struct NotionClient {
    client: reqwest::Client,
    pages_url: Url,
    api_token: Option<String>,
    notion_version: String,
}

impl NotionClient {
    pub fn new(config: &NotesStoreConfig) -> Result<Self, NotesStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut pages_url = config.base_url.clone();
        pages_url
            .path_segments_mut()
            .map_err(|_| NotesStoreError::InvalidUrl(config.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1", "pages"]);

        Ok(NotionClient {
            client,
            pages_url,
            api_token: config.api_token.clone(),
            notion_version: config.notion_version.clone(),
        })
    }
}

#[async_trait]
impl NotesStore for NotionClient {
    async fn create_record(
        &self,
        database_id: &str,
        properties: &Properties,
    ) -> Result<RecordHandle, NotesStoreError> {
        let body = CreatePageRequest {
            parent: Parent { database_id },
            properties,
        };

        let mut request = self
            .client
            .post(self.pages_url.clone())
            .header("Notion-Version", &self.notion_version)
            .json(&body);

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            return Err(NotesStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<RecordHandle>().await?)
    }
}
