use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("max_body_bytes must be greater than 0")]
    InvalidBodyLimit,

    #[error("notes_store.database_id is set but notes_store.api_token is missing")]
    MissingNotesStoreToken,

    #[error("email.notification_email is set but email.endpoint is missing")]
    MissingEmailEndpoint,

    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar { name: &'static str, value: String },
}

/// Webhook relay configuration
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the public webhook and health endpoints
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub notes_store: NotesStoreConfig,
    #[serde(default)]
    pub email: EmailConfig,
    /// Shared secret for `Typeform-Signature` verification. Unset disables the check.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Replace downstream error text in 500 responses with a generic message.
    #[serde(default)]
    pub redact_error_details: bool,
}

impl Config {
    /// Overlays values from the environment on top of the file configuration.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a closure over a map.
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(port) = get("API_PORT") {
            self.listener.port = port.parse().map_err(|_| ValidationError::InvalidEnvVar {
                name: "API_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(host) = get("API_HOST") {
            self.listener.host = host;
        }
        if let Some(database_id) = get("NOTION_DATABASE_ID") {
            self.notes_store.database_id = Some(database_id);
        }
        if let Some(token) = get("NOTION_API_KEY") {
            self.notes_store.api_token = Some(token);
        }
        if let Some(address) = get("NOTIFICATION_EMAIL") {
            self.email.notification_email = Some(address);
        }
        if let Some(endpoint) = get("EMAIL_API_URL") {
            let url = Url::parse(&endpoint).map_err(|_| ValidationError::InvalidEnvVar {
                name: "EMAIL_API_URL",
                value: endpoint.clone(),
            })?;
            self.email.endpoint = Some(url);
        }
        if let Some(token) = get("EMAIL_API_TOKEN") {
            self.email.auth_token = Some(token);
        }
        if let Some(secret) = get("TYPEFORM_WEBHOOK_SECRET") {
            self.signing_secret = Some(secret);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.notes_store.database_id.is_some() && self.notes_store.api_token.is_none() {
            return Err(ValidationError::MissingNotesStoreToken);
        }

        if self.email.notification_email.is_some() && self.email.endpoint.is_none() {
            return Err(ValidationError::MissingEmailEndpoint);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on accepted request bodies
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Notion database the submissions are written to
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NotesStoreConfig {
    /// Target database. Unset skips persistence.
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_notion_url")]
    pub base_url: Url,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotesStoreConfig {
    fn default() -> Self {
        NotesStoreConfig {
            database_id: None,
            api_token: None,
            base_url: default_notion_url(),
            notion_version: default_notion_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Outbound email API and notification addresses
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EmailConfig {
    /// Operator address receiving every submission. Unset disables all emails.
    #[serde(default)]
    pub notification_email: Option<String>,
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Brand used in subjects and bodies
    #[serde(default = "default_site_name")]
    pub site_name: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            notification_email: None,
            endpoint: None,
            auth_token: None,
            site_name: default_site_name(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3001
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_notion_url() -> Url {
    Url::parse("https://api.notion.com").expect("static URL is valid")
}

fn default_notion_version() -> String {
    "2022-06-28".into()
}

fn default_site_name() -> String {
    "SoleMuchBetter".into()
}

fn default_timeout_secs() -> u64 {
    30
}
