use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use webhook::config::{Config as WebhookConfig, ValidationError};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Reads the optional file, overlays the environment and validates.
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dsn) = lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()) {
            config
                .common
                .logging
                .get_or_insert_with(LoggingConfig::default)
                .sentry_dsn = Some(dsn);
        }

        config.webhook.apply_env(lookup)?;
        config.webhook.validate()?;

        Ok(config)
    }
}

fn default_metrics_prefix() -> String {
    "form_relay".into()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}
