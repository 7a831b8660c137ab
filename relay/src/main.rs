use clap::{Args, Parser, Subcommand};
use config::{CommonConfig, Config, ConfigError};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod config;

#[derive(Parser)]
#[command(name = "relay", about = "Relays form submission webhooks to Notion and email")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the webhook relay server
    Webhook(ConfigArgs),
    /// Load and validate the configuration, then exit
    CheckConfig(ConfigArgs),
    /// Print the metrics emitted by the relay
    ListMetrics,
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML configuration file. Environment variables override its values.
    #[arg(long, env = "RELAY_CONFIG")]
    config_file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("webhook relay failed: {0}")]
    Webhook(#[from] webhook::errors::WebhookError),
    #[error("could not start metrics exporter: {0}")]
    Metrics(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        CliCommand::Webhook(args) => run_webhook(args),
        CliCommand::CheckConfig(args) => load_config(args).map(|_| println!("Config OK")),
        CliCommand::ListMetrics => {
            println!(
                "{}",
                shared::metrics_defs::describe(webhook::metrics_defs::ALL_METRICS)
            );
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &ConfigArgs) -> Result<Config, CliError> {
    Ok(Config::load(args.config_file.as_deref(), |name| {
        std::env::var(name).ok()
    })?)
}

fn run_webhook(args: &ConfigArgs) -> Result<(), CliError> {
    let config = load_config(args)?;

    // Keep the guard alive for the lifetime of the process so events get flushed.
    let _sentry = init_sentry(&config.common);
    init_tracing(&config.common);
    init_metrics(&config.common)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tracing::info!("Starting webhook relay");
    rt.block_on(webhook::run(config.webhook))?;
    Ok(())
}

fn init_sentry(common: &CommonConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = common.logging.as_ref()?.sentry_dsn.clone()?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn init_tracing(common: &CommonConfig) {
    let level = common
        .logging
        .as_ref()
        .and_then(|logging| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();
}

fn init_metrics(common: &CommonConfig) -> Result<(), CliError> {
    let Some(metrics_config) = &common.metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(metrics_config.statsd_host.clone(), metrics_config.statsd_port)
        .build(Some(&metrics_config.prefix))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    tracing::info!(
        host = %metrics_config.statsd_host,
        port = metrics_config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_webhook_command() {
        let cli = Cli::parse_from(["relay", "webhook", "--config-file", "relay.yaml"]);
        match cli.command {
            CliCommand::Webhook(args) => {
                assert_eq!(args.config_file, Some(PathBuf::from("relay.yaml")));
            }
            _ => panic!("expected webhook command"),
        }
    }

    #[test]
    fn parse_list_metrics() {
        let cli = Cli::parse_from(["relay", "list-metrics"]);
        assert!(matches!(cli.command, CliCommand::ListMetrics));
    }
}
