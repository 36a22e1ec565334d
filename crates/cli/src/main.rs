mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convoy_core::{load_config, metrics, validate_config, Config};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json);

    match run(cli).await {
        Ok(false) => {}
        Ok(true) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Runs the command. Returns `true` when the process should exit non-zero.
async fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => Config::default(),
    };
    validate_config(&config).context("Configuration validation failed")?;

    let failed = match cli.command {
        Command::Convert(args) => commands::convert(&config, args).await?,
        Command::Merge(args) => commands::merge(&config, args).await?,
        Command::Formats { path } => {
            commands::formats(&path);
            false
        }
        Command::Presets(command) => {
            commands::presets(&config, command).await?;
            false
        }
        Command::Doctor => commands::doctor(&config),
    };

    if cli.metrics {
        print_metrics()?;
    }
    Ok(failed)
}

fn print_metrics() -> Result<()> {
    let registry = Registry::new();
    for metric in metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metric")?;
    }
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    print!("{}", String::from_utf8_lossy(&buffer));
    Ok(())
}
