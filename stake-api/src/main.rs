//! Staking ledger HTTP server binary

use anyhow::Context;
use stake_ledger::{Config, Ledger};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<Config> {
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config file {}", path))?
            .with_env_overrides()?,
        Err(_) => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true);

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_format);

    info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting staking ledger server"
    );

    let addr = config.http_listen_addr.clone();
    let ledger = Arc::new(Ledger::open(config).await.context("Failed to open ledger")?);
    info!("Ledger opened successfully");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    stake_api::serve(listener, ledger, stake_api::shutdown_signal()).await?;

    info!("Staking ledger server stopped");
    Ok(())
}
