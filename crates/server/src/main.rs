mod bootstrap;
mod clients;
mod health;

use std::time::Duration;

use anyhow::Result;
use faqbot_core::config::{load_env_file, AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use faqbot_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

// Interactions are I/O bound; one thread interleaves them at await points.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let env_file = load_env_file(None)?;
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);
    if let Some(path) = env_file {
        tracing::info!(
            event_name = "system.config.env_file_loaded",
            correlation_id = "bootstrap",
            path = %path.display(),
            "environment file applied"
        );
    }

    let app = bootstrap::bootstrap(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.relay.downgrade(), app.registration.is_registered()),
    )
    .await?;

    let gateway_runner = app.gateway_runner;
    let mut gateway = tokio::spawn(async move { gateway_runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        guild_id = %app.config.discord.guild_id,
        "faqbot started"
    );

    tokio::select! {
        signal = wait_for_shutdown() => signal?,
        finished = &mut gateway => {
            tracing::warn!(
                event_name = "system.server.gateway_stopped",
                correlation_id = "shutdown",
                "gateway runner stopped before shutdown signal"
            );
            return finished?;
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = app.config.server.graceful_shutdown_secs,
        "faqbot stopping; draining in-flight interactions"
    );

    // Dropping the last strong relay handle ends the gateway stream once
    // queued interactions are dispatched.
    drop(app.relay);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, gateway).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            "in-flight interactions did not finish within the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
