//! `combat-logger` -- Diablo 4 combat logging daemon.
//!
//! Waits for the game process, attaches, and logs combat until the game
//! exits or Ctrl-C is pressed. See [`d4log_agent::config`] for the
//! environment variables.

use anyhow::Context;
use d4log_agent::{session, AgentConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "d4log_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().context("Invalid configuration")?;

    tracing::info!(
        process = %config.process_name,
        offsets = %config.offsets_path.display(),
        interval_ms = config.sample_interval.as_millis() as u64,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Starting combat-logger",
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                on_signal.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    match session::run(&config, cancel).await? {
        Some(report) => tracing::info!(
            session_id = %report.session_id,
            encounters = report.run.encounters,
            "Session complete",
        ),
        None => tracing::info!("Stopped before the game was found"),
    }
    Ok(())
}
