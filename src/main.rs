//! Revisit Cache demo runner
//!
//! Builds an engine from environment variables, exercises it, and keeps it
//! running until Ctrl+C or SIGTERM so revisits and janitor passes show up in
//! the logs.

use std::time::Duration;

use anyhow::Context;
use chrono::TimeDelta;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revisit_cache::{expire, EngineConfig, InMemoryCache, USE_DEFAULT};

/// Main entry point for the demo runner.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the engine with the `expire` revisit policy
/// 4. Store a few sample items and report engine statistics periodically
/// 5. Close the engine on SIGINT/SIGTERM, waiting for background tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revisit_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = EngineConfig::from_env();
    if config.revisit_number_of_workers == 0 {
        config.revisit_number_of_workers = 2;
    }
    info!(?config, "configuration loaded");

    let cache = InMemoryCache::<String>::builder(config)
        .revisit_func(expire)
        .build()
        .context("failed to build cache engine")?;

    cache.set("greeting", "hello".to_string(), USE_DEFAULT)?;
    cache.set("short-lived", "bye".to_string(), TimeDelta::seconds(5))?;
    cache.set("long-lived", "still here".to_string(), TimeDelta::minutes(10))?;

    let mut report = tokio::time::interval(Duration::from_secs(5));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = report.tick() => {
                let stats = cache.stats();
                info!(
                    entries = stats.total_entries,
                    revisits = stats.revisits,
                    evictions = stats.evictions,
                    pending = cache.pending_revisits(),
                    "engine status"
                );
            }
            _ = &mut shutdown => break,
        }
    }

    cache.close().await?;
    info!("shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
