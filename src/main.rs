mod cli;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chanmint::{router, spawn_sweeper, ChannelService};
use cli::Cli;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .init();

    let config = cli.load_config().context("failed to load configuration")?;
    info!(config = ?config, "configuration loaded");

    let service = Arc::new(
        ChannelService::from_config(&config).context("failed to initialise channel service")?,
    );
    // Fail at startup rather than on the first request when the key is unusable
    let public_key = service
        .public_key()
        .context("app certificate is not a usable signing key")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = (config.sweep_interval > 0).then(|| {
        spawn_sweeper(
            service.registry(),
            Duration::from_secs(config.sweep_interval),
            shutdown_rx,
        )
    });

    let address = config.socket_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;

    info!(%address, app_id = service.app_id(), %public_key, "chanmint listening");

    axum::serve(listener, router(Arc::clone(&service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(sweeper) = sweeper {
        sweeper.await.context("sweeper task failed")?;
    }

    info!("chanmint stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
