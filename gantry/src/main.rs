//! # Gantry Gateway Entry Point
//!
//! Startup order:
//! 1. Read configuration from the environment.
//! 2. Install the logger.
//! 3. Connect to the Kubernetes API and spawn the discovery control loop.
//! 4. Serve HTTP until SIGINT/SIGTERM, then cancel the control loop.
use anyhow::Context;
use gantry_core::discovery::kubernetes::ServiceSource;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod auth;
mod config;
mod handlers;
mod logging;
mod server;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = config::from_env().context("failed to read environment variables")?;
    logging::init(&config.log_level)?;

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let source = Arc::new(ServiceSource::new());
    let stop = CancellationToken::new();
    {
        let source = Arc::clone(&source);
        let stop = stop.clone();
        tokio::spawn(async move {
            source.run(client, stop).await;
        });
    }

    let state = server::AppState {
        discoverer: source,
        access_token: config.token.clone(),
    };

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to listen on port {}", config.port))?;
    info!(port = config.port, "starting gantry");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal(stop))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn shutdown_signal(stop: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutting down");
    stop.cancel();
}
