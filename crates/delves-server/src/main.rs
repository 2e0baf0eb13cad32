//! Delves server entry point.

use std::error::Error;

use delves_server::config::ServerConfig;
use delves_server::{routes, startup};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Delves instance manager");

    // Read configuration from environment.
    let config = ServerConfig::from_env()?;
    let addr = config.bind_address()?;

    // Build components, clear leftovers from the previous run.
    let delves = startup::start(&config).await?;

    // Ctrl-C flips the shutdown flag for the reaper and the HTTP server.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
        }
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });
    let reaper = tokio::spawn(delves.reaper().run(shutdown_rx.clone()));

    // Build router and start server.
    let app = routes::app(delves.state.clone());
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut http_shutdown = shutdown_rx;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // A dropped sender also means shut down.
            let _ = http_shutdown.wait_for(|stop| *stop).await;
        })
        .await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "http server failed");
        reaper.abort();
    }

    match reaper.await {
        Err(e) if !e.is_cancelled() => tracing::error!(error = %e, "reaper task failed"),
        _ => {}
    }
    delves.shutdown().await?;
    tracing::info!("Delves instance manager stopped");

    served.map_err(Into::into)
}
