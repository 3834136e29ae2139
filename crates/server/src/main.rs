mod bootstrap;
mod routes;
mod scanner;

use std::time::Duration;

use anyhow::Result;
use parchi_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use parchi_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(event_name = "server_started", address = %address, "parchi server listening");

    scanner::spawn(&app);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let server = axum::serve(listener, routes::router(app.state.clone()))
        .with_graceful_shutdown(wait_for_shutdown());

    // Both branches listen for the same signal: serve stops accepting
    // and drains, while the deadline bounds how long the drain may take.
    tokio::select! {
        result = server => result?,
        _ = drain_deadline(grace) => {
            warn!(
                event_name = "server_drain_timeout",
                grace_secs = grace.as_secs(),
                "graceful shutdown window elapsed, exiting with connections open"
            );
        }
    }

    info!(event_name = "server_stopped", "parchi server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("shutdown signal listener failed, serving until killed");
        std::future::pending::<()>().await;
    }
    info!(event_name = "server_stopping", "shutdown signal received, draining");
}

async fn drain_deadline(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}
