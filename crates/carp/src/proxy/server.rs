//! Server lifecycle.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::net::TcpListener;

use super::routes::create_router;
use crate::auth::SsoClients;
use crate::config::Configuration;
use crate::logging;
use crate::supervisor::Companion;

/// Run the proxy until Ctrl+C or SIGTERM.
///
/// Logging is set up from `log-level` and `log-format` unless the embedding
/// application installed a logger already.
///
/// The companion application, if configured, is started first and stopped
/// after the server has shut down.
pub async fn serve(configuration: Configuration, clients: SsoClients) -> Result<()> {
    logging::init_logging(configuration.log_level_filter(), configuration.log_format);

    let router = create_router(&configuration, clients)?;

    let companion = match &configuration.application_exec_command {
        Some(command) => Some(Companion::start(command).context("starting companion application")?),
        None => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], configuration.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;

    info!(
        "Listening on http://{}, forwarding to {}",
        addr, configuration.target_url
    );

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving requests");

    if let Some(companion) = companion {
        if let Err(e) = companion.stop().await {
            warn!("Error stopping companion application: {}", e);
        }
    }

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
