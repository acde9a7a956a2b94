//! ff-server: the HTTP surface of fileforge.
//!
//! - Axum routes for upload, job status, conversion, download and the
//!   YouTube quality re-fetch
//! - SSE stream of job events
//! - Tool availability and health reporting
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod router;
pub mod routes;

use std::net::SocketAddr;

use ff_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the fileforge server and serve until a shutdown signal arrives.
pub async fn start(config: Config) -> ff_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ff_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config)?;
    for info in ctx.tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {} (dependent conversions are disabled)", info.name);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ff_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    serve(listener, ctx, CancellationToken::new()).await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve the router on `listener` until a signal arrives or `cancel` fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    ctx: AppContext,
    cancel: CancellationToken,
) -> ff_core::Result<()> {
    let app = router::build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
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
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
