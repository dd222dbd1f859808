//! Query server lifecycle.
//!
//! [`bind`] is split from [`serve`] so a startup failure to bind is
//! reported before the consumer starts. [`serve`] returns once the
//! lifecycle starts draining and in-flight requests have completed.

use std::net::SocketAddr;
use std::sync::Arc;

use leaderboard_core::Phase;
use leaderboard_core::config::QueryConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the query server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind the listener on `query.host:query.port`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or in use.
pub async fn bind(config: &QueryConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    Ok(listener)
}

/// Serve the query API until the lifecycle starts draining.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    let lifecycle = Arc::clone(&state.lifecycle);
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Serve(format!("listener has no address: {e}")))?;
    let router = build_router(state);

    info!(%addr, "Query server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { lifecycle.reached(Phase::Draining).await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Query server stopped");
    Ok(())
}

/// Bind and serve in one step.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn start_server(config: &QueryConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state).await
}
