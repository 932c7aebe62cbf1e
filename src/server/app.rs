use super::{handlers, types::AppState};
use crate::error::{BgRemovalError, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

/// Build the router with all endpoints bound to `state`
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::root))
        .route("/models", get(handlers::models))
        .route("/remove", post(handlers::remove))
        .route("/remove-batch", post(handlers::remove_batch))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
///
/// # Errors
/// - Invalid configuration
/// - The address cannot be bound
pub async fn serve(state: AppState) -> Result<()> {
    state.config.validate()?;
    let address = state.config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| BgRemovalError::file_io_error("bind", &address, &e))?;

    tracing::info!(
        address = %address,
        default_model = %state.sessions.default_model(),
        "server listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(BgRemovalError::Io)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}
