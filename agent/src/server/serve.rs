//! Router and listener for the local HTTP server

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::AgentError;
use crate::server::handlers::{
    health_handler, list_deployments_handler, trigger_deployment_handler, version_handler,
};
use crate::server::state::ServerState;
use crate::storage::settings::ServerSettings;

/// All routes, with request tracing
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/deployments",
            get(list_deployments_handler).post(trigger_deployment_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listener and serve on a background task.
///
/// Binding happens before this returns, so a taken port fails startup
/// instead of the task.
pub async fn serve(
    settings: &ServerSettings,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), AgentError>>, AgentError> {
    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .map_err(|e| {
            AgentError::ServerError(format!("bind {}:{}: {e}", settings.host, settings.port))
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AgentError::ServerError(e.to_string()))?;
    info!("HTTP server listening on {}", local_addr);

    let app = router(state);
    Ok(tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| AgentError::ServerError(format!("http server: {e}")))
    }))
}
