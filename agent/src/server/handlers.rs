//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::deployment::{ChangeList, DeploymentOutcome};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "gitdeploy".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Deployment trigger
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub changed_files: Vec<String>,
}

/// Trigger acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub queued: bool,
    pub changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Queue a deployment. The outcome is only available from the history.
pub async fn trigger_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<TriggerRequest>,
) -> impl IntoResponse {
    let changes = ChangeList::from_paths(&request.changed_files, &state.self_path);
    let count = changes.len();

    match state.queue.trigger(changes).await {
        Ok(()) => {
            info!("Deployment triggered with {} changed files", count);
            (
                StatusCode::ACCEPTED,
                Json(TriggerResponse {
                    queued: true,
                    changes: count,
                    message: None,
                }),
            )
        }
        Err(e) => {
            error!("Unable to queue deployment: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(TriggerResponse {
                    queued: false,
                    changes: count,
                    message: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Deployment history response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeploymentsResponse {
    pub deployments: Vec<DeploymentOutcome>,
    pub total: usize,
}

/// List recorded deployment outcomes, oldest first
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let deployments = state.history.list().await.map_err(|e| {
        error!("Unable to read deployment history: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let total = deployments.len();
    Ok(Json(DeploymentsResponse { deployments, total }))
}
