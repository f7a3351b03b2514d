//! Local HTTP server handlers

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use gitdeploy::models::deployment::{ChangeList, DeploymentOutcome};
use gitdeploy::server::handlers::{DeploymentsResponse, TriggerResponse};
use gitdeploy::server::serve::router;
use gitdeploy::server::state::ServerState;
use gitdeploy::storage::history::{HistorySink, MemoryHistory};
use gitdeploy::storage::state::MemoryConfigStore;
use gitdeploy::workers::deployer::{queue, DeployReceiver, Options};

struct Harness {
    state: Arc<ServerState>,
    config: Arc<MemoryConfigStore>,
    history: Arc<MemoryHistory>,
    receiver: DeployReceiver,
}

fn harness(queue_capacity: usize) -> Harness {
    let config = Arc::new(MemoryConfigStore::new(true, "acme", "ghp_test", "repo", "main"));
    let history = Arc::new(MemoryHistory::new());
    let (tx, receiver) = queue(&Options { queue_capacity }, config.clone());
    let state = Arc::new(ServerState::new(
        tx,
        history.clone(),
        "plugins/wp-gitdeploy".to_string(),
    ));
    Harness {
        state,
        config,
        history,
        receiver,
    }
}

fn trigger_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/deployments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = harness(4);
    let response = router(h.state.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "gitdeploy");
}

#[tokio::test]
async fn test_trigger_queues_sanitized_changes() {
    let mut h = harness(4);
    let body = r#"{"changed_files": ["plugins/x.php", " plugins/x.php ", "plugins/wp-gitdeploy/a.php", ""]}"#;

    let response = router(h.state.clone())
        .oneshot(trigger_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack: TriggerResponse = json_body(response).await;
    assert!(ack.queued);
    assert_eq!(ack.changes, 1);
    assert!(h.config.in_progress());

    let queued = h.receiver.recv().await.unwrap();
    assert_eq!(queued, ChangeList::from_paths(["plugins/x.php"], ""));
}

#[tokio::test]
async fn test_trigger_rejected_when_queue_full() {
    let h = harness(1);

    let first = router(h.state.clone())
        .oneshot(trigger_request(r#"{"changed_files": ["plugins/a.php"]}"#))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = router(h.state.clone())
        .oneshot(trigger_request(r#"{"changed_files": ["plugins/b.php"]}"#))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    let ack: TriggerResponse = json_body(second).await;
    assert!(!ack.queued);
    assert!(ack.message.is_some());
}

#[tokio::test]
async fn test_trigger_rejected_when_worker_gone() {
    let h = harness(4);
    let Harness {
        state,
        config,
        receiver,
        ..
    } = h;
    drop(receiver);

    let response = router(state)
        .oneshot(trigger_request(r#"{"changed_files": ["plugins/a.php"]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(config.in_progress_history().is_empty());
}

#[tokio::test]
async fn test_list_deployments() {
    let h = harness(4);
    let changes = ChangeList::from_paths(["themes/t/style.css"], "");
    h.history
        .record(&DeploymentOutcome::success(Uuid::new_v4(), &changes))
        .await
        .unwrap();
    h.history
        .record(&DeploymentOutcome::failed(
            Uuid::new_v4(),
            "unable to get repository data",
            &changes,
        ))
        .await
        .unwrap();

    let response = router(h.state.clone())
        .oneshot(Request::get("/deployments").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: DeploymentsResponse = json_body(response).await;
    assert_eq!(body.total, 2);
    assert!(body.deployments[0].is_success());
    assert_eq!(body.deployments[1].reason, "unable to get repository data");
}
