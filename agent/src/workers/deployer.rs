//! Deployment worker
//!
//! Triggers are queued and executed one at a time. Whoever triggers a
//! deployment never sees its outcome; it only lands in the history sink.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::deploy::orchestrator::Deployer;
use crate::errors::AgentError;
use crate::models::deployment::ChangeList;
use crate::storage::state::ConfigStore;

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum number of pending triggers
    pub queue_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { queue_capacity: 16 }
    }
}

/// Sending half of the deployment queue
#[derive(Clone)]
pub struct DeployQueue {
    tx: mpsc::Sender<ChangeList>,
    config: Arc<dyn ConfigStore>,
}

impl DeployQueue {
    /// Enqueue a deployment without waiting for it.
    ///
    /// The advisory in-progress marker is set before the trigger is handed to
    /// the worker, so the worker's clear always comes after it. A run that
    /// is already active clears it on completion even if this trigger is
    /// still queued; the marker is advisory only.
    pub async fn trigger(&self, changes: ChangeList) -> Result<(), AgentError> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                AgentError::ServerError("deployment queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                AgentError::ServerError("deployment worker is not running".to_string())
            }
        })?;

        if let Err(e) = self.config.set_in_progress(true).await {
            warn!("Unable to set in-progress marker: {}", e);
        }
        permit.send(changes);
        debug!("Deployment queued");
        Ok(())
    }
}

/// Receiving half of the deployment queue
pub struct DeployReceiver {
    rx: mpsc::Receiver<ChangeList>,
}

impl DeployReceiver {
    /// Next queued change list, or `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<ChangeList> {
        self.rx.recv().await
    }
}

/// Create the deployment queue
pub fn queue(options: &Options, config: Arc<dyn ConfigStore>) -> (DeployQueue, DeployReceiver) {
    let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
    (DeployQueue { tx, config }, DeployReceiver { rx })
}

/// Run the deployer worker until shutdown or until every queue sender is gone.
///
/// A deployment that has started is never interrupted; shutdown is observed
/// between runs.
pub async fn run(
    deployer: Arc<Deployer>,
    mut receiver: DeployReceiver,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Deployer worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                return;
            }
            next = receiver.recv() => {
                let Some(changes) = next else {
                    info!("Deployment queue closed, deployer worker exiting...");
                    return;
                };

                let outcome = deployer.deploy(changes).await;
                debug!("Deployment {} finished with status {}", outcome.id, outcome.status);
            }
        }
    }
}
