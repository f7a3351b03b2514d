//! Server state

use std::sync::Arc;

use crate::storage::history::HistorySink;
use crate::workers::deployer::DeployQueue;

/// Server state shared across handlers
pub struct ServerState {
    pub queue: DeployQueue,
    pub history: Arc<dyn HistorySink>,
    /// Change paths under this prefix are dropped from triggers
    pub self_path: String,
}

impl ServerState {
    pub fn new(queue: DeployQueue, history: Arc<dyn HistorySink>, self_path: String) -> Self {
        Self {
            queue,
            history,
            self_path,
        }
    }
}
