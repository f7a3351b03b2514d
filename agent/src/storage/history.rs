//! Deployment history sinks

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::deployment::DeploymentOutcome;

/// Receives exactly one outcome per deployment run
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, outcome: &DeploymentOutcome) -> Result<(), AgentError>;

    /// Recorded outcomes, oldest first
    async fn list(&self) -> Result<Vec<DeploymentOutcome>, AgentError>;
}

/// Appends outcomes to a JSON Lines file
pub struct JsonlHistory {
    file: File,
    write_lock: AsyncMutex<()>,
}

impl JsonlHistory {
    pub fn new(file: File) -> Self {
        Self {
            file,
            write_lock: AsyncMutex::new(()),
        }
    }
}

#[async_trait]
impl HistorySink for JsonlHistory {
    async fn record(&self, outcome: &DeploymentOutcome) -> Result<(), AgentError> {
        let line = serde_json::to_string(outcome)?;
        let _guard = self.write_lock.lock().await;
        self.file.append_line(&line).await
    }

    async fn list(&self) -> Result<Vec<DeploymentOutcome>, AgentError> {
        if !self.file.exists().await {
            return Ok(Vec::new());
        }

        let contents = self.file.read_string().await?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AgentError::from))
            .collect()
    }
}

/// Keeps outcomes in memory
#[derive(Default)]
pub struct MemoryHistory {
    outcomes: Mutex<Vec<DeploymentOutcome>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<DeploymentOutcome> {
        self.outcomes
            .lock()
            .map(|outcomes| outcomes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn record(&self, outcome: &DeploymentOutcome) -> Result<(), AgentError> {
        self.outcomes
            .lock()
            .map_err(|e| AgentError::StorageError(e.to_string()))?
            .push(outcome.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeploymentOutcome>, AgentError> {
        Ok(self.outcomes())
    }
}
