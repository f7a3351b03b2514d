//! Finite State Machine for a single deployment run

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Deployment run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Run created, nothing checked yet
    Init,

    /// Checking that setup has been completed
    SetupCheck,

    /// Downloading the snapshot archive
    Fetching,

    /// Unpacking and normalizing the snapshot
    Extracting,

    /// Copying and deleting changed files
    Applying,

    /// Removing the run's archive and extraction directory
    CleaningUp,

    /// A stage failed; only cleanup and reporting remain
    Failed,

    /// Outcome handed to the history sink. Terminal.
    Reported,
}

/// Deployment run event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    Begin,
    SetupOk,
    Fetched,
    Extracted,
    Applied,
    Cleanup,
    Fail(String),
    Report,
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    failure: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in init state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Init,
            failure: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Reason of the first failure, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), AgentError> {
        use DeploymentEvent as E;
        use DeploymentState as S;

        let new_state = match (self.state, &event) {
            (S::Init, E::Begin) => S::SetupCheck,
            (S::SetupCheck, E::SetupOk) => S::Fetching,
            (S::Fetching, E::Fetched) => S::Extracting,
            (S::Extracting, E::Extracted) => S::Applying,
            (S::Applying, E::Applied) => S::CleaningUp,

            (S::SetupCheck | S::Fetching | S::Extracting | S::Applying, E::Fail(reason)) => {
                self.failure.get_or_insert_with(|| reason.clone());
                S::Failed
            }

            // Cleanup still runs after a failure; the failure reason is kept
            (S::Failed, E::Cleanup) => S::CleaningUp,
            (S::Failed, E::Report) => S::Reported,
            (S::CleaningUp, E::Report) => S::Reported,

            (state, event) => {
                return Err(AgentError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Whether the run has reached its terminal state
    pub fn is_reported(&self) -> bool {
        self.state == DeploymentState::Reported
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
