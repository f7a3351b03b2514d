//! Agent state and the configuration store the orchestrator reads from

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::AgentError;
use crate::models::deployment::Credentials;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Flags maintained alongside the settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    /// Set by the admin side once credentials have been verified
    #[serde(default)]
    pub setup_complete: bool,

    /// Advisory marker; not a lock
    #[serde(default)]
    pub deployment_in_progress: bool,
}

/// Key-value configuration consulted by a deployment run
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Whether setup has been completed
    async fn is_setup_complete(&self) -> bool;

    /// Current GitHub credentials
    async fn credentials(&self) -> Result<Credentials, AgentError>;

    /// Set or clear the in-progress marker
    async fn set_in_progress(&self, in_progress: bool) -> Result<(), AgentError>;
}

/// Config store backed by `settings.json` and `state.json`
pub struct FileConfigStore {
    layout: StorageLayout,
    state_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            state_lock: Mutex::new(()),
        }
    }

    /// Read the current state file
    pub async fn load_state(&self) -> Result<AgentState, AgentError> {
        self.layout.state_file().read_json_or_default().await
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn is_setup_complete(&self) -> bool {
        match self.load_state().await {
            Ok(state) => state.setup_complete,
            Err(e) => {
                debug!("Unable to read state file, treating setup as incomplete: {}", e);
                false
            }
        }
    }

    async fn credentials(&self) -> Result<Credentials, AgentError> {
        let settings: Settings = self.layout.settings_file().read_json_or_default().await?;
        Ok(settings.github.credentials())
    }

    async fn set_in_progress(&self, in_progress: bool) -> Result<(), AgentError> {
        let _guard = self.state_lock.lock().await;
        let file = self.layout.state_file();
        let mut state: AgentState = file.read_json_or_default().await?;
        state.deployment_in_progress = in_progress;
        file.write_json(&state).await
    }
}

/// In-memory config store, for embedding and tests
pub struct MemoryConfigStore {
    setup_complete: AtomicBool,
    in_progress: AtomicBool,
    username: String,
    token: SecretString,
    repository: String,
    branch: String,
    set_calls: StdMutex<Vec<bool>>,
}

impl MemoryConfigStore {
    pub fn new(setup_complete: bool, username: &str, token: &str, repository: &str, branch: &str) -> Self {
        Self {
            setup_complete: AtomicBool::new(setup_complete),
            in_progress: AtomicBool::new(false),
            username: username.to_string(),
            token: SecretString::from(token.to_string()),
            repository: repository.to_string(),
            branch: branch.to_string(),
            set_calls: StdMutex::new(Vec::new()),
        }
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Every value passed to `set_in_progress`, in order
    pub fn in_progress_history(&self) -> Vec<bool> {
        self.set_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn is_setup_complete(&self) -> bool {
        self.setup_complete.load(Ordering::SeqCst)
    }

    async fn credentials(&self) -> Result<Credentials, AgentError> {
        Ok(Credentials {
            username: self.username.clone(),
            token: SecretString::from(self.token.expose_secret().to_string()),
            repository: self.repository.clone(),
            branch: self.branch.clone(),
        })
    }

    async fn set_in_progress(&self, in_progress: bool) -> Result<(), AgentError> {
        self.in_progress.store(in_progress, Ordering::SeqCst);
        if let Ok(mut calls) = self.set_calls.lock() {
            calls.push(in_progress);
        }
        Ok(())
    }
}
