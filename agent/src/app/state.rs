//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::deploy::orchestrator::Deployer;
use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::storage::history::{HistorySink, JsonlHistory};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::storage::state::{ConfigStore, FileConfigStore};
use crate::workers::deployer::{queue as deploy_queue, DeployQueue, DeployReceiver, Options as DeployerOptions};

/// Main application state
pub struct AppState {
    /// Settings and agent flags
    pub config: Arc<dyn ConfigStore>,

    /// Deployment history
    pub history: Arc<dyn HistorySink>,

    /// Runs deployments
    pub deployer: Arc<Deployer>,

    /// Fire-and-forget trigger queue
    pub queue: DeployQueue,

    /// Change paths under this prefix are never deployed
    pub self_path: String,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Returns the receiving half of the trigger queue for the deployer worker.
    pub fn init(
        layout: &StorageLayout,
        settings: &Settings,
        deployer_options: &DeployerOptions,
    ) -> Result<(Self, DeployReceiver), AgentError> {
        info!("Initializing application state...");

        let config: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(layout.clone()));
        let history: Arc<dyn HistorySink> = Arc::new(JsonlHistory::new(layout.history_file()));
        let http_client = Arc::new(HttpClient::new(
            &settings.github.api_base_url,
            Duration::from_secs(settings.github.timeout_secs),
        )?);

        let deployer = Arc::new(Deployer::new(
            config.clone(),
            http_client,
            history.clone(),
            layout.pull_dir().path(),
            settings.content.roots(),
        ));

        let (queue, receiver) = deploy_queue(deployer_options, config.clone());

        let state = Self {
            config,
            history,
            deployer,
            queue,
            self_path: settings.self_path.clone(),
        };

        Ok((state, receiver))
    }
}
