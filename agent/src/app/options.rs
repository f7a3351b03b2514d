//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::{ServerSettings, Settings};
use crate::workers::deployer;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Enable local HTTP server
    pub enable_socket_server: bool,

    /// Server configuration
    pub server: ServerSettings,

    /// Deployer worker options
    pub deployer: deployer::Options,

    /// Remove leftovers from interrupted runs before accepting triggers
    pub sweep_pull_dir_on_start: bool,
}

impl AppOptions {
    /// Derive options from the settings file
    pub fn from_settings(layout: StorageLayout, settings: &Settings) -> Self {
        Self {
            layout,
            server: settings.server.clone(),
            deployer: deployer::Options {
                queue_capacity: settings.queue_capacity,
            },
            ..Default::default()
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout: StorageLayout::default(),
            enable_socket_server: true,
            server: ServerSettings::default(),
            deployer: deployer::Options::default(),
            sweep_pull_dir_on_start: true,
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown.
    ///
    /// A deployment in flight is allowed to finish within this window.
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}
