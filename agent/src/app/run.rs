//! Service mode: deployer worker plus local HTTP server

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::deploy::cleanup::cleanup_pull_dir;
use crate::errors::AgentError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::deployer::{self, DeployReceiver};

/// Run the agent until `shutdown_signal` resolves.
///
/// Tasks are stopped in reverse start order: the server first so no new
/// triggers arrive, then the deployer worker once its current run is done.
pub async fn run(
    options: AppOptions,
    settings: Settings,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Starting gitdeploy agent...");

    let (stop_tx, _) = broadcast::channel::<()>(1);
    let mut services = Services::new(stop_tx.clone(), options.lifecycle.clone());

    let started = start(&options, &settings, &stop_tx, &mut services).await;
    if let Err(e) = started {
        error!("Agent failed to start: {}", e);
        services.stop().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Stopping gitdeploy agent...");
    services.stop().await
}

async fn start(
    options: &AppOptions,
    settings: &Settings,
    stop_tx: &broadcast::Sender<()>,
    services: &mut Services,
) -> Result<(), AgentError> {
    options.layout.setup().await?;

    let (app_state, receiver) = AppState::init(&options.layout, settings, &options.deployer)?;

    if options.sweep_pull_dir_on_start {
        sweep_leftovers(&options.layout).await;
    }

    services.push("deployer worker", spawn_deployer(&app_state, receiver, stop_tx.subscribe()));

    if options.enable_socket_server {
        let server_state = ServerState::new(
            app_state.queue.clone(),
            app_state.history.clone(),
            app_state.self_path.clone(),
        );
        let handle = serve(&options.server, Arc::new(server_state), stopped(stop_tx.subscribe())).await?;
        services.push("http server", handle);
    }

    Ok(())
}

/// Remove archives and trees left behind by an interrupted run
async fn sweep_leftovers(layout: &StorageLayout) {
    let pull_dir = layout.pull_dir();
    match cleanup_pull_dir(pull_dir.path()).await {
        Ok(0) => {}
        Ok(removed) => info!(
            "Removed {} leftover entries from {}",
            removed,
            pull_dir.path().display()
        ),
        Err(e) => warn!("Unable to sweep {}: {}", pull_dir.path().display(), e),
    }
}

fn spawn_deployer(
    app_state: &AppState,
    receiver: DeployReceiver,
    stop_rx: broadcast::Receiver<()>,
) -> JoinHandle<Result<(), AgentError>> {
    let deployer = app_state.deployer.clone();
    tokio::spawn(async move {
        deployer::run(deployer, receiver, Box::pin(stopped(stop_rx))).await;
        Ok(())
    })
}

/// Resolves once a stop is broadcast or every sender is gone
async fn stopped(mut stop_rx: broadcast::Receiver<()>) {
    let _ = stop_rx.recv().await;
}

/// Background tasks owned by the service
struct Services {
    stop_tx: broadcast::Sender<()>,
    lifecycle: LifecycleOptions,
    tasks: Vec<(&'static str, JoinHandle<Result<(), AgentError>>)>,
}

impl Services {
    fn new(stop_tx: broadcast::Sender<()>, lifecycle: LifecycleOptions) -> Self {
        Self {
            stop_tx,
            lifecycle,
            tasks: Vec::new(),
        }
    }

    fn push(&mut self, name: &'static str, handle: JoinHandle<Result<(), AgentError>>) {
        info!("Started {}", name);
        self.tasks.push((name, handle));
    }

    /// Broadcast the stop and wait for every task, bounded by the lifecycle delay
    async fn stop(&mut self) -> Result<(), AgentError> {
        let _ = self.stop_tx.send(());

        let delay = self.lifecycle.max_shutdown_delay;
        match tokio::time::timeout(delay, self.join_all()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Tasks still running after {:?}, exiting", delay);
                std::process::exit(1);
            }
        }
    }

    async fn join_all(&mut self) -> Result<(), AgentError> {
        let mut first_err = None;

        while let Some((name, handle)) = self.tasks.pop() {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AgentError::ShutdownError(format!("{name}: {e}"))),
            };
            match result {
                Ok(()) => info!("Stopped {}", name),
                Err(e) => {
                    error!("{} stopped with an error: {}", name, e);
                    first_err.get_or_insert(e);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}
