//! Deployment orchestration: fetch, unpack, apply, clean up, report

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::deploy::apply::{apply, ApplyReport, ContentRoots};
use crate::deploy::cleanup::RunWorkspace;
use crate::deploy::fetch::{ArchiveFetcher, ArchiveSource};
use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
use crate::deploy::unpack::{extraction_dir, unpack};
use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::models::deployment::{
    ChangeList, DeploymentOutcome, DeploymentRequest, DeploymentStatus,
};
use crate::storage::history::HistorySink;
use crate::storage::state::ConfigStore;

/// Runs deployments end to end and records their outcomes
pub struct Deployer {
    config: Arc<dyn ConfigStore>,
    fetcher: ArchiveFetcher,
    history: Arc<dyn HistorySink>,
    pull_dir: PathBuf,
    roots: ContentRoots,
}

impl Deployer {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        source: Arc<dyn ArchiveSource>,
        history: Arc<dyn HistorySink>,
        pull_dir: impl Into<PathBuf>,
        roots: ContentRoots,
    ) -> Self {
        Self {
            config,
            fetcher: ArchiveFetcher::new(source),
            history,
            pull_dir: pull_dir.into(),
            roots,
        }
    }

    pub fn pull_dir(&self) -> &PathBuf {
        &self.pull_dir
    }

    /// Run one deployment.
    ///
    /// Never fails: every error becomes the outcome's reason. Exactly one
    /// outcome is handed to the history sink, and the in-progress marker is
    /// cleared afterwards.
    pub async fn deploy(&self, changes: ChangeList) -> DeploymentOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("deployment", run = %run_id, changes = changes.len());

        async move {
            let outcome = self.run(run_id, changes).await;

            if let Err(e) = self.config.set_in_progress(false).await {
                warn!("Unable to clear in-progress marker: {}", e);
            }
            if let Err(e) = self.history.record(&outcome).await {
                error!("Unable to record deployment outcome: {}", e);
            }

            match outcome.status {
                DeploymentStatus::Success => info!("Deployment succeeded"),
                DeploymentStatus::Failed => error!("Deployment failed: {}", outcome.reason),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, run_id: Uuid, changes: ChangeList) -> DeploymentOutcome {
        let mut fsm = DeploymentFsm::new();
        advance(&mut fsm, DeploymentEvent::Begin);

        if !self.config.is_setup_complete().await {
            advance(&mut fsm, DeploymentEvent::Fail(AgentError::SetupIncomplete.to_string()));
            advance(&mut fsm, DeploymentEvent::Report);
            return DeploymentOutcome::failed(
                run_id,
                fsm.failure().unwrap_or_default(),
                &ChangeList::default(),
            );
        }
        advance(&mut fsm, DeploymentEvent::SetupOk);

        let mut workspace = RunWorkspace::new();
        if let Err(e) = self.execute(&changes, &mut fsm, &mut workspace).await {
            error!("Deployment stage failed: {:?}", e);
            advance(&mut fsm, DeploymentEvent::Fail(e.to_string()));
        }

        // A successful apply has already entered CleaningUp
        if fsm.state() == DeploymentState::Failed {
            advance(&mut fsm, DeploymentEvent::Cleanup);
        }
        if let Err(e) = workspace.cleanup().await {
            warn!("Cleanup incomplete: {}", e);
        }
        advance(&mut fsm, DeploymentEvent::Report);

        match fsm.failure() {
            Some(reason) => DeploymentOutcome::failed(run_id, reason, &changes),
            None => DeploymentOutcome::success(run_id, &changes),
        }
    }

    async fn execute(
        &self,
        changes: &ChangeList,
        fsm: &mut DeploymentFsm,
        workspace: &mut RunWorkspace,
    ) -> Result<ApplyReport, AgentError> {
        let credentials = self.config.credentials().await?;
        let request = DeploymentRequest::new(credentials, changes.clone());

        Dir::new(&self.pull_dir)
            .create()
            .await
            .map_err(AgentError::fetch_transport)?;

        let archive = self
            .fetcher
            .fetch(&request.repo, &request.token, &self.pull_dir)
            .await?;
        workspace.track_archive(archive.path());
        advance(fsm, DeploymentEvent::Fetched);

        workspace.track_extract_dir(extraction_dir(archive.path(), &self.pull_dir));
        let tree = unpack(archive.path(), &self.pull_dir).await?;
        advance(fsm, DeploymentEvent::Extracted);

        let report = apply(&tree, &request.changes, &self.roots).await?;
        advance(fsm, DeploymentEvent::Applied);

        Ok(report)
    }
}

fn advance(fsm: &mut DeploymentFsm, event: DeploymentEvent) {
    let from = fsm.state();
    match fsm.process(event) {
        Ok(()) => info!("Deployment state {:?} -> {:?}", from, fsm.state()),
        Err(e) => error!("{}", e),
    }
}
