//! Snapshot archive download

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use tokio::fs;
use tracing::{info, warn};

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::http::client::ArchiveDigest;
use crate::models::deployment::RepoRef;

/// Something that can stream a branch snapshot to a local file
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn download(
        &self,
        repo: &RepoRef,
        token: &SecretString,
        dest: &Path,
    ) -> Result<ArchiveDigest, AgentError>;
}

/// A downloaded snapshot file, owned by one deployment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingArchive {
    path: PathBuf,
}

impl WorkingArchive {
    /// Pick an unused `{repo}-{unixTimestamp}.zip` path under `dir`.
    ///
    /// When the name for the current second is taken the timestamp is bumped
    /// until a free name is found.
    pub async fn reserve(dir: &Path, repo_name: &str) -> Self {
        let stem: String = repo_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '-' } else { c })
            .collect();
        let mut timestamp = Utc::now().timestamp();

        loop {
            let path = dir.join(format!("{}-{}.zip", stem, timestamp));
            if fs::symlink_metadata(&path).await.is_err() {
                return Self { path };
            }
            timestamp += 1;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without the `.zip` extension
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Downloads snapshots through an `ArchiveSource`
#[derive(Clone)]
pub struct ArchiveFetcher {
    source: Arc<dyn ArchiveSource>,
}

impl ArchiveFetcher {
    pub fn new(source: Arc<dyn ArchiveSource>) -> Self {
        Self { source }
    }

    /// Download `repo` into a uniquely named archive under `dest_dir`.
    ///
    /// A single attempt is made. On failure any partially written archive is
    /// removed before the error is returned.
    pub async fn fetch(
        &self,
        repo: &RepoRef,
        token: &SecretString,
        dest_dir: &Path,
    ) -> Result<WorkingArchive, AgentError> {
        let archive = WorkingArchive::reserve(dest_dir, &repo.name).await;
        info!(
            "Fetching {}/{}@{} into {}",
            repo.owner,
            repo.name,
            repo.branch,
            archive.path().display()
        );

        match self.source.download(repo, token, archive.path()).await {
            Ok(digest) => {
                info!(
                    "Downloaded snapshot ({} bytes, sha256 {})",
                    digest.size, digest.sha256
                );
                Ok(archive)
            }
            Err(e) => {
                if let Err(cleanup) = File::new(archive.path()).delete().await {
                    warn!(
                        "Unable to remove partial archive {}: {}",
                        archive.path().display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }
}
