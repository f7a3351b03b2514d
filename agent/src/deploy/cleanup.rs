//! Pull directory cleanup

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Remove every top-level entry of `pull_dir`.
///
/// Directories are deleted recursively, files unlinked. A missing pull
/// directory, or entries that vanish mid-walk, are not errors, so running
/// this twice in a row is a no-op the second time. Returns how many entries
/// were removed.
pub async fn cleanup_pull_dir(pull_dir: &Path) -> Result<usize, AgentError> {
    let dir = Dir::new(pull_dir);
    if !dir.exists().await {
        return Ok(0);
    }

    let entries = dir.list_entries().await?;
    for entry in &entries {
        remove_path(entry).await?;
    }

    Ok(entries.len())
}

async fn remove_path(path: &Path) -> Result<(), AgentError> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => Dir::new(path).delete().await,
        Ok(_) => File::new(path).delete().await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Artifacts created by one deployment run inside the pull directory
#[derive(Debug, Default)]
pub struct RunWorkspace {
    archive: Option<PathBuf>,
    extract_dir: Option<PathBuf>,
}

impl RunWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_archive(&mut self, path: impl Into<PathBuf>) {
        self.archive = Some(path.into());
    }

    pub fn track_extract_dir(&mut self, path: impl Into<PathBuf>) {
        self.extract_dir = Some(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_none() && self.extract_dir.is_none()
    }

    /// Remove everything this run created.
    ///
    /// Both artifacts are always attempted; the first error is returned.
    pub async fn cleanup(&mut self) -> Result<(), AgentError> {
        let mut first_err = None;

        for path in [self.extract_dir.take(), self.archive.take()].into_iter().flatten() {
            match remove_path(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => {
                    warn!("Unable to remove {}: {}", path.display(), e);
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
