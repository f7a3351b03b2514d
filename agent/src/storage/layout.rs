//! On-disk locations used by the agent
//!
//! ```text
//! {base_dir}/
//!   settings.json       credentials, content roots, server
//!   state.json          setup flag, in-progress marker
//!   deployments.jsonl   one outcome per line
//!   pull/               downloaded archives and extracted trees
//!   logs/               rolling log files
//! ```

use std::path::PathBuf;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn file(&self, name: &str) -> File {
        File::new(self.base_dir.join(name))
    }

    fn dir(&self, name: &str) -> Dir {
        Dir::new(self.base_dir.join(name))
    }

    pub fn settings_file(&self) -> File {
        self.file("settings.json")
    }

    pub fn state_file(&self) -> File {
        self.file("state.json")
    }

    pub fn history_file(&self) -> File {
        self.file("deployments.jsonl")
    }

    /// Scratch directory for downloaded and extracted snapshots
    pub fn pull_dir(&self) -> Dir {
        self.dir("pull")
    }

    pub fn logs_dir(&self) -> Dir {
        self.dir("logs")
    }

    /// Create the base, pull and logs directories
    pub async fn setup(&self) -> Result<(), AgentError> {
        for dir in [Dir::new(&self.base_dir), self.pull_dir(), self.logs_dir()] {
            dir.create().await?;
        }
        Ok(())
    }
}

impl Default for StorageLayout {
    /// `/etc/gitdeploy` on Linux, `~/.gitdeploy` elsewhere
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            return Self::new("/etc/gitdeploy");
        }

        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".gitdeploy"))
    }
}
